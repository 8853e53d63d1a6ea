pub mod visualizing;
