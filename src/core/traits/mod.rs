pub mod decoder;
pub mod executor;
