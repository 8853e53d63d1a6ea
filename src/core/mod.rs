pub mod domain;
pub mod graph;
pub mod pipeline;
pub mod response;
pub mod sandbox;
pub mod traits;
