//! Reader for the binary execution traces written by Go's `runtime/trace`.
//!
//! Both the per-processor batch format (Go 1.11 to 1.21) and the
//! generation format (Go 1.22 onwards) decode to one time-ordered
//! event sequence.

pub mod events;
pub mod generations;
mod order;
pub mod parser;
mod reader;

#[cfg(test)]
pub mod testing;

pub use parser::parse;
