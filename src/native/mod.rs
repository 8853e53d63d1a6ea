/// Native module contains implementations of core traits
/// that talk to the host directly: the local Go toolchain for
/// execution and the filesystem for trace artifacts.
pub mod decoder;
pub mod executor;
