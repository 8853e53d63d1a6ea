use std::{
    io,
    path::{Path, PathBuf},
};

use crate::core::domain::{TaskId, TraceEvent};

/// Decodes a trace artifact into the ordered event sequence.
#[mockall::automock]
#[async_trait::async_trait]
pub trait TraceDecoder: std::fmt::Debug + Send + Sync {
    async fn decode(&self, path: &Path) -> Result<Vec<TraceEvent>, DecodeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("could not open trace file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not a trace file")]
    NotATrace,
    #[error("unsupported trace file version go {version}")]
    UnsupportedVersion { version: String },
    #[error("unexpected end of trace at offset 0x{offset:x}")]
    UnexpectedEof { offset: usize },
    #[error("varint at offset 0x{offset:x} is too long")]
    VarintOverflow { offset: usize },
    #[error("unknown event type {typ} at offset 0x{offset:x}")]
    UnknownEvent { typ: u8, offset: usize },
    #[error("event has wrong length at offset 0x{offset:x}: want {want}, got {got}")]
    WrongLength { offset: usize, want: u64, got: u64 },
    #[error("{name} has wrong number of arguments at offset 0x{offset:x}: want {want}, got {got}")]
    WrongArgCount {
        name: &'static str,
        offset: usize,
        want: usize,
        got: usize,
    },
    #[error("string at offset 0x{offset:x} {reason}")]
    InvalidString { offset: usize, reason: String },
    #[error("{name} at offset 0x{offset:x} appears before the first batch")]
    EventBeforeBatch { name: &'static str, offset: usize },
    #[error("timestamp overflow at offset 0x{offset:x}")]
    TimestampOverflow { offset: usize },
    #[error("batch at offset 0x{offset:x} {reason}")]
    InvalidBatch { offset: usize, reason: String },
    #[error("goroutine {task} {problem} (event at offset 0x{offset:x})")]
    InconsistentOrder {
        task: TaskId,
        problem: &'static str,
        offset: usize,
    },
}
