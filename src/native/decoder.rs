use std::path::Path;

use tokio::fs;

use crate::{
    core::{
        domain::TraceEvent,
        traits::decoder::{DecodeError, TraceDecoder},
    },
    gotrace,
};

#[derive(Clone, Debug, Default)]
pub struct GoTraceDecoder;

impl GoTraceDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl TraceDecoder for GoTraceDecoder {
    #[tracing::instrument(skip(self))]
    async fn decode(&self, path: &Path) -> Result<Vec<TraceEvent>, DecodeError> {
        let data = fs::read(path).await.map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let events = gotrace::parse(&data)?;
        tracing::debug!(bytes = data.len(), events = events.len(), "Trace decoded");
        Ok(events)
    }
}
