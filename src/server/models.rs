use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{domain::SubmittedProgram, response::TraceResponse};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request body is empty")]
    EmptyBody,
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("timed out reading request body after {}s", after.as_secs_f64())]
    Timeout { after: Duration },
    #[error("failed to read request body: {0}")]
    Io(#[from] std::io::Error),
}

/// A connection whose body was read to EOF, or failed to be.
#[derive(Debug)]
pub struct IncomingRequest {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub body: Result<Vec<u8>, RequestError>,
}

impl IncomingRequest {
    pub fn new(id: Uuid, body: Result<Vec<u8>, RequestError>) -> Self {
        IncomingRequest {
            id,
            received_at: Utc::now(),
            body,
        }
    }
}

#[derive(Debug)]
pub struct OutgoingResponse {
    pub id: Uuid,
    pub response: TraceResponse,
}

impl OutgoingResponse {
    pub fn new(id: Uuid, response: TraceResponse) -> Self {
        OutgoingResponse { id, response }
    }
}

impl TryFrom<Vec<u8>> for SubmittedProgram {
    type Error = RequestError;

    fn try_from(body: Vec<u8>) -> Result<Self, Self::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RequestError::EmptyBody);
        }
        Ok(SubmittedProgram::new(body))
    }
}
