use std::time::Duration;

use serde::Serialize;

use crate::{
    constants::TRACE_FILE_NAME,
    core::{
        domain::Graph,
        traits::{decoder::DecodeError, executor::SandboxError},
    },
};

const TIMEOUT_HINT: &str = "This often happens with long-running servers or programs with infinite loops. Please ensure your program terminates to generate a complete trace.";
const MISSING_TRACE_HINT: &str = "This can happen if there was a compile error in the code.";

/// Every way a single request can fail after it was accepted.
#[derive(Debug, thiserror::Error)]
pub enum TraceFailure {
    #[error(transparent)]
    SandboxSetup(#[from] SandboxError),
    #[error("execution timed out after {deadline:?}")]
    ExecutionTimeout { deadline: Duration },
    #[error("trace artifact not generated")]
    ArtifactMissing { output: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    ClientError,
    ServerError,
}

/// Payload handed to the transport, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TraceResponse {
    Success {
        trace: Graph,
    },
    Timeout {
        error: String,
        go_run_output: String,
    },
    ArtifactMissing {
        error: String,
        go_run_output: String,
        run_error: String,
    },
    DecodeFailed {
        error: String,
        analyze_error: String,
    },
    SandboxFailed {
        error: String,
        setup_error: String,
    },
    InvalidRequest {
        error: String,
        read_error: String,
    },
}

impl TraceResponse {
    pub fn success(graph: Graph) -> Self {
        TraceResponse::Success { trace: graph }
    }

    pub fn invalid_request(reason: impl ToString) -> Self {
        TraceResponse::InvalidRequest {
            error: "Failed to read code".to_string(),
            read_error: reason.to_string(),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        match self {
            TraceResponse::Success { .. } => ResponseStatus::Ok,
            TraceResponse::Timeout { .. } | TraceResponse::InvalidRequest { .. } => {
                ResponseStatus::ClientError
            }
            TraceResponse::ArtifactMissing { .. }
            | TraceResponse::DecodeFailed { .. }
            | TraceResponse::SandboxFailed { .. } => ResponseStatus::ServerError,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<TraceFailure> for TraceResponse {
    fn from(failure: TraceFailure) -> Self {
        match failure {
            TraceFailure::SandboxSetup(err) => TraceResponse::SandboxFailed {
                error: "Failed to prepare sandbox".to_string(),
                setup_error: err.to_string(),
            },
            TraceFailure::ExecutionTimeout { deadline } => TraceResponse::Timeout {
                error: format!(
                    "Execution timed out after {} seconds.",
                    deadline.as_secs_f64()
                ),
                go_run_output: TIMEOUT_HINT.to_string(),
            },
            TraceFailure::ArtifactMissing { output } => TraceResponse::ArtifactMissing {
                error: format!("{} not generated", TRACE_FILE_NAME),
                go_run_output: output,
                run_error: MISSING_TRACE_HINT.to_string(),
            },
            TraceFailure::Decode(err) => TraceResponse::DecodeFailed {
                error: format!("Failed to analyze {}", TRACE_FILE_NAME),
                analyze_error: err.to_string(),
            },
        }
    }
}
