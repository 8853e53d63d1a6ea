use std::{io, path::PathBuf, time::Duration};

use crate::core::{
    domain::{ExecutionResult, SubmittedProgram},
    sandbox::Sandbox,
};

/// Runs a submitted program inside a fresh sandbox under a deadline.
///
/// The returned [`Sandbox`] keeps the working directory alive until the
/// caller has consumed the trace artifact.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Executor: std::fmt::Debug + Send + Sync {
    async fn execute(
        &self,
        program: &SubmittedProgram,
        deadline: Duration,
    ) -> Result<Execution, SandboxError>;
}

#[derive(Debug)]
pub struct Execution {
    pub sandbox: Sandbox,
    pub result: ExecutionResult,
}

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to prepare sandbox at {}: {source}", path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to collect process output: {source}")]
    Output {
        #[source]
        source: io::Error,
    },
}
