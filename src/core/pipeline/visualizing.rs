use std::{sync::Arc, time::Duration};

use crate::core::{
    domain::{ExecutionResult, Graph, Submission},
    graph::build_graph,
    response::{TraceFailure, TraceResponse},
    traits::{decoder::TraceDecoder, executor::Executor},
};

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub deadline: Duration,
    /// Keep sandboxes of failed requests on disk for debugging.
    pub keep_failed_sandboxes: bool,
}

/// Turns one submission into a response: sandbox, decode, build.
#[derive(Clone, Debug)]
pub struct Visualizer {
    executor: Arc<dyn Executor>,
    decoder: Arc<dyn TraceDecoder>,
    settings: PipelineSettings,
}

impl Visualizer {
    pub fn new(
        executor: Arc<dyn Executor>,
        decoder: Arc<dyn TraceDecoder>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            executor,
            decoder,
            settings,
        }
    }

    #[tracing::instrument(skip_all, fields(submission = %submission.id))]
    pub async fn visualize(&self, submission: &Submission) -> TraceResponse {
        tracing::info!(bytes = submission.program.len(), "Processing submission");

        let response = match self.run(submission).await {
            Ok(graph) => TraceResponse::success(graph),
            Err(failure) => {
                tracing::warn!(error = %failure, "Submission failed");
                failure.into()
            }
        };

        let elapsed = chrono::Utc::now() - submission.received_at;
        tracing::info!(
            status = ?response.status(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Submission processed"
        );
        response
    }

    async fn run(&self, submission: &Submission) -> Result<Graph, TraceFailure> {
        let execution = self
            .executor
            .execute(&submission.program, self.settings.deadline)
            .await?;

        let outcome = self.analyze(&execution.result).await;

        // The artifact is fully consumed at this point.
        if outcome.is_err() && self.settings.keep_failed_sandboxes {
            let dir = execution.sandbox.keep();
            tracing::warn!(dir = %dir.display(), "Keeping sandbox of failed submission");
        } else {
            execution.sandbox.dispose().await;
        }

        outcome
    }

    async fn analyze(&self, result: &ExecutionResult) -> Result<Graph, TraceFailure> {
        // A killed process leaves no trustworthy artifact.
        if result.timed_out {
            return Err(TraceFailure::ExecutionTimeout {
                deadline: self.settings.deadline,
            });
        }

        let Some(trace_path) = &result.trace_artifact else {
            tracing::debug!(exit_code = ?result.exit_code, "No trace artifact produced");
            return Err(TraceFailure::ArtifactMissing {
                output: result.output_lossy(),
            });
        };

        let events = self.decoder.decode(trace_path).await?;
        Ok(build_graph(&events))
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::core::{
        domain::{EventKind, SubmittedProgram, TaskState, TraceEvent},
        sandbox::Sandbox,
        traits::{
            decoder::{DecodeError, MockTraceDecoder},
            executor::{Execution, MockExecutor, SandboxError},
        },
    };

    const DEADLINE: Duration = Duration::from_secs(5);

    fn settings(keep_failed_sandboxes: bool) -> PipelineSettings {
        PipelineSettings {
            deadline: DEADLINE,
            keep_failed_sandboxes,
        }
    }

    fn submission() -> Submission {
        Submission::new(SubmittedProgram::new("package main"))
    }

    /// Executor whose sandbox lives under `root` and reports `result`.
    async fn executor_with(root: &Path, mut result: ExecutionResult) -> (MockExecutor, PathBuf) {
        let sandbox = Sandbox::create(root).await.unwrap();
        let dir = sandbox.dir().to_path_buf();
        if result.trace_artifact.is_some() {
            let path = sandbox.path_of("trace.out");
            std::fs::write(&path, b"trace").unwrap();
            result.trace_artifact = Some(path);
        }

        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .return_once(move |_, _| Ok(Execution { sandbox, result }));

        (executor, dir)
    }

    fn completed_with_trace() -> ExecutionResult {
        ExecutionResult {
            output: b"hello\n".to_vec(),
            exit_code: Some(0),
            timed_out: false,
            trace_artifact: Some(PathBuf::from("trace.out")),
        }
    }

    fn events() -> Vec<TraceEvent> {
        vec![
            TraceEvent::new(EventKind::TaskCreate, 1, vec![2]),
            TraceEvent::new(EventKind::TaskStart, 2, vec![2]),
            TraceEvent::new(EventKind::TaskEnd, 2, vec![]),
        ]
    }

    #[tokio::test]
    async fn test_success_builds_graph_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let (executor, dir) = executor_with(root.path(), completed_with_trace()).await;
        let mut decoder = MockTraceDecoder::new();
        decoder
            .expect_decode()
            .times(1)
            .returning(|_| Ok(events()));
        let visualizer = Visualizer::new(Arc::new(executor), Arc::new(decoder), settings(false));

        let response = visualizer.visualize(&submission()).await;

        match response {
            TraceResponse::Success { trace } => {
                assert_eq!(trace.node(2).map(|n| n.state), Some(TaskState::Finished));
                assert_eq!(trace.edges().len(), 1);
            }
            other => panic!("Expected success, got {:?}", other),
        }
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_timeout_takes_precedence_over_artifact() {
        let root = tempfile::tempdir().unwrap();
        let result = ExecutionResult {
            timed_out: true,
            exit_code: None,
            ..completed_with_trace()
        };
        let (executor, dir) = executor_with(root.path(), result).await;
        let mut decoder = MockTraceDecoder::new();
        decoder.expect_decode().never();
        let visualizer = Visualizer::new(Arc::new(executor), Arc::new(decoder), settings(false));

        let response = visualizer.visualize(&submission()).await;

        assert!(matches!(response, TraceResponse::Timeout { .. }));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_reports_output() {
        let root = tempfile::tempdir().unwrap();
        let result = ExecutionResult {
            output: b"./main.go:1:1: expected 'package', found 'EOF'\n".to_vec(),
            exit_code: Some(1),
            timed_out: false,
            trace_artifact: None,
        };
        let (executor, dir) = executor_with(root.path(), result).await;
        let mut decoder = MockTraceDecoder::new();
        decoder.expect_decode().never();
        let visualizer = Visualizer::new(Arc::new(executor), Arc::new(decoder), settings(false));

        let response = visualizer.visualize(&submission()).await;

        match response {
            TraceResponse::ArtifactMissing { go_run_output, .. } => {
                assert!(go_run_output.contains("expected 'package'"));
            }
            other => panic!("Expected missing artifact, got {:?}", other),
        }
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let (executor, dir) = executor_with(root.path(), completed_with_trace()).await;
        let mut decoder = MockTraceDecoder::new();
        decoder
            .expect_decode()
            .times(1)
            .returning(|_| Err(DecodeError::UnexpectedEof { offset: 0x20 }));
        let visualizer = Visualizer::new(Arc::new(executor), Arc::new(decoder), settings(false));

        let response = visualizer.visualize(&submission()).await;

        match response {
            TraceResponse::DecodeFailed { analyze_error, .. } => {
                assert_eq!(analyze_error, "unexpected end of trace at offset 0x20");
            }
            other => panic!("Expected decode failure, got {:?}", other),
        }
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_failed_sandbox_kept_when_configured() {
        let root = tempfile::tempdir().unwrap();
        let result = ExecutionResult {
            trace_artifact: None,
            ..completed_with_trace()
        };
        let (executor, dir) = executor_with(root.path(), result).await;
        let decoder = MockTraceDecoder::new();
        let visualizer = Visualizer::new(Arc::new(executor), Arc::new(decoder), settings(true));

        let response = visualizer.visualize(&submission()).await;

        assert!(matches!(response, TraceResponse::ArtifactMissing { .. }));
        assert!(dir.exists());
    }

    #[tokio::test]
    async fn test_sandbox_setup_failure() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().returning(|_, _| {
            Err(SandboxError::Launch {
                program: "go".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });
        let decoder = MockTraceDecoder::new();
        let visualizer = Visualizer::new(Arc::new(executor), Arc::new(decoder), settings(false));

        let response = visualizer.visualize(&submission()).await;

        match response {
            TraceResponse::SandboxFailed { setup_error, .. } => {
                assert!(setup_error.starts_with("failed to launch `go`"));
            }
            other => panic!("Expected sandbox failure, got {:?}", other),
        }
    }
}
