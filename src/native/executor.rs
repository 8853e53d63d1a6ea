use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use nix::{
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    time::{Instant, timeout},
};

use crate::{
    constants::{SOURCE_FILE_NAME, TRACE_FILE_NAME},
    core::{
        domain::{ExecutionResult, SubmittedProgram},
        sandbox::Sandbox,
        traits::executor::{Execution, Executor, SandboxError},
    },
};

const READ_CHUNK_SIZE: usize = 4096;

/// Runs programs with `go run` in per-request directories under `root`.
#[derive(Clone, Debug)]
pub struct NativeExecutor {
    root: PathBuf,
    go_path: PathBuf,
}

impl NativeExecutor {
    pub fn new<T, U>(root: T, go_path: U) -> Self
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        NativeExecutor {
            root: root.as_ref().into(),
            go_path: go_path.as_ref().into(),
        }
    }

    fn spawn(&self, sandbox: &Sandbox) -> Result<Child, SandboxError> {
        Command::new(&self.go_path)
            .arg("run")
            .arg(SOURCE_FILE_NAME)
            .current_dir(sandbox.dir())
            // Run the installed toolchain, never a downloaded one.
            .env("GOTOOLCHAIN", "local")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own group, so the binary built by `go run` can be killed with it.
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Launch {
                program: self.go_path.display().to_string(),
                source,
            })
    }
}

#[async_trait::async_trait]
impl Executor for NativeExecutor {
    #[tracing::instrument(skip(self, program), fields(bytes = program.len()))]
    async fn execute(
        &self,
        program: &SubmittedProgram,
        deadline: Duration,
    ) -> Result<Execution, SandboxError> {
        let sandbox = Sandbox::create(&self.root).await?;
        sandbox.write_source(program).await?;

        let mut child = self.spawn(&sandbox)?;
        let started = Instant::now();
        let mut output = Vec::new();

        let waited = timeout(deadline, wait_with_combined_output(&mut child, &mut output)).await;
        let (exit_code, timed_out) = match waited {
            Ok(status) => {
                let status = status.map_err(|source| SandboxError::Output { source })?;
                (status.code(), false)
            }
            Err(_) => {
                tracing::warn!(?deadline, "Deadline exceeded, killing process group");
                terminate(&mut child).await;
                (None, true)
            }
        };

        let trace_path = sandbox.path_of(TRACE_FILE_NAME);
        let trace_exists = fs::try_exists(&trace_path).await.map_err(|source| {
            tracing::warn!(
                path = %trace_path.display(),
                error = %source,
                "Failed to inspect trace artifact"
            );
            SandboxError::Output { source }
        })?;

        tracing::debug!(
            ?exit_code,
            timed_out,
            trace_exists,
            output_bytes = output.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Process finished"
        );

        Ok(Execution {
            sandbox,
            result: ExecutionResult {
                output,
                exit_code,
                timed_out,
                trace_artifact: trace_exists.then_some(trace_path),
            },
        })
    }
}

/// Drains stdout and stderr into one buffer in arrival order, then reaps
/// the child. `output` keeps whatever was read if the future is dropped.
async fn wait_with_combined_output(
    child: &mut Child,
    output: &mut Vec<u8>,
) -> io::Result<ExitStatus> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out_buf = [0u8; READ_CHUNK_SIZE];
    let mut err_buf = [0u8; READ_CHUNK_SIZE];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_chunk(&mut stdout, &mut out_buf) => match read? {
                0 => stdout = None,
                n => output.extend_from_slice(&out_buf[..n]),
            },
            read = read_chunk(&mut stderr, &mut err_buf) => match read? {
                0 => stderr = None,
                n => output.extend_from_slice(&err_buf[..n]),
            },
        }
    }

    child.wait().await
}

async fn read_chunk<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::warn!(pid, error = %e, "Failed to kill process group");
        }
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to reap killed process");
    }
}
