use std::panic;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Commands, SandboxArgs};
use crate::core::domain::{SubmittedProgram, Submission};
use crate::core::graph::build_graph;
use crate::core::pipeline::visualizing::Visualizer;
use crate::core::response::TraceResponse;
use crate::core::traits::decoder::TraceDecoder;
use crate::native::decoder::GoTraceDecoder;
use crate::native::executor::NativeExecutor;
use crate::server::reading::ReadLimits;

mod config;
mod constants;
mod core;
mod gotrace;
mod native;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            addr,
            max_source_bytes,
            read_timeout_secs,
            sandbox,
        } => {
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            let limits = ReadLimits {
                max_bytes: max_source_bytes,
                deadline: Duration::from_secs(read_timeout_secs),
            };
            server::serve(listener, Arc::new(visualizer(&sandbox)), limits).await?;
        }
        Commands::Run { file, sandbox } => {
            let source = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read source file: {}", file.display()))?;
            let submission = Submission::new(SubmittedProgram::new(source));
            let response = visualizer(&sandbox).visualize(&submission).await;
            print_payload(&response)?;
        }
        Commands::Inspect { trace } => {
            let response = inspect(&trace).await?;
            print_payload(&response)?;
        }
    }

    Ok(())
}

fn visualizer(sandbox: &SandboxArgs) -> Visualizer {
    Visualizer::new(
        Arc::new(NativeExecutor::new(sandbox.root(), &sandbox.go_bin)),
        Arc::new(GoTraceDecoder::new()),
        sandbox.settings(),
    )
}

#[tracing::instrument]
async fn inspect(trace: &Path) -> Result<TraceResponse> {
    let events = GoTraceDecoder::new()
        .decode(trace)
        .await
        .with_context(|| format!("failed to decode {}", trace.display()))?;
    tracing::info!(events = events.len(), "Trace decoded");
    Ok(TraceResponse::success(build_graph(&events)))
}

fn print_payload(response: &TraceResponse) -> Result<()> {
    println!("{}", response.to_json()?);
    Ok(())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
