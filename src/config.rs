use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    constants::{
        DEFAULT_ADDR, DEFAULT_DEADLINE, DEFAULT_GO_BIN, DEFAULT_MAX_SOURCE_BYTES,
        DEFAULT_READ_TIMEOUT,
    },
    core::pipeline::visualizing::PipelineSettings,
};

/// Runs Go programs under the execution tracer and renders their goroutines as a graph
#[derive(Debug, Parser)]
#[command(name = "gotrace-visualizer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve trace requests over TCP, one program per connection
    Serve {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,

        /// Largest accepted program source in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_SOURCE_BYTES)]
        max_source_bytes: usize,

        /// Seconds a client may take to send its program and half-close
        #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_secs())]
        read_timeout_secs: u64,

        #[command(flatten)]
        sandbox: SandboxArgs,
    },

    /// Trace a local Go source file and print the payload
    Run {
        /// Path to the Go source file
        file: PathBuf,

        #[command(flatten)]
        sandbox: SandboxArgs,
    },

    /// Decode an existing trace.out and print its graph
    Inspect {
        /// Path to the trace artifact
        trace: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct SandboxArgs {
    /// Wall-clock limit for `go run` in seconds
    #[arg(long, default_value_t = DEFAULT_DEADLINE.as_secs())]
    pub deadline_secs: u64,

    /// Go toolchain binary
    #[arg(long, default_value = DEFAULT_GO_BIN)]
    pub go_bin: PathBuf,

    /// Directory holding per-request sandboxes (default: system temp dir)
    #[arg(long)]
    pub sandbox_root: Option<PathBuf>,

    /// Leave the sandbox of a failed request on disk and log its path
    #[arg(long)]
    pub keep_failed_sandboxes: bool,
}

impl SandboxArgs {
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            deadline: Duration::from_secs(self.deadline_secs),
            keep_failed_sandboxes: self.keep_failed_sandboxes,
        }
    }

    pub fn root(&self) -> PathBuf {
        self.sandbox_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
