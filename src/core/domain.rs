use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type TaskId = u64;

/// The goroutine running `main`; every graph contains it.
pub const MAIN_TASK_ID: TaskId = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedProgram(Vec<u8>);

impl SubmittedProgram {
    pub fn new(source: impl Into<Vec<u8>>) -> Self {
        Self(source.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub program: SubmittedProgram,
}

impl Submission {
    pub fn new(program: SubmittedProgram) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            program,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Stdout and stderr interleaved in arrival order.
    pub output: Vec<u8>,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub trace_artifact: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    TaskCreate,
    TaskStart,
    TaskEnd,
    /// Decoded but irrelevant to the concurrency graph.
    Other { code: u8, name: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: EventKind,
    pub task_id: TaskId,
    /// For `TaskCreate`, `args[0]` is the id of the new task.
    pub args: Vec<u64>,
    pub ts: u64,
    /// Byte offset of the record in the artifact.
    pub offset: usize,
}

impl TraceEvent {
    pub fn new(kind: EventKind, task_id: TaskId, args: Vec<u64>) -> Self {
        Self {
            kind,
            task_id,
            args,
            ts: 0,
            offset: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Created,
    Running,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Goroutine,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub state: TaskState,
}

impl TaskNode {
    pub fn new(id: TaskId, state: TaskState) -> Self {
        let label = if id == MAIN_TASK_ID {
            format!("goroutine {} (main)", id)
        } else {
            format!("goroutine {}", id)
        };

        Self {
            id,
            label,
            kind: NodeKind::Goroutine,
            state,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: TaskId,
    pub to: TaskId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Graph {
    nodes: Vec<TaskNode>,
    edges: Vec<Edge>,
}

impl Graph {
    pub(crate) fn new(nodes: Vec<TaskNode>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[cfg(test)]
    pub fn node(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}
