use std::collections::HashMap;

use itertools::Itertools;

use crate::core::domain::{
    Edge, EventKind, Graph, MAIN_TASK_ID, TaskId, TaskNode, TaskState, TraceEvent,
};

/// Request-scoped state of a single fold over a trace.
#[derive(Debug)]
struct GraphAccumulator {
    nodes: HashMap<TaskId, TaskNode>,
    edges: Vec<Edge>,
}

impl GraphAccumulator {
    fn seeded() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(MAIN_TASK_ID, TaskNode::new(MAIN_TASK_ID, TaskState::Running));

        Self {
            nodes,
            edges: Vec::new(),
        }
    }

    fn apply(&mut self, event: &TraceEvent) {
        match event.kind {
            EventKind::TaskCreate => {
                let Some(&created) = event.args.first() else {
                    tracing::warn!(
                        offset = event.offset,
                        "Task creation event without a new task id"
                    );
                    return;
                };
                self.ensure_node(event.task_id);
                self.ensure_node(created);
                self.edges.push(Edge {
                    from: event.task_id,
                    to: created,
                });
            }
            EventKind::TaskStart => self.transition(event.task_id, TaskState::Running),
            EventKind::TaskEnd => self.transition(event.task_id, TaskState::Finished),
            EventKind::Other { .. } => {}
        }
    }

    fn ensure_node(&mut self, id: TaskId) {
        self.nodes
            .entry(id)
            .or_insert_with(|| TaskNode::new(id, TaskState::Created));
    }

    // Start/end events never synthesize nodes.
    fn transition(&mut self, id: TaskId, state: TaskState) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = state;
        }
    }

    fn finish(self) -> Graph {
        let nodes = self
            .nodes
            .into_values()
            .sorted_by_key(|node| node.id)
            .collect();
        Graph::new(nodes, self.edges)
    }
}

/// Folds an ordered event sequence into a concurrency graph.
///
/// Each node keeps the state of the last start/end event seen for it.
/// Edges are appended once per creation event, in event order.
#[tracing::instrument(skip_all)]
pub fn build_graph<'a, I>(events: I) -> Graph
where
    I: IntoIterator<Item = &'a TraceEvent>,
{
    let mut acc = GraphAccumulator::seeded();
    for event in events {
        acc.apply(event);
    }

    let graph = acc.finish();
    tracing::debug!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "Graph built"
    );
    graph
}
