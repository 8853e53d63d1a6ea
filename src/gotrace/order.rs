use std::collections::HashMap;

use crate::core::{
    domain::{EventKind, TaskId, TraceEvent},
    traits::decoder::DecodeError,
};

#[derive(Debug, Default, Clone, Copy)]
struct Seen {
    ran: bool,
    ended: bool,
}

/// Merges the per-processor batches into one timeline.
///
/// Batches are flushed independently, so file order interleaves them
/// arbitrarily. The sort is stable, keeping records with equal timestamps
/// in the order they were decoded, except that creations go first: clock
/// ticks are coarse enough for a goroutine to start on another processor
/// in the tick it was created.
pub fn into_time_order(mut events: Vec<TraceEvent>) -> Result<Vec<TraceEvent>, DecodeError> {
    events.sort_by_key(|event| (event.ts, event.kind != EventKind::TaskCreate));
    check_lifecycles(&events)?;
    Ok(events)
}

/// Rejects timelines where a goroutine runs before its creation or after
/// its end, which no real execution produces.
fn check_lifecycles(events: &[TraceEvent]) -> Result<(), DecodeError> {
    let mut seen: HashMap<TaskId, Seen> = HashMap::new();

    for event in events {
        match event.kind {
            EventKind::TaskCreate => {
                let Some(&created) = event.args.first() else {
                    continue;
                };
                if seen.get(&created).is_some_and(|s| s.ran) {
                    return Err(inconsistent(created, "is created after it ran", event));
                }
            }
            EventKind::TaskStart if event.task_id != 0 => {
                let entry = seen.entry(event.task_id).or_default();
                if entry.ended {
                    return Err(inconsistent(event.task_id, "runs after it ended", event));
                }
                entry.ran = true;
            }
            EventKind::TaskEnd if event.task_id != 0 => {
                let entry = seen.entry(event.task_id).or_default();
                entry.ran = true;
                entry.ended = true;
            }
            _ => {}
        }
    }
    Ok(())
}

fn inconsistent(task: TaskId, problem: &'static str, event: &TraceEvent) -> DecodeError {
    DecodeError::InconsistentOrder {
        task,
        problem,
        offset: event.offset,
    }
}
