//! The generation-based format written since Go 1.22.
//!
//! The artifact is a sequence of batches, each tagged with a generation
//! and the thread (M) that wrote it. Event batches hold timed records whose
//! timestamps are deltas from the batch base time; the string table, stack
//! table, CPU samples and clock data travel in batches of their own.

use std::collections::{HashMap, HashSet};

use crate::{
    core::{
        domain::{EventKind, TaskId, TraceEvent},
        traits::decoder::DecodeError,
    },
    gotrace::{
        parser::{HEADER_LEN, MAX_STRING_LEN},
        reader::Reader,
    },
};

pub const EVENT_BATCH: u8 = 1;
pub const STACKS: u8 = 2;
pub const STACK: u8 = 3;
pub const STRINGS: u8 = 4;
pub const STRING: u8 = 5;
pub const CPU_SAMPLES: u8 = 6;
pub const CPU_SAMPLE: u8 = 7;
pub const FREQUENCY: u8 = 8;
pub const GO_CREATE: u8 = 14;
pub const GO_CREATE_SYSCALL: u8 = 15;
pub const GO_START: u8 = 16;
pub const GO_DESTROY: u8 = 17;
pub const GO_DESTROY_SYSCALL: u8 = 18;
pub const GO_STOP: u8 = 19;
pub const GO_BLOCK: u8 = 20;
pub const GO_SYSCALL_END_BLOCKED: u8 = 24;
pub const GO_STATUS: u8 = 25;
pub const STW_BEGIN: u8 = 26;
pub const STW_END: u8 = 27;
pub const GC_ACTIVE: u8 = 28;
pub const GC_BEGIN: u8 = 29;
pub const GC_END: u8 = 30;
pub const GC_MARK_ASSIST_ACTIVE: u8 = 34;
pub const GO_SWITCH: u8 = 45;
pub const GO_SWITCH_DESTROY: u8 = 46;
pub const GO_CREATE_BLOCKED: u8 = 47;
pub const GO_STATUS_STACK: u8 = 48;
pub const EXPERIMENTAL_BATCH: u8 = 49;
pub const SYNC: u8 = 50;
pub const CLOCK_SNAPSHOT: u8 = 51;

/// Goroutine states carried by `GoStatus`.
pub const STATUS_RUNNING: u64 = 2;
pub const STATUS_SYSCALL: u64 = 3;

const MAX_BATCH_SIZE: u64 = 64 << 10;

#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub min_version: u32,
    /// The first arg is a timestamp delta.
    pub timed: bool,
    pub args: &'static [&'static str],
}

const fn layout(
    name: &'static str,
    min_version: u32,
    timed: bool,
    args: &'static [&'static str],
) -> Layout {
    Layout {
        name,
        min_version,
        timed,
        args,
    }
}

static LAYOUTS: [Layout; 52] = [
    layout("None", 1022, false, &[]),
    layout("EventBatch", 1022, false, &["gen", "m", "time", "size"]),
    layout("Stacks", 1022, false, &[]),
    layout("Stack", 1022, false, &["id", "nframes"]),
    layout("Strings", 1022, false, &[]),
    layout("String", 1022, false, &["id"]),
    layout("CPUSamples", 1022, false, &[]),
    layout("CPUSample", 1022, false, &["time", "m", "p", "g", "stack"]),
    layout("Frequency", 1022, false, &["freq"]),
    layout("ProcsChange", 1022, true, &["dt", "procs_value", "stack"]),
    layout("ProcStart", 1022, true, &["dt", "p", "p_seq"]),
    layout("ProcStop", 1022, true, &["dt"]),
    layout("ProcSteal", 1022, true, &["dt", "p", "p_seq", "m"]),
    layout("ProcStatus", 1022, true, &["dt", "p", "pstatus"]),
    layout("GoCreate", 1022, true, &["dt", "new_g", "new_stack", "stack"]),
    layout("GoCreateSyscall", 1022, true, &["dt", "new_g"]),
    layout("GoStart", 1022, true, &["dt", "g", "g_seq"]),
    layout("GoDestroy", 1022, true, &["dt"]),
    layout("GoDestroySyscall", 1022, true, &["dt"]),
    layout("GoStop", 1022, true, &["dt", "reason_string", "stack"]),
    layout("GoBlock", 1022, true, &["dt", "reason_string", "stack"]),
    layout("GoUnblock", 1022, true, &["dt", "g", "g_seq", "stack"]),
    layout("GoSyscallBegin", 1022, true, &["dt", "p_seq", "stack"]),
    layout("GoSyscallEnd", 1022, true, &["dt"]),
    layout("GoSyscallEndBlocked", 1022, true, &["dt"]),
    layout("GoStatus", 1022, true, &["dt", "g", "m", "gstatus"]),
    layout("STWBegin", 1022, true, &["dt", "kind_string", "stack"]),
    layout("STWEnd", 1022, true, &["dt"]),
    layout("GCActive", 1022, true, &["dt", "gc_seq"]),
    layout("GCBegin", 1022, true, &["dt", "gc_seq", "stack"]),
    layout("GCEnd", 1022, true, &["dt", "gc_seq"]),
    layout("GCSweepActive", 1022, true, &["dt", "p"]),
    layout("GCSweepBegin", 1022, true, &["dt", "stack"]),
    layout("GCSweepEnd", 1022, true, &["dt", "swept_value", "reclaimed_value"]),
    layout("GCMarkAssistActive", 1022, true, &["dt", "g"]),
    layout("GCMarkAssistBegin", 1022, true, &["dt", "stack"]),
    layout("GCMarkAssistEnd", 1022, true, &["dt"]),
    layout("HeapAlloc", 1022, true, &["dt", "heapalloc_value"]),
    layout("HeapGoal", 1022, true, &["dt", "heapgoal_value"]),
    layout("GoLabel", 1022, true, &["dt", "label_string"]),
    layout("UserTaskBegin", 1022, true, &["dt", "task", "parent_task", "name_string", "stack"]),
    layout("UserTaskEnd", 1022, true, &["dt", "task", "stack"]),
    layout("UserRegionBegin", 1022, true, &["dt", "task", "name_string", "stack"]),
    layout("UserRegionEnd", 1022, true, &["dt", "task", "name_string", "stack"]),
    layout("UserLog", 1022, true, &["dt", "task", "key_string", "value_string", "stack"]),
    layout("GoSwitch", 1023, true, &["dt", "g", "g_seq"]),
    layout("GoSwitchDestroy", 1023, true, &["dt", "g", "g_seq"]),
    layout("GoCreateBlocked", 1023, true, &["dt", "new_g", "new_stack", "stack"]),
    layout("GoStatusStack", 1023, true, &["dt", "g", "m", "gstatus", "stack"]),
    layout("ExperimentalBatch", 1023, false, &[]),
    layout("Sync", 1025, false, &[]),
    layout("ClockSnapshot", 1025, true, &["dt", "mono", "sec", "nsec"]),
];

pub fn describe(typ: u8, version: u32) -> Option<&'static Layout> {
    if typ == 0 {
        return None;
    }
    LAYOUTS
        .get(typ as usize)
        .filter(|layout| layout.min_version <= version)
}

/// Decodes the body that follows the header.
pub fn decode(body: &[u8], version: u32) -> Result<Vec<TraceEvent>, DecodeError> {
    let mut decoder = GenerationDecoder::new(body, version);
    while !decoder.reader.is_empty() {
        decoder.batch()?;
    }
    Ok(decoder.events)
}

struct GenerationDecoder<'a> {
    reader: Reader<'a>,
    version: u32,
    generation: u64,
    // String ids are scoped to one generation.
    string_ids: HashSet<u64>,
    // Goroutine currently running on each thread.
    running: HashMap<u64, TaskId>,
    // Timestamp of the last event each thread wrote.
    thread_ts: HashMap<u64, u64>,
    events: Vec<TraceEvent>,
}

impl<'a> GenerationDecoder<'a> {
    fn new(body: &'a [u8], version: u32) -> Self {
        Self {
            reader: Reader::new(body, HEADER_LEN),
            version,
            generation: 0,
            string_ids: HashSet::new(),
            running: HashMap::new(),
            thread_ts: HashMap::new(),
            events: Vec::new(),
        }
    }

    fn batch(&mut self) -> Result<(), DecodeError> {
        let offset = self.reader.offset();
        let experimental = match self.reader.byte()? {
            EVENT_BATCH => false,
            EXPERIMENTAL_BATCH if self.version >= 1023 => {
                self.reader.byte()?;
                true
            }
            typ => {
                return Err(invalid_batch(
                    offset,
                    format!("starts with event type {} instead of a batch header", typ),
                ));
            }
        };

        let generation = self.reader.varint()?;
        let thread = self.reader.varint()?;
        let base_ts = self.reader.varint()?;
        let size = self.reader.varint()?;
        if size > MAX_BATCH_SIZE {
            return Err(invalid_batch(offset, format!("has too large size {}", size)));
        }
        let data_offset = self.reader.offset();
        let data = self.reader.bytes(size as usize)?;

        // Experiment payloads have their own layout; nothing here needs them.
        if experimental {
            return Ok(());
        }

        if generation < self.generation {
            return Err(invalid_batch(
                offset,
                format!("belongs to generation {} after generation {}", generation, self.generation),
            ));
        }
        if generation > self.generation {
            self.generation = generation;
            self.string_ids.clear();
        }

        let mut batch = Reader::new(data, data_offset);
        match data.first() {
            None => Ok(()),
            Some(&STACKS) => self.stacks(&mut batch),
            Some(&STRINGS) => self.strings(&mut batch),
            Some(&CPU_SAMPLES) => self.cpu_samples(&mut batch),
            Some(&FREQUENCY) => self.clock(&mut batch, base_ts),
            Some(&SYNC) if self.version >= 1025 => self.clock(&mut batch, base_ts),
            Some(_) => self.timed_events(&mut batch, thread, base_ts, offset),
        }
    }

    fn stacks(&mut self, batch: &mut Reader<'a>) -> Result<(), DecodeError> {
        batch.byte()?;
        while !batch.is_empty() {
            let offset = batch.offset();
            expect_entry(batch, STACK, "stack table", offset)?;
            let _id = batch.varint()?;
            let frames = batch.varint()?;
            // pc, func, file, line
            for _ in 0..frames.saturating_mul(4) {
                batch.varint()?;
            }
        }
        Ok(())
    }

    // Strings only matter for symbolization, which the graph does not need.
    fn strings(&mut self, batch: &mut Reader<'a>) -> Result<(), DecodeError> {
        batch.byte()?;
        while !batch.is_empty() {
            let offset = batch.offset();
            expect_entry(batch, STRING, "string table", offset)?;
            let id = batch.varint()?;
            if id == 0 {
                return Err(invalid_string(offset, "has invalid id 0".to_string()));
            }
            if !self.string_ids.insert(id) {
                return Err(invalid_string(offset, format!("has duplicate id {}", id)));
            }
            let len = batch.varint()?;
            if len > MAX_STRING_LEN {
                return Err(invalid_string(offset, format!("has too large length {}", len)));
            }
            batch.bytes(len as usize)?;
        }
        Ok(())
    }

    fn cpu_samples(&mut self, batch: &mut Reader<'a>) -> Result<(), DecodeError> {
        batch.byte()?;
        let layout = &LAYOUTS[CPU_SAMPLE as usize];
        while !batch.is_empty() {
            let offset = batch.offset();
            expect_entry(batch, CPU_SAMPLE, "CPU sample table", offset)?;
            let args = read_args(batch, layout)?;
            // Sample timestamps are absolute.
            let (ts, task_id) = (args[0], args[3]);
            self.push(CPU_SAMPLE, layout, task_id, args, ts, offset);
        }
        Ok(())
    }

    fn clock(&mut self, batch: &mut Reader<'a>, base_ts: u64) -> Result<(), DecodeError> {
        while !batch.is_empty() {
            let offset = batch.offset();
            let typ = batch.byte()?;
            match typ {
                SYNC if self.version >= 1025 => {}
                FREQUENCY | CLOCK_SNAPSHOT => {
                    let layout = describe(typ, self.version)
                        .ok_or(DecodeError::UnknownEvent { typ, offset })?;
                    let args = read_args(batch, layout)?;
                    self.push(typ, layout, 0, args, base_ts, offset);
                }
                _ => {
                    return Err(invalid_batch(
                        offset,
                        format!("holds event type {} among clock data", typ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn timed_events(
        &mut self,
        batch: &mut Reader<'a>,
        thread: u64,
        base_ts: u64,
        batch_offset: usize,
    ) -> Result<(), DecodeError> {
        if self.thread_ts.get(&thread).is_some_and(|&last| base_ts < last) {
            return Err(invalid_batch(
                batch_offset,
                format!("of thread {} starts before its previous batch ended", thread),
            ));
        }

        let mut last_ts = base_ts;
        while !batch.is_empty() {
            let offset = batch.offset();
            let typ = batch.byte()?;
            let layout = describe(typ, self.version)
                .ok_or(DecodeError::UnknownEvent { typ, offset })?;
            if !layout.timed {
                return Err(invalid_batch(
                    offset,
                    format!("holds untimed {} among thread events", layout.name),
                ));
            }

            let mut args = read_args(batch, layout)?;
            last_ts = last_ts
                .checked_add(args.remove(0))
                .ok_or(DecodeError::TimestampOverflow { offset })?;
            self.attribute(thread, typ, layout, args, last_ts, offset);
        }

        self.thread_ts.insert(thread, last_ts);
        Ok(())
    }

    fn attribute(
        &mut self,
        thread: u64,
        typ: u8,
        layout: &'static Layout,
        args: Vec<u64>,
        ts: u64,
        offset: usize,
    ) {
        let current = self.running.get(&thread).copied().unwrap_or(0);
        let task_id = match typ {
            GO_START | GO_SWITCH => {
                self.running.insert(thread, args[0]);
                args[0]
            }
            GO_SWITCH_DESTROY => {
                self.push(GO_DESTROY, &LAYOUTS[GO_DESTROY as usize], current, Vec::new(), ts, offset);
                self.running.insert(thread, args[0]);
                args[0]
            }
            GO_CREATE_SYSCALL => {
                self.running.insert(thread, args[0]);
                args[0]
            }
            GO_DESTROY | GO_DESTROY_SYSCALL | GO_STOP | GO_BLOCK | GO_SYSCALL_END_BLOCKED => {
                self.running.remove(&thread);
                current
            }
            GO_STATUS | GO_STATUS_STACK => {
                let (g, owner, status) = (args[0], args[1], args[2]);
                if status == STATUS_RUNNING || status == STATUS_SYSCALL {
                    self.running.insert(owner, g);
                }
                g
            }
            GC_MARK_ASSIST_ACTIVE => args[0],
            STW_BEGIN | STW_END | GC_ACTIVE | GC_BEGIN | GC_END => 0,
            _ => current,
        };

        self.push(typ, layout, task_id, args, ts, offset);
    }

    fn push(
        &mut self,
        typ: u8,
        layout: &'static Layout,
        task_id: TaskId,
        args: Vec<u64>,
        ts: u64,
        offset: usize,
    ) {
        self.events.push(TraceEvent {
            kind: kind_of(typ, layout),
            task_id,
            args,
            ts,
            offset,
        });
    }
}

fn kind_of(typ: u8, layout: &'static Layout) -> EventKind {
    match typ {
        GO_CREATE | GO_CREATE_BLOCKED => EventKind::TaskCreate,
        GO_START | GO_SWITCH | GO_SWITCH_DESTROY => EventKind::TaskStart,
        GO_DESTROY | GO_DESTROY_SYSCALL => EventKind::TaskEnd,
        _ => EventKind::Other {
            code: typ,
            name: layout.name,
        },
    }
}

fn read_args(batch: &mut Reader<'_>, layout: &Layout) -> Result<Vec<u64>, DecodeError> {
    layout.args.iter().map(|_| batch.varint()).collect()
}

fn expect_entry(
    batch: &mut Reader<'_>,
    want: u8,
    table: &str,
    offset: usize,
) -> Result<(), DecodeError> {
    let typ = batch.byte()?;
    if typ != want {
        return Err(invalid_batch(
            offset,
            format!("holds event type {} in the {}", typ, table),
        ));
    }
    Ok(())
}

fn invalid_batch(offset: usize, reason: String) -> DecodeError {
    DecodeError::InvalidBatch { offset, reason }
}

fn invalid_string(offset: usize, reason: String) -> DecodeError {
    DecodeError::InvalidString { offset, reason }
}
