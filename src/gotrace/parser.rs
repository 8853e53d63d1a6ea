use std::collections::{HashMap, HashSet};

use crate::{
    core::{
        domain::{EventKind, TaskId, TraceEvent},
        traits::decoder::DecodeError,
    },
    gotrace::{
        events::{self, EventDesc},
        generations, order,
        reader::Reader,
    },
};

pub const HEADER_LEN: usize = 16;
pub const SUPPORTED_VERSIONS: [u32; 7] = [1011, 1019, 1021, 1022, 1023, 1024, 1025];
/// First version written as self-contained generations.
pub const GENERATIONS_VERSION: u32 = 1022;

pub(super) const MAX_STRING_LEN: u64 = 1_000_000;
// Records with this many args or more are length-prefixed.
const INLINE_ARGS: u8 = 4;

/// Decodes a complete trace into events ordered by timestamp.
///
/// Any structural problem aborts the decode; partial results are never
/// returned.
pub fn parse(data: &[u8]) -> Result<Vec<TraceEvent>, DecodeError> {
    let version = parse_header(data)?;
    let body = &data[HEADER_LEN..];

    let events = if version >= GENERATIONS_VERSION {
        generations::decode(body, version)?
    } else {
        let mut decoder = Decoder::new(body, version);
        decoder.run()?;
        decoder.events
    };
    order::into_time_order(events)
}

/// Returns the format version encoded as `1000 * major + minor`.
pub fn parse_header(data: &[u8]) -> Result<u32, DecodeError> {
    let header = data.get(..HEADER_LEN).ok_or(DecodeError::NotATrace)?;
    let minor = header
        .strip_prefix(b"go 1.")
        .and_then(|rest| rest.strip_suffix(b" trace\x00\x00\x00"))
        .and_then(|digits| std::str::from_utf8(digits).ok())
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or(DecodeError::NotATrace)?;

    let version = 1000 + minor;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(DecodeError::UnsupportedVersion {
            version: format!("1.{}", minor),
        });
    }
    Ok(version)
}

struct Decoder<'a> {
    reader: Reader<'a>,
    version: u32,
    string_ids: HashSet<u64>,
    current_p: Option<u64>,
    // Goroutine running on each P at the end of its last batch.
    parked: HashMap<u64, TaskId>,
    last_g: TaskId,
    last_ts: u64,
    events: Vec<TraceEvent>,
}

impl<'a> Decoder<'a> {
    fn new(body: &'a [u8], version: u32) -> Self {
        Self {
            reader: Reader::new(body, HEADER_LEN),
            version,
            string_ids: HashSet::new(),
            current_p: None,
            parked: HashMap::new(),
            last_g: 0,
            last_ts: 0,
            events: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<(), DecodeError> {
        while !self.reader.is_empty() {
            self.record()?;
        }
        Ok(())
    }

    fn record(&mut self) -> Result<(), DecodeError> {
        let offset = self.reader.offset();
        let head = self.reader.byte()?;
        let typ = head & 0x3f;
        let narg = (head >> 6) + 1;

        let desc = events::describe(typ, self.version)
            .ok_or(DecodeError::UnknownEvent { typ, offset })?;

        if typ == events::STRING {
            return self.string_entry(offset);
        }

        let args = self.args(narg, offset)?;
        if typ == events::USER_LOG {
            self.skip_string(offset, true)?;
        }
        check_arg_count(typ, desc, &args, offset)?;

        match typ {
            events::BATCH => {
                self.switch_batch(args[0], args[1]);
                Ok(())
            }
            events::FREQUENCY | events::STACK | events::TIMER_GOROUTINE => {
                let task_id = if typ == events::TIMER_GOROUTINE {
                    args[0]
                } else {
                    0
                };
                self.push(typ, desc, task_id, args, self.last_ts, offset);
                Ok(())
            }
            _ => self.timed_event(typ, desc, args, offset),
        }
    }

    fn args(&mut self, narg: u8, offset: usize) -> Result<Vec<u64>, DecodeError> {
        if narg < INLINE_ARGS {
            return (0..narg).map(|_| self.reader.varint()).collect();
        }

        let want = self.reader.varint()?;
        let start = self.reader.offset();
        let mut args = Vec::new();
        while ((self.reader.offset() - start) as u64) < want {
            args.push(self.reader.varint()?);
        }

        let got = (self.reader.offset() - start) as u64;
        if got != want {
            return Err(DecodeError::WrongLength { offset, want, got });
        }
        Ok(args)
    }

    fn string_entry(&mut self, offset: usize) -> Result<(), DecodeError> {
        let id = self.reader.varint()?;
        if id == 0 {
            return Err(invalid_string(offset, "has invalid id 0"));
        }
        if !self.string_ids.insert(id) {
            return Err(invalid_string(offset, format!("has duplicate id {}", id)));
        }

        self.skip_string(offset, false)
    }

    // Strings only matter for symbolization, which the graph does not need.
    fn skip_string(&mut self, offset: usize, allow_empty: bool) -> Result<(), DecodeError> {
        let len = self.reader.varint()?;
        if len == 0 && !allow_empty {
            return Err(invalid_string(offset, "has invalid length 0"));
        }
        if len > MAX_STRING_LEN {
            return Err(invalid_string(offset, format!("has too large length {}", len)));
        }

        self.reader.bytes(len as usize)?;
        Ok(())
    }

    fn switch_batch(&mut self, p: u64, ticks: u64) {
        if let Some(previous) = self.current_p {
            self.parked.insert(previous, self.last_g);
        }
        self.current_p = Some(p);
        self.last_g = self.parked.get(&p).copied().unwrap_or(0);
        self.last_ts = ticks;
    }

    fn timed_event(
        &mut self,
        typ: u8,
        desc: &'static EventDesc,
        raw: Vec<u64>,
        offset: usize,
    ) -> Result<(), DecodeError> {
        if self.current_p.is_none() {
            return Err(DecodeError::EventBeforeBatch {
                name: desc.name,
                offset,
            });
        }

        let mut ts = self
            .last_ts
            .checked_add(raw[0])
            .ok_or(DecodeError::TimestampOverflow { offset })?;
        self.last_ts = ts;
        let args = raw[1..].to_vec();

        let mut task_id = self.last_g;
        match typ {
            events::GO_START | events::GO_START_LOCAL | events::GO_START_LABEL => {
                self.last_g = args[0];
                task_id = args[0];
            }
            events::GC_START | events::GC_DONE | events::STW_START | events::STW_DONE => {
                task_id = 0;
            }
            events::GO_SYS_EXIT | events::GO_WAITING | events::GO_IN_SYSCALL => {
                task_id = args[0];
            }
            events::CPU_SAMPLE => {
                ts = args[0];
                task_id = args[2];
            }
            _ if events::parks_goroutine(typ) => {
                self.last_g = 0;
            }
            _ => {}
        }

        self.push(typ, desc, task_id, args, ts, offset);
        Ok(())
    }

    fn push(
        &mut self,
        typ: u8,
        desc: &'static EventDesc,
        task_id: TaskId,
        args: Vec<u64>,
        ts: u64,
        offset: usize,
    ) {
        self.events.push(TraceEvent {
            kind: kind_of(typ, desc),
            task_id,
            args,
            ts,
            offset,
        });
    }
}

fn kind_of(typ: u8, desc: &'static EventDesc) -> EventKind {
    match typ {
        events::GO_CREATE => EventKind::TaskCreate,
        events::GO_START | events::GO_START_LOCAL | events::GO_START_LABEL => EventKind::TaskStart,
        events::GO_END => EventKind::TaskEnd,
        _ => EventKind::Other {
            code: typ,
            name: desc.name,
        },
    }
}

fn check_arg_count(
    typ: u8,
    desc: &'static EventDesc,
    args: &[u64],
    offset: usize,
) -> Result<(), DecodeError> {
    let want = if typ == events::STACK {
        // id, frame count, then four values per frame
        match args.get(1) {
            Some(&frames) => usize::try_from(frames)
                .ok()
                .and_then(|frames| frames.checked_mul(4))
                .and_then(|values| values.checked_add(2))
                .unwrap_or(usize::MAX),
            None => 2,
        }
    } else {
        events::expected_args(typ, desc)
    };

    if args.len() != want {
        return Err(DecodeError::WrongArgCount {
            name: desc.name,
            offset,
            want,
            got: args.len(),
        });
    }
    Ok(())
}

fn invalid_string(offset: usize, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidString {
        offset,
        reason: reason.into(),
    }
}
