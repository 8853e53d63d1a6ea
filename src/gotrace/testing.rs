use crate::gotrace::{events, generations};

/// Encodes trace fixtures byte by byte, the way the Go runtime writes them.
#[derive(Debug, Clone)]
pub struct TraceWriter {
    data: Vec<u8>,
}

impl TraceWriter {
    pub fn new(version: &str) -> Self {
        let mut data = format!("go {} trace", version).into_bytes();
        data.extend_from_slice(&[0, 0, 0]);
        Self { data }
    }

    pub fn event(mut self, typ: u8, args: &[u64]) -> Self {
        if (1..4).contains(&args.len()) {
            self.data.push(typ | (((args.len() - 1) as u8) << 6));
            for &arg in args {
                put_varint(&mut self.data, arg);
            }
        } else {
            let mut encoded = Vec::new();
            for &arg in args {
                put_varint(&mut encoded, arg);
            }
            self.data.push(typ | (3 << 6));
            put_varint(&mut self.data, encoded.len() as u64);
            self.data.extend_from_slice(&encoded);
        }
        self
    }

    pub fn string(mut self, id: u64, value: &str) -> Self {
        self.data.push(events::STRING);
        put_varint(&mut self.data, id);
        put_varint(&mut self.data, value.len() as u64);
        self.data.extend_from_slice(value.as_bytes());
        self
    }

    pub fn frequency(self, ticks_per_sec: u64) -> Self {
        self.event(events::FREQUENCY, &[ticks_per_sec])
    }

    pub fn stack(self, id: u64, frames: &[[u64; 4]]) -> Self {
        let mut args = vec![id, frames.len() as u64];
        args.extend(frames.iter().flatten());
        self.event(events::STACK, &args)
    }

    pub fn batch(self, p: u64, ticks: u64) -> Self {
        self.event(events::BATCH, &[p, ticks])
    }

    pub fn go_create(self, delta: u64, g: u64, stack: u64) -> Self {
        self.event(events::GO_CREATE, &[delta, g, stack, 0])
    }

    pub fn go_start(self, delta: u64, g: u64, seq: u64) -> Self {
        self.event(events::GO_START, &[delta, g, seq])
    }

    pub fn go_start_label(self, delta: u64, g: u64, seq: u64, label: u64) -> Self {
        self.event(events::GO_START_LABEL, &[delta, g, seq, label])
    }

    pub fn go_end(self, delta: u64) -> Self {
        self.event(events::GO_END, &[delta])
    }

    pub fn user_log(self, delta: u64, id: u64, key: u64, stack: u64, value: &str) -> Self {
        let mut writer = self.event(events::USER_LOG, &[delta, id, key, stack]);
        put_varint(&mut writer.data, value.len() as u64);
        writer.data.extend_from_slice(value.as_bytes());
        writer
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

/// Encodes fixtures in the generation format of Go 1.22 and later.
#[derive(Debug, Clone)]
pub struct GenerationWriter {
    data: Vec<u8>,
}

impl GenerationWriter {
    pub fn new(version: &str) -> Self {
        Self {
            data: TraceWriter::new(version).finish(),
        }
    }

    /// A batch of timed records written by thread `m`; each record is its
    /// type and args, the timestamp delta first.
    pub fn events(self, generation: u64, m: u64, ts: u64, records: &[(u8, &[u64])]) -> Self {
        let mut data = Vec::new();
        for (typ, args) in records {
            data.push(*typ);
            for &arg in args.iter() {
                put_varint(&mut data, arg);
            }
        }
        self.batch(generation, m, ts, data)
    }

    pub fn strings(self, generation: u64, entries: &[(u64, &str)]) -> Self {
        let mut data = vec![generations::STRINGS];
        for (id, value) in entries {
            data.push(generations::STRING);
            put_varint(&mut data, *id);
            put_varint(&mut data, value.len() as u64);
            data.extend_from_slice(value.as_bytes());
        }
        self.batch(generation, u64::MAX, 0, data)
    }

    pub fn stacks(self, generation: u64, entries: &[(u64, &[[u64; 4]])]) -> Self {
        let mut data = vec![generations::STACKS];
        for (id, frames) in entries {
            data.push(generations::STACK);
            put_varint(&mut data, *id);
            put_varint(&mut data, frames.len() as u64);
            for &value in frames.iter().flatten() {
                put_varint(&mut data, value);
            }
        }
        self.batch(generation, u64::MAX, 0, data)
    }

    /// Samples as `[time, m, p, g, stack]`.
    pub fn cpu_samples(self, generation: u64, samples: &[[u64; 5]]) -> Self {
        let mut data = vec![generations::CPU_SAMPLES];
        for sample in samples {
            data.push(generations::CPU_SAMPLE);
            for &value in sample {
                put_varint(&mut data, value);
            }
        }
        self.batch(generation, u64::MAX, 0, data)
    }

    pub fn frequency(self, generation: u64, ticks_per_sec: u64) -> Self {
        let mut data = vec![generations::FREQUENCY];
        put_varint(&mut data, ticks_per_sec);
        self.batch(generation, u64::MAX, 0, data)
    }

    pub fn sync(self, generation: u64, ts: u64, ticks_per_sec: u64) -> Self {
        let mut data = vec![generations::SYNC, generations::FREQUENCY];
        put_varint(&mut data, ticks_per_sec);
        self.batch(generation, u64::MAX, ts, data)
    }

    pub fn experimental(mut self, generation: u64, m: u64, ts: u64, payload: &[u8]) -> Self {
        self.data.push(generations::EXPERIMENTAL_BATCH);
        self.data.push(0);
        self.header(generation, m, ts, payload)
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }

    fn batch(mut self, generation: u64, m: u64, ts: u64, data: Vec<u8>) -> Self {
        self.data.push(generations::EVENT_BATCH);
        self.header(generation, m, ts, &data)
    }

    fn header(mut self, generation: u64, m: u64, ts: u64, data: &[u8]) -> Self {
        put_varint(&mut self.data, generation);
        put_varint(&mut self.data, m);
        put_varint(&mut self.data, ts);
        put_varint(&mut self.data, data.len() as u64);
        self.data.extend_from_slice(data);
        self
    }
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}
