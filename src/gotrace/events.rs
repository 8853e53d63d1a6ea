//! Event descriptors of the Go execution trace format (1.11 to 1.21).

pub const NONE: u8 = 0;
pub const BATCH: u8 = 1;
pub const FREQUENCY: u8 = 2;
pub const STACK: u8 = 3;
pub const GC_START: u8 = 7;
pub const GC_DONE: u8 = 8;
pub const STW_START: u8 = 9;
pub const STW_DONE: u8 = 10;
pub const GO_CREATE: u8 = 13;
pub const GO_START: u8 = 14;
pub const GO_END: u8 = 15;
pub const GO_STOP: u8 = 16;
pub const GO_SCHED: u8 = 17;
pub const GO_PREEMPT: u8 = 18;
pub const GO_SLEEP: u8 = 19;
pub const GO_BLOCK: u8 = 20;
pub const GO_BLOCK_SEND: u8 = 22;
pub const GO_BLOCK_RECV: u8 = 23;
pub const GO_BLOCK_SELECT: u8 = 24;
pub const GO_BLOCK_SYNC: u8 = 25;
pub const GO_BLOCK_COND: u8 = 26;
pub const GO_BLOCK_NET: u8 = 27;
pub const GO_SYS_EXIT: u8 = 29;
pub const GO_SYS_BLOCK: u8 = 30;
pub const GO_WAITING: u8 = 31;
pub const GO_IN_SYSCALL: u8 = 32;
pub const TIMER_GOROUTINE: u8 = 35;
pub const STRING: u8 = 37;
pub const GO_START_LOCAL: u8 = 38;
pub const GO_START_LABEL: u8 = 41;
pub const GO_BLOCK_GC: u8 = 42;
pub const USER_LOG: u8 = 48;
pub const CPU_SAMPLE: u8 = 49;
pub const COUNT: u8 = 50;

#[derive(Debug)]
pub struct EventDesc {
    pub name: &'static str,
    pub min_version: u32,
    /// A trailing stack id follows the named args.
    pub stack: bool,
    pub args: &'static [&'static str],
}

const fn desc(
    name: &'static str,
    min_version: u32,
    stack: bool,
    args: &'static [&'static str],
) -> EventDesc {
    EventDesc {
        name,
        min_version,
        stack,
        args,
    }
}

static DESCRIPTIONS: [EventDesc; COUNT as usize] = [
    desc("None", 1005, false, &[]),
    desc("Batch", 1005, false, &["p", "ticks"]),
    desc("Frequency", 1005, false, &["freq"]),
    desc("Stack", 1005, false, &["id", "siz"]),
    desc("Gomaxprocs", 1005, true, &["procs"]),
    desc("ProcStart", 1005, false, &["thread"]),
    desc("ProcStop", 1005, false, &[]),
    desc("GCStart", 1005, true, &["seq"]),
    desc("GCDone", 1005, false, &[]),
    desc("STWStart", 1005, false, &["kindid"]),
    desc("STWDone", 1005, false, &[]),
    desc("GCSweepStart", 1005, true, &[]),
    desc("GCSweepDone", 1005, false, &["swept", "reclaimed"]),
    desc("GoCreate", 1005, true, &["g", "stack"]),
    desc("GoStart", 1005, false, &["g", "seq"]),
    desc("GoEnd", 1005, false, &[]),
    desc("GoStop", 1005, true, &[]),
    desc("GoSched", 1005, true, &[]),
    desc("GoPreempt", 1005, true, &[]),
    desc("GoSleep", 1005, true, &[]),
    desc("GoBlock", 1005, true, &[]),
    desc("GoUnblock", 1005, true, &["g", "seq"]),
    desc("GoBlockSend", 1005, true, &[]),
    desc("GoBlockRecv", 1005, true, &[]),
    desc("GoBlockSelect", 1005, true, &[]),
    desc("GoBlockSync", 1005, true, &[]),
    desc("GoBlockCond", 1005, true, &[]),
    desc("GoBlockNet", 1005, true, &[]),
    desc("GoSysCall", 1005, true, &[]),
    desc("GoSysExit", 1005, false, &["g", "seq", "ts"]),
    desc("GoSysBlock", 1005, false, &[]),
    desc("GoWaiting", 1005, false, &["g"]),
    desc("GoInSyscall", 1005, false, &["g"]),
    desc("HeapAlloc", 1005, false, &["mem"]),
    desc("HeapGoal", 1005, false, &["mem"]),
    desc("TimerGoroutine", 1005, false, &["g"]),
    desc("FutileWakeup", 1005, false, &[]),
    desc("String", 1007, false, &[]),
    desc("GoStartLocal", 1007, false, &["g"]),
    desc("GoUnblockLocal", 1007, true, &["g"]),
    desc("GoSysExitLocal", 1007, false, &["g", "ts"]),
    desc("GoStartLabel", 1008, false, &["g", "seq", "labelid"]),
    desc("GoBlockGC", 1008, true, &[]),
    desc("GCMarkAssistStart", 1009, true, &[]),
    desc("GCMarkAssistDone", 1009, false, &[]),
    desc("UserTaskCreate", 1011, true, &["taskid", "pid", "typeid"]),
    desc("UserTaskEnd", 1011, true, &["taskid"]),
    desc("UserRegion", 1011, true, &["taskid", "mode", "typeid"]),
    desc("UserLog", 1011, true, &["id", "keyid"]),
    desc("CPUSample", 1019, true, &["ts", "p", "g"]),
];

/// Looks up a record type, rejecting types the given format version
/// does not define.
pub fn describe(typ: u8, version: u32) -> Option<&'static EventDesc> {
    if typ == NONE {
        return None;
    }
    DESCRIPTIONS
        .get(typ as usize)
        .filter(|desc| desc.min_version <= version)
}

/// Records that carry no leading timestamp delta.
pub fn is_untimed(typ: u8) -> bool {
    matches!(typ, BATCH | FREQUENCY | STACK | TIMER_GOROUTINE)
}

/// Records after which the processor no longer runs a goroutine.
pub fn parks_goroutine(typ: u8) -> bool {
    matches!(
        typ,
        GO_END
            | GO_STOP
            | GO_SCHED
            | GO_PREEMPT
            | GO_SLEEP
            | GO_BLOCK
            | GO_BLOCK_SEND
            | GO_BLOCK_RECV
            | GO_BLOCK_SELECT
            | GO_BLOCK_SYNC
            | GO_BLOCK_COND
            | GO_BLOCK_NET
            | GO_SYS_BLOCK
            | GO_BLOCK_GC
    )
}

/// Number of varints a record of this type carries, except `Stack`,
/// whose length depends on its frame count.
pub fn expected_args(typ: u8, desc: &EventDesc) -> usize {
    let mut count = desc.args.len() + usize::from(desc.stack);
    if !is_untimed(typ) {
        count += 1;
    }
    count
}
