use std::time::Duration;

pub const SOURCE_FILE_NAME: &str = "main.go";
pub const TRACE_FILE_NAME: &str = "trace.out";
pub const SANDBOX_DIR_PREFIX: &str = "gtrace_";

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);
pub const DEFAULT_GO_BIN: &str = "go";
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

pub const READ_TX_ERR: &str = "Failed to send socket to reading stage";
pub const HANDLE_TX_ERR: &str = "Failed to send submission to handling stage";
pub const RES_TX_ERR: &str = "Failed to send response to responding stage";
