//! Constants for the download module (limits, timeouts, progress marks).

use std::time::Duration;

/// Default maximum payload size (100 MiB).
pub const DEFAULT_SIZE_LIMIT_BYTES: u64 = 100 * 1024 * 1024;

/// Default per-invocation timeout for the fetch (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Filename used when the caller supplies an empty one.
pub const DEFAULT_FILE_NAME: &str = "download";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall HTTP timeout for saves that stream straight to disk (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Delay between activating a blob trigger and releasing it, so the host's
/// download manager has picked the blob up before the object URL goes away.
pub const DEFAULT_REVOKE_GRACE: Duration = Duration::from_millis(1_000);

/// Delay before the second trigger activation on non-iOS mobile.
pub const DEFAULT_MOBILE_RETRIGGER_DELAY: Duration = Duration::from_millis(100);

/// Progress checkpoints reported by the fetch-and-blob path.
pub(crate) mod progress {
    pub const STARTED: u8 = 5;
    pub const RESPONSE_RECEIVED: u8 = 10;
    pub const READING_BODY: u8 = 30;
    pub const BODY_READ: u8 = 70;
    pub const TRIGGERED: u8 = 90;
    pub const DONE: u8 = 100;
}
