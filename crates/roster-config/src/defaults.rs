//! Default values applied before the file and environment layers.

/// Catalog service base URL.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
/// Per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
/// Delay between job status polls in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Consecutive poll failures before escalation; `0` disables escalation.
pub const DEFAULT_POLL_FAILURE_THRESHOLD: u32 = 5;
/// Log level used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";
