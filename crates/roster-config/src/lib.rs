#![forbid(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(unreachable_pub, clippy::all, clippy::pedantic, clippy::nursery)]

//! Client configuration for Roster.
//!
//! Values are layered: built-in defaults, an optional YAML file, `ROSTER_*`
//! environment variables, then validation. Command-line flags are applied by
//! the caller on top of the result.
//!
//! ```yaml
//! api:
//!   url: https://catalog.example
//!   api_key: ops:secret
//!   timeout_secs: 10
//! polling:
//!   interval_ms: 2000
//!   failure_threshold: 5
//! logging:
//!   level: info
//!   format: json
//! ```

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use model::{ApiConfig, LoggingSettings, PollingConfig, RosterConfig};
pub use validate::{parse_api_url, validate};
