#![forbid(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(unreachable_pub, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

//! Operator CLI for Roster catalogs.
//!
//! Layout:
//! - `cli.rs`: argument parsing, configuration layering and dispatch
//! - `commands/`: command handlers grouped by concern
//! - `client.rs`: shared context and error types
//! - `output.rs`: renderers for records, results and notifications
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod output;

pub use cli::run;
