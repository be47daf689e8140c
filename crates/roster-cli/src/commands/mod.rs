//! Command handlers grouped by concern.

pub(crate) mod jobs;
pub(crate) mod list;
pub(crate) mod submit;
