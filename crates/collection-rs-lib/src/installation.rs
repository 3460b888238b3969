//! Acquiring and installing package content.
//!
//! [`pipeline::Pipeline`] owns the worker pools and is the entry point, the other modules are the
//! individual steps it runs inside its tasks.

pub mod worker_pool;
pub mod download;
pub mod extract;
pub mod content;
pub mod materialize;
pub mod install;
pub mod pipeline;
