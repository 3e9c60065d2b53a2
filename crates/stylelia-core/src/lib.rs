pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod git;
pub mod lint;
pub mod pipeline;
pub mod platform;
pub mod pull_request;
pub mod report;
pub mod sequencer;
pub mod types;

pub use error::{ReconcileError, Result};
pub use types::*;
