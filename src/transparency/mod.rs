//! Transparency module for the sensor agent.
//!
//! Holds the rolling debug log that records every reading published and
//! every dispatch failure, so users can audit what the agent disclosed.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_capacity, DebugLog, DebugSink, SharedDebugLog,
    MAX_DEBUG_LINES,
};
