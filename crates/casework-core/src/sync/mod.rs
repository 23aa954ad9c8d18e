//! Background delivery of queued artifacts.
//!
//! Each domain gets its own [`SyncEngine`] running the two-phase write
//! (upload the binary, then attach its reference). The [`SyncScheduler`]
//! decides when engines drain.

mod engine;
mod metadata;
mod scheduler;
mod strategies;

#[cfg(test)]
mod tests;

pub use engine::{
    DomainSync, DrainReport, SkipReason, SyncEngine, SyncStrategy, NO_BINARY_REFERENCE,
};
pub use metadata::{LastSync, SyncMetadata};
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_INTERVAL};
pub use strategies::{api_engines, ApiStrategy};
