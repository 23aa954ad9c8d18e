pub mod cache;
pub mod cancel;
pub mod common;
pub mod completions;
pub mod enqueue;
pub mod fetch;
pub mod pending;
pub mod status;
pub mod sync;
