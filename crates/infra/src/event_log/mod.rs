//! Event log adapters.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsEmitter, RedisStreamsError};

/// Default stream (topic) that company events are appended to.
pub const DEFAULT_STREAM_KEY: &str = "companies_update";
