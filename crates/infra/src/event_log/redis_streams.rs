//! Redis Streams-backed event emitter.
//!
//! Each event becomes one stream entry with two fields:
//!
//! - `key`: the event name (`company_create`, `company_update`, `company_delete`)
//! - `value`: the JSON payload bytes
//!
//! The emitter dials once at startup and keeps that connection for the life of
//! the process. Sends are serialized through a mutex; there is no retry and no
//! local buffering, so a failed `XADD` is reported straight back to the
//! mutation that is waiting on it.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error, instrument};

use corpreg_events::{EmitError, EventEmitter, EventName};

#[derive(Debug, thiserror::Error)]
pub enum RedisStreamsError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),
}

pub struct RedisStreamsEmitter {
    conn: Mutex<Option<redis::Connection>>,
    stream_key: String,
}

impl core::fmt::Debug for RedisStreamsEmitter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStreamsEmitter")
            .field("stream_key", &self.stream_key)
            .finish_non_exhaustive()
    }
}

impl RedisStreamsEmitter {
    /// Open the emitter's connection.
    ///
    /// * `redis_url` - e.g. `redis://localhost:6379`
    /// * `stream_key` - stream to append to (e.g. `companies_update`)
    /// * `timeout` - bound on connect and on each write/read round trip
    pub fn connect(
        redis_url: impl AsRef<str>,
        stream_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        let conn = client
            .get_connection_with_timeout(timeout)
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        conn.set_write_timeout(Some(timeout))
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        conn.set_read_timeout(Some(timeout))
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            stream_key: stream_key.into(),
        })
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }
}

fn classify(err: redis::RedisError) -> EmitError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
        EmitError::Connection(err.to_string())
    } else {
        EmitError::Rejected(err.to_string())
    }
}

impl EventEmitter for RedisStreamsEmitter {
    #[instrument(skip(self, payload), fields(stream_key = %self.stream_key, event = %name), err)]
    fn send_event(&self, name: EventName, payload: &[u8]) -> Result<(), EmitError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| EmitError::Connection("emitter lock poisoned".to_string()))?;
        let conn = guard.as_mut().ok_or(EmitError::Closed)?;

        debug!("Sending event");

        let entry_id: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg("key")
            .arg(name.as_str())
            .arg("value")
            .arg(payload)
            .query(conn)
            .map_err(|e| {
                error!(error = %e, "XADD failed");
                classify(e)
            })?;

        debug!(entry_id = %entry_id, "Event appended");
        Ok(())
    }

    fn close(&self) -> Result<(), EmitError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| EmitError::Connection("emitter lock poisoned".to_string()))?;
        guard.take();
        Ok(())
    }
}
