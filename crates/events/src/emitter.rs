//! Event emitter abstraction (mechanics only).
//!
//! An emitter appends one keyed message to an append-only log. The contract is
//! deliberately narrow:
//!
//! - **Synchronous**: `send_event` returns only after the log accepted (or
//!   rejected) the message.
//! - **At-most-once**: no internal retry and no local buffering. A failure is
//!   surfaced to the caller immediately, which for company mutations means the
//!   surrounding transaction is rolled back.
//! - **One connection**: implementations own a single long-lived outbound
//!   connection. Closing it is a process-shutdown concern (`close`), not part of
//!   the per-request contract.

use std::sync::Arc;

use thiserror::Error;

use crate::event::EventName;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The emitter was closed (process shutting down).
    #[error("event emitter is closed")]
    Closed,

    /// The connection to the log failed.
    #[error("event log connection error: {0}")]
    Connection(String),

    /// The log refused the write.
    #[error("event log rejected message: {0}")]
    Rejected(String),
}

/// Publishes keyed messages to an append-only log.
///
/// Implementations must be `Send + Sync`; mutations running on different
/// requests publish concurrently through one shared emitter.
pub trait EventEmitter: Send + Sync {
    /// Append one message keyed by `name` with `payload` as its value.
    fn send_event(&self, name: EventName, payload: &[u8]) -> Result<(), EmitError>;

    /// Release the outbound connection. Later sends fail with `EmitError::Closed`.
    fn close(&self) -> Result<(), EmitError>;
}

impl<E> EventEmitter for Arc<E>
where
    E: EventEmitter + ?Sized,
{
    fn send_event(&self, name: EventName, payload: &[u8]) -> Result<(), EmitError> {
        (**self).send_event(name, payload)
    }

    fn close(&self) -> Result<(), EmitError> {
        (**self).close()
    }
}
