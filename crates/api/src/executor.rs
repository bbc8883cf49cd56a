//! Request Executor: runs a handler body concurrently with the request's
//! cancellation signal and turns the outcome into the wire envelope.

use std::future::Future;

use axum::response::Response;
use tracing::{Instrument, debug, error};

use crate::app::envelope::{Payload, envelope_json, respond};
use crate::app::errors::ApiError;
use crate::context::RequestContext;

/// Run `handler` on its own task and answer with whichever comes first: its
/// outcome or the cancellation of `ctx`.
///
/// A handler that loses the race is detached, not aborted. It keeps running
/// to completion and its result is dropped; the mutation it may have started
/// is not interrupted once past its first step.
///
/// A panic inside `handler` is contained by the task boundary and answered
/// with `ApiError::Internal`; the process-wide panic hook logs the backtrace.
pub async fn execute<F>(ctx: &RequestContext, handler: F) -> Response
where
    F: Future<Output = Result<Payload, ApiError>> + Send + 'static,
{
    let task = tokio::spawn(handler.instrument(ctx.span().clone()));

    let outcome = tokio::select! {
        joined = task => match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                ctx.span().in_scope(|| {
                    error!(panicked = e.is_panic(), error = %e, "handler task failed");
                });
                Err(ApiError::Internal)
            }
        },
        _ = ctx.cancel_token().cancelled() => Err(ApiError::Cancelled),
    };

    ctx.span().in_scope(|| {
        let status = if outcome.is_ok() { "ok" } else { "err" };
        debug!(
            trace_id = ctx.trace_id(),
            status,
            body = %String::from_utf8_lossy(&envelope_json(&outcome)),
            "Outcoming Response"
        );
    });

    respond(&outcome)
}
