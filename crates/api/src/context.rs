use std::net::IpAddr;

use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Per-request context, created by `middleware::request_context`.
///
/// The span carries the request's correlation fields; everything the handler
/// logs runs inside it. The token is cancelled when the client goes away or
/// the request outlives its deadline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: String,
    span: Span,
    cancel: CancellationToken,
    remote_ip: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(
        trace_id: String,
        span: Span,
        cancel: CancellationToken,
        remote_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            trace_id,
            span,
            cancel,
            remote_ip,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Caller address as seen on the socket, without the port.
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_ip
    }
}
