use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use corpreg_observability::new_trace_id;

use crate::context::RequestContext;

/// Settings shared by every request's context.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    timeout: Option<Duration>,
}

impl RequestScope {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

/// Opens the request span, logs the request and attaches a `RequestContext`.
///
/// The context's token is cancelled when this future is dropped (client
/// disconnected) and, if a timeout is configured, when the deadline passes.
pub async fn request_context(
    State(scope): State<RequestScope>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = new_trace_id();
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        http_method = %req.method(),
        uri = %req.uri(),
        host = %host,
    );

    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    span.in_scope(|| {
        debug!(
            headers = %format_headers(req.headers()),
            remote_addr = %remote_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            "Incoming Request"
        );
    });

    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();
    if let Some(timeout) = scope.timeout {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => deadline.cancel(),
                _ = deadline.cancelled() => {}
            }
        });
    }

    req.extensions_mut()
        .insert(RequestContext::new(trace_id, span, cancel, remote_ip));

    next.run(req).await
}

/// `name:value,` pairs; credentials are masked.
fn format_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == header::AUTHORIZATION {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{name}:{value},")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn headers_are_listed_with_credentials_masked() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));

        let formatted = format_headers(&headers);
        assert!(formatted.contains("content-type:application/json,"));
        assert!(formatted.contains("authorization:<redacted>,"));
        assert!(!formatted.contains("abc"));
    }
}
