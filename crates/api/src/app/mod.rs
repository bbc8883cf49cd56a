//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: picks store/emitter/region lookup and builds `AppState`
//! - `routes/`: handlers (companies, health check)
//! - `envelope.rs`: the `{status_code, payload | status_text}` body and gzip framing
//! - `errors.rs`: wire-level error kinds

use axum::{
    Router,
    http::{HeaderName, Method, header},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::middleware::{self, RequestScope};

pub mod envelope;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppState, build_state};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_router(state: AppState, scope: RequestScope) -> Router {
    let api = routes::router().layer(axum::middleware::from_fn_with_state(
        scope,
        middleware::request_context,
    ));

    Router::new()
        .nest("/api", api)
        .route("/healthcheck", get(routes::system::healthcheck))
        .layer(ServiceBuilder::new().layer(cors()))
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::AUTHORIZATION,
            HeaderName::from_static("sentry-trace"),
            header::CONTENT_TYPE,
        ])
}
