//! HTTP API: configuration, routing, request execution and response mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod executor;
pub mod middleware;
