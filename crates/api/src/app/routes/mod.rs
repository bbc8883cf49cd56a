use axum::Router;

use crate::app::services::AppState;

pub mod companies;
pub mod system;

/// Router for everything under the `/api` prefix.
pub fn router() -> Router<AppState> {
    Router::new().nest("/companies", companies::router())
}
