//! API routes

mod auth;
mod health;
pub mod metrics;
mod types;
mod users;
mod web;


use axum::Router;
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

pub use auth::{RequireAdmin, RequireUser};
pub use types::*;

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .merge(web::routes())
        .with_state(state);

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
