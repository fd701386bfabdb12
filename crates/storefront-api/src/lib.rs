//! Storefront REST API
//!
//! Axum routes for the JSON authentication API, account registration and
//! verification, admin account control and the cookie-based browser
//! session endpoints.

pub mod error;
pub mod notify;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use notify::{LogNotifier, VerificationNotifier};
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
