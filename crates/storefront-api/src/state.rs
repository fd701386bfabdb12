//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use storefront_auth::{AuthService, CookieSettings, SessionBridge};
use storefront_db::Database;

use crate::notify::VerificationNotifier;

/// Handle used to render the Prometheus scrape output
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
    /// Session carrier for JSON API clients
    pub bearer: SessionBridge,
    /// Session carrier for browser clients
    pub browser: SessionBridge,
    pub notifier: Arc<dyn VerificationNotifier>,
    /// Externally visible base URL, used to build verification links
    pub public_url: String,
}

impl AppState {
    pub fn new(
        db: Database,
        auth: Arc<AuthService>,
        cookies: CookieSettings,
        notifier: Arc<dyn VerificationNotifier>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            auth,
            bearer: SessionBridge::Bearer,
            browser: SessionBridge::Cookie(cookies),
            notifier,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Link that marks the account with this public identifier verified
    pub fn verification_link(&self, user_uuid: &str) -> String {
        format!("{}/api/user/verify/{}", self.public_url, user_uuid)
    }
}
