//! Delivery of account verification links

use async_trait::async_trait;
use storefront_db::User;
use tracing::info;

use crate::error::ApiError;

/// Sends a freshly registered user their verification link
#[async_trait]
pub trait VerificationNotifier: Send + Sync {
    async fn send_verification(&self, user: &User, link: &str) -> Result<(), ApiError>;
}

/// Writes the link to the log instead of mailing it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl VerificationNotifier for LogNotifier {
    async fn send_verification(&self, user: &User, link: &str) -> Result<(), ApiError> {
        info!("Verification link for {}: {}", user.email, link);
        Ok(())
    }
}
