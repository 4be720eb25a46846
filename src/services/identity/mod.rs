pub mod hosted;

use async_trait::async_trait;

/// Resolves a bearer access token to the user id it was issued for.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the token is unknown or expired.
    async fn user_id(&self, access_token: &str) -> anyhow::Result<Option<String>>;
}
