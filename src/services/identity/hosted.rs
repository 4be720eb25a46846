use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;

use super::IdentityProvider;

/// Hosted auth service exposing `GET /auth/v1/user`.
pub struct HostedAuthProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HostedAuthProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HostedAuthProvider {
    async fn user_id(&self, access_token: &str) -> anyhow::Result<Option<String>> {
        let resp = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(access_token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .context("failed to call auth service")?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse auth service response")?;

        if !status.is_success() {
            anyhow::bail!("auth service error ({}): {}", status, data);
        }

        Ok(data["id"].as_str().map(|s| s.to_string()))
    }
}
