//! Client credentials token acquisition.

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use super::models::TokenResponse;
use crate::providers::traits::RemoteApiError;

/// Default Microsoft identity platform authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scope granting access to Azure Resource Manager.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Bearer token for Azure Resource Manager.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Wrap an existing bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Raw bearer value.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// When the token stops being valid, if the issuer said so.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Service principal credential (tenant, client id, client secret).
#[derive(Clone)]
pub struct ClientSecretCredential {
    client: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    /// Create a credential against the public Microsoft identity platform.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, RemoteApiError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Use a different authority host (sovereign clouds, tests).
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    /// Request a token for Azure Resource Manager.
    ///
    /// # Errors
    /// Returns [`RemoteApiError::Auth`] when the identity platform rejects the
    /// credential, or a transport error.
    pub async fn get_token(&self) -> Result<AccessToken, RemoteApiError> {
        let url = self.token_url();
        debug!(url = %url, client_id = %self.client_id, "Requesting access token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", ARM_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::OK {
            let token: TokenResponse = serde_json::from_str(&text)?;
            let expires_at = token
                .expires_in
                .and_then(|secs| expiry_after(Utc::now(), secs));
            info!(tenant_id = %self.tenant_id, "Acquired Azure access token");
            Ok(AccessToken::new(token.access_token, expires_at))
        } else {
            Err(RemoteApiError::Auth(format!(
                "token request failed with {}: {text}",
                status.as_u16()
            )))
        }
    }
}

/// `now` plus `secs`, `None` when the lifetime does not fit a timestamp.
fn expiry_after(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("authority", &self.authority)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}
