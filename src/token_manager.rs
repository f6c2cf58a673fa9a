use chrono::Utc;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use crate::config::Config;
use crate::errors::CrmError;
use crate::models::{Credentials, RefreshTokenRequest, TokenResponse};
use crate::token_store::TokenStore;

/// Short, non-reversible tag for a token so logs can tell pairs apart.
pub fn token_fingerprint(token: &str) -> String {
    if token.is_empty() {
        return "<none>".to_string();
    }
    let digest = Sha256::digest(token.as_bytes());
    format!("sha256:{}", &hex::encode(digest)[..8])
}

/// `Authorization` header value derived from one specific access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
    access_token: String,
}

impl AuthHeader {
    fn bearer(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
        }
    }

    pub fn value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn issued_for(&self, access_token: &str) -> bool {
        self.access_token == access_token
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthHeader(Bearer {})", token_fingerprint(&self.access_token))
    }
}

/// Owns the OAuth credentials and rotates them through the CRM token endpoint.
///
/// All refreshes happen while the credential lock is held, so concurrent
/// requests that hit a 401 at the same time share one refresh instead of
/// burning the single-use refresh token twice.
pub struct TokenManager {
    client: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    credentials: Mutex<Credentials>,
    store: Arc<dyn TokenStore>,
}

impl TokenManager {
    pub fn new(
        client: Client,
        config: &Config,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, CrmError> {
        let token_url = config
            .crm_base_url
            .join("/oauth2/access_token")
            .map_err(|e| CrmError::AuthRefresh(format!("Failed to build token URL: {}", e)))?;

        Ok(Self {
            client,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            credentials: Mutex::new(Credentials::new(
                config.access_token.clone(),
                config.refresh_token.clone(),
            )),
            store,
        })
    }

    /// Returns the header for the current access token, refreshing first if none is held.
    pub async fn ensure_headers(&self) -> Result<AuthHeader, CrmError> {
        let mut credentials = self.credentials.lock().await;
        if !credentials.has_access_token() {
            tracing::info!("No access token held, refreshing before first CRM call");
            self.refresh_locked(&mut credentials).await?;
        }
        Ok(AuthHeader::bearer(&credentials.access_token))
    }

    /// Unconditionally exchanges the refresh token for a new pair.
    pub async fn refresh(&self) -> Result<(), CrmError> {
        let mut credentials = self.credentials.lock().await;
        self.refresh_locked(&mut credentials).await
    }

    /// Refreshes after `rejected` got a 401 and returns the header to retry with.
    ///
    /// If the held token no longer matches `rejected`, another request already
    /// rotated the pair and its result is reused.
    pub async fn refresh_after_unauthorized(
        &self,
        rejected: &AuthHeader,
    ) -> Result<AuthHeader, CrmError> {
        let mut credentials = self.credentials.lock().await;
        if credentials.has_access_token() && !rejected.issued_for(&credentials.access_token) {
            tracing::debug!(
                "Token already rotated by a concurrent request ({}), reusing it",
                token_fingerprint(&credentials.access_token)
            );
        } else {
            self.refresh_locked(&mut credentials).await?;
        }
        Ok(AuthHeader::bearer(&credentials.access_token))
    }

    /// Snapshot of the credentials currently held.
    pub async fn credentials(&self) -> Credentials {
        self.credentials.lock().await.clone()
    }

    async fn refresh_locked(&self, credentials: &mut Credentials) -> Result<(), CrmError> {
        tracing::info!(
            "Refreshing CRM access token (refresh token {})",
            token_fingerprint(&credentials.refresh_token)
        );

        let body = RefreshTokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            grant_type: "refresh_token",
            refresh_token: &credentials.refresh_token,
            redirect_uri: &self.redirect_uri,
        };

        let response = self
            .client
            .post(self.token_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error refreshing access token: {}", e);
                CrmError::AuthRefresh(format!("token request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Error refreshing access token: {} {}", status, error_text);
            return Err(CrmError::AuthRefresh(format!(
                "token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Error refreshing access token: unreadable response: {}", e);
            CrmError::AuthRefresh(format!("failed to parse token response: {}", e))
        })?;

        if tokens.access_token.is_empty() {
            tracing::error!("Error refreshing access token: empty access_token in response");
            return Err(CrmError::AuthRefresh(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        credentials.access_token = tokens.access_token;
        credentials.refresh_token = tokens.refresh_token;
        credentials.refreshed_at = Some(Utc::now());

        tracing::info!(
            "Access token refreshed: {} ({} type, expires in {:?}s)",
            token_fingerprint(&credentials.access_token),
            tokens.token_type.as_deref().unwrap_or("unknown"),
            tokens.expires_in
        );

        if let Err(e) = self.store.persist(credentials) {
            tracing::warn!("Failed to persist rotated tokens: {}", e);
        }

        Ok(())
    }
}
