use std::fmt;
use std::time::Duration;
use url::Url;

use crate::token_manager::token_fingerprint;

/// Runtime configuration, read once at startup.
///
/// The access and refresh tokens here are only the *initial* values; after the
/// first refresh the live pair is owned by `TokenManager`.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub amocrm_domain: String,
    /// Scheme + host every CRM request is built from. Defaults to `https://{domain}`.
    pub crm_base_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub access_token: String,
    pub refresh_token: String,
    pub http_timeout: Duration,
    /// Mirror rotated tokens into the process environment (`EnvTokenStore`).
    pub mirror_tokens_to_env: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            let value =
                lookup(key).ok_or_else(|| anyhow::anyhow!("{} environment variable required", key))?;
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", key);
            }
            Ok(value.trim().to_string())
        };

        let amocrm_domain = required("AMOCRM_DOMAIN").and_then(|domain| {
            if domain.contains("://") || domain.contains('/') {
                anyhow::bail!("AMOCRM_DOMAIN must be a bare host name, e.g. example.amocrm.ru");
            }
            Ok(domain)
        })?;

        let crm_base_url = match lookup("AMOCRM_BASE_URL").filter(|s| !s.trim().is_empty()) {
            Some(raw) => {
                if !raw.starts_with("http://") && !raw.starts_with("https://") {
                    anyhow::bail!("AMOCRM_BASE_URL must start with http:// or https://");
                }
                Url::parse(raw.trim())
                    .map_err(|e| anyhow::anyhow!("AMOCRM_BASE_URL is not a valid URL: {}", e))?
            }
            None => Url::parse(&format!("https://{}", amocrm_domain))
                .map_err(|e| anyhow::anyhow!("AMOCRM_DOMAIN is not a valid host: {}", e))?,
        };

        let redirect_uri = required("AMOCRM_REDIRECT_URI").and_then(|uri| {
            if !uri.starts_with("http://") && !uri.starts_with("https://") {
                anyhow::bail!("AMOCRM_REDIRECT_URI must start with http:// or https://");
            }
            Ok(uri)
        })?;

        let config = Self {
            port: lookup("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            amocrm_domain,
            crm_base_url,
            client_id: required("AMOCRM_CLIENT_ID")?,
            client_secret: required("AMOCRM_CLIENT_SECRET")?,
            redirect_uri,
            access_token: lookup("AMOCRM_ACCESS_TOKEN")
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
            refresh_token: required("AMOCRM_REFRESH_TOKEN")?,
            http_timeout: lookup("CRM_HTTP_TIMEOUT_SECS")
                .map(|raw| {
                    raw.parse::<u64>().map_err(|_| {
                        anyhow::anyhow!("CRM_HTTP_TIMEOUT_SECS must be a whole number of seconds")
                    })
                })
                .transpose()?
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),
            mirror_tokens_to_env: lookup("AMOCRM_MIRROR_TOKENS_TO_ENV")
                .map(|val| matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("CRM base URL: {}", config.crm_base_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.access_token.is_empty() {
            tracing::info!("No initial access token configured; first request will refresh");
        }

        Ok(config)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("amocrm_domain", &self.amocrm_domain)
            .field("crm_base_url", &self.crm_base_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token", &token_fingerprint(&self.access_token))
            .field("refresh_token", &token_fingerprint(&self.refresh_token))
            .field("http_timeout", &self.http_timeout)
            .field("mirror_tokens_to_env", &self.mirror_tokens_to_env)
            .finish()
    }
}
