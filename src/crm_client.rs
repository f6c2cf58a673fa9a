use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::enrichment::{attach_contacts, unique_contact_ids};
use crate::errors::{CrmError, Resource};
use crate::models::{Contact, EnrichedLead, Lead};
use crate::token_manager::{AuthHeader, TokenManager};
use crate::token_store::TokenStore;

/// Result of a single outbound fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 2xx with the raw response body.
    Success(String),
    /// 401 with whatever body the CRM sent.
    Unauthorized(String),
    /// Transport error or any other status.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Accept,
    RefreshAndRetry,
    GiveUp,
}

/// Retry policy: only a 401 on the first attempt earns a refresh and one more try.
pub fn decide(outcome: &FetchOutcome, attempt: u32) -> RetryDecision {
    match outcome {
        FetchOutcome::Success(_) => RetryDecision::Accept,
        FetchOutcome::Unauthorized(_) if attempt == 0 => RetryDecision::RefreshAndRetry,
        FetchOutcome::Unauthorized(_) | FetchOutcome::Failed(_) => RetryDecision::GiveUp,
    }
}

/// Client for the CRM REST API (leads + contacts).
#[derive(Clone)]
pub struct CrmClient {
    client: Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
}

impl CrmClient {
    /// Creates a client whose token manager is seeded from `config`.
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create CRM HTTP client: {}", e))?;
        let tokens = TokenManager::new(client.clone(), config, store)?;

        Ok(Self {
            client,
            base_url: config.crm_base_url.clone(),
            tokens: Arc::new(tokens),
        })
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Fetches the first page of leads matching `query` and inlines their contacts.
    ///
    /// An absent or empty query returns the unfiltered page.
    pub async fn get_leads(&self, query: Option<&str>) -> Result<Vec<EnrichedLead>, CrmError> {
        let params: Vec<(&str, String)> = match query.filter(|q| !q.is_empty()) {
            Some(q) => vec![("query", q.to_string())],
            None => Vec::new(),
        };

        tracing::info!("Fetching leads from CRM (query: {:?})", query);
        let body = self.fetch_with_reauth(Resource::Leads, &params).await?;
        let leads: Vec<Lead> = extract_embedded(&body, Resource::Leads)?;
        tracing::debug!("Parsed {} lead(s)", leads.len());

        let contact_ids = unique_contact_ids(&leads);
        let contacts = self.get_contacts(&contact_ids).await?;

        Ok(attach_contacts(leads, &contacts))
    }

    /// Fetches the given contacts in one request. No request is made for an empty list.
    pub async fn get_contacts(&self, ids: &[i64]) -> Result<Vec<Contact>, CrmError> {
        if ids.is_empty() {
            tracing::debug!("No contact ids referenced, skipping contacts request");
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        tracing::info!("Fetching {} contact(s) from CRM", ids.len());

        let body = self
            .fetch_with_reauth(Resource::Contacts, &[("id", joined)])
            .await?;
        extract_embedded(&body, Resource::Contacts)
    }

    async fn fetch_with_reauth(
        &self,
        resource: Resource,
        params: &[(&str, String)],
    ) -> Result<String, CrmError> {
        let url = self.base_url.join(resource.path()).map_err(|e| CrmError::Request {
            resource,
            reason: format!("Failed to build URL: {}", e),
        })?;

        let mut header = self.tokens.ensure_headers().await?;
        let mut attempt = 0;
        loop {
            let outcome = self.send(&url, params, &header).await;
            if let (RetryDecision::RefreshAndRetry, FetchOutcome::Unauthorized(reason)) =
                (decide(&outcome, attempt), &outcome)
            {
                tracing::warn!(
                    "CRM rejected token fetching {} ({}), refreshing and retrying",
                    resource,
                    reason
                );
                header = self.tokens.refresh_after_unauthorized(&header).await?;
                attempt += 1;
                continue;
            }

            return match outcome {
                FetchOutcome::Success(body) => {
                    tracing::debug!("CRM {} response: {}", resource, body);
                    Ok(body)
                }
                FetchOutcome::Unauthorized(reason) | FetchOutcome::Failed(reason) => {
                    tracing::error!("Error fetching {}: {}", resource, reason);
                    Err(CrmError::Request { resource, reason })
                }
            };
        }
    }

    async fn send(
        &self,
        url: &Url,
        params: &[(&str, String)],
        header: &AuthHeader,
    ) -> FetchOutcome {
        let response = match self
            .client
            .get(url.clone())
            .query(params)
            .header(reqwest::header::AUTHORIZATION, header.value())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(format!("CRM request failed: {}", e)),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return FetchOutcome::Failed(format!(
                    "failed to read CRM response ({}): {}",
                    status, e
                ))
            }
        };

        if status.is_success() {
            FetchOutcome::Success(text)
        } else if status == StatusCode::UNAUTHORIZED {
            FetchOutcome::Unauthorized(format!("CRM returned {}: {}", status, text))
        } else {
            FetchOutcome::Failed(format!("CRM returned {}: {}", status, text))
        }
    }
}

/// Pulls `_embedded.<collection>` out of a CRM response body.
///
/// An unreadable body or a missing envelope is an invalid response; an
/// envelope without the collection key is "not found".
pub fn extract_embedded<T: DeserializeOwned>(
    body: &str,
    resource: Resource,
) -> Result<Vec<T>, CrmError> {
    let invalid = || CrmError::InvalidResponse { resource };

    let value: Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!("{} response is invalid ({}): {:?}", resource, e, body);
        invalid()
    })?;

    let embedded = match value.get("_embedded") {
        Some(embedded) if embedded.is_object() => embedded,
        _ => {
            tracing::error!("{} response has no _embedded data: {}", resource, value);
            return Err(invalid());
        }
    };

    let collection = match embedded.get(resource.collection_key()) {
        Some(collection) if !collection.is_null() => collection.clone(),
        _ => {
            tracing::error!("{} response embedded data is invalid: {}", resource, value);
            return Err(CrmError::not_found(resource));
        }
    };

    serde_json::from_value(collection).map_err(|e| {
        tracing::error!("Failed to parse embedded {}: {}", resource, e);
        invalid()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decide_accepts_success_on_any_attempt() {
        let ok = FetchOutcome::Success("{}".into());
        assert_eq!(decide(&ok, 0), RetryDecision::Accept);
        assert_eq!(decide(&ok, 1), RetryDecision::Accept);
    }

    #[test]
    fn test_decide_retries_unauthorized_only_once() {
        let unauthorized = FetchOutcome::Unauthorized("401".into());
        assert_eq!(decide(&unauthorized, 0), RetryDecision::RefreshAndRetry);
        assert_eq!(decide(&unauthorized, 1), RetryDecision::GiveUp);
    }

    #[test]
    fn test_decide_never_retries_other_failures() {
        let failed = FetchOutcome::Failed("500".into());
        assert_eq!(decide(&failed, 0), RetryDecision::GiveUp);
    }

    #[test]
    fn test_extract_embedded_leads() {
        let body = json!({"_embedded": {"leads": [{"id": 1}, {"id": 2}]}}).to_string();
        let leads: Vec<Lead> = extract_embedded(&body, Resource::Leads).unwrap();
        assert_eq!(leads.len(), 2);
    }

    #[test]
    fn test_extract_embedded_missing_envelope_is_invalid() {
        let body = json!({"_page": 1}).to_string();
        let err = extract_embedded::<Lead>(&body, Resource::Leads).unwrap_err();
        assert!(matches!(
            err,
            CrmError::InvalidResponse {
                resource: Resource::Leads
            }
        ));
    }

    #[test]
    fn test_extract_embedded_missing_collection_is_not_found() {
        let body = json!({"_embedded": {}}).to_string();
        let err = extract_embedded::<Lead>(&body, Resource::Leads).unwrap_err();
        assert!(matches!(err, CrmError::NoLeadsFound));

        let err = extract_embedded::<Contact>(&body, Resource::Contacts).unwrap_err();
        assert!(matches!(err, CrmError::NoContactsFound));
    }

    #[test]
    fn test_extract_embedded_empty_body_is_invalid() {
        let err = extract_embedded::<Contact>("", Resource::Contacts).unwrap_err();
        assert!(matches!(
            err,
            CrmError::InvalidResponse {
                resource: Resource::Contacts
            }
        ));
    }
}
