use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

use crate::token_manager::token_fingerprint;

// ============ OAuth Models ============

/// The OAuth token pair the proxy authenticates with.
///
/// An empty `access_token` means "no token held"; the next request refreshes
/// before calling the CRM.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    /// When the pair was last rotated by this process.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            refreshed_at: None,
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &token_fingerprint(&self.access_token))
            .field("refresh_token", &token_fingerprint(&self.refresh_token))
            .field("refreshed_at", &self.refreshed_at)
            .finish()
    }
}

/// Body sent to `POST /oauth2/access_token`.
#[derive(Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub grant_type: &'a str,
    pub refresh_token: &'a str,
    pub redirect_uri: &'a str,
}

/// Successful token endpoint response. Only the pair is used; the rest is kept for logs.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

// ============ CRM Models ============

/// A lead as returned by `GET /api/v4/leads`.
///
/// Only the identifier and the embedded contact references are interpreted;
/// every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    #[serde(rename = "_embedded", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<LeadEmbedded>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Lead {
    /// Contact references embedded in the lead, empty when the lead has none.
    pub fn contact_refs(&self) -> &[ContactRef] {
        self.embedded
            .as_ref()
            .and_then(|e| e.contacts.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEmbedded {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<ContactRef>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Reference to a contact by id (`is_main`, `_links`, ... kept in `fields`).
///
/// The id is kept as sent so a malformed reference cannot fail the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContactRef {
    /// The referenced contact id, if it is an integer.
    pub fn contact_id(&self) -> Option<i64> {
        self.id.as_i64()
    }
}

/// A contact as returned by `GET /api/v4/contacts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A lead with its contact references resolved.
///
/// `None` entries are references the batch lookup did not return; they
/// serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLead {
    #[serde(flatten)]
    pub lead: Lead,
    pub contacts: Vec<Option<Contact>>,
}

// ============ API Models ============

/// Query parameters for `GET /api/leads`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeadsQuery {
    /// Free-text CRM search; at least 3 characters when present.
    pub query: Option<String>,
}

/// `{"message": ...}` returned for informational responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

/// Error body: `{"statusCode": 404, "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

/// Successful body of `GET /api/leads`: either the enriched leads or a message.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LeadsResponse {
    Leads(Vec<EnrichedLead>),
    Message(MessageBody),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lead_keeps_unknown_fields() {
        let lead: Lead = serde_json::from_value(json!({
            "id": 7,
            "name": "Deal",
            "price": 1500,
            "_embedded": {"tags": [], "contacts": [{"id": 10, "is_main": true}]}
        }))
        .unwrap();

        assert_eq!(lead.id, 7);
        assert_eq!(lead.fields["price"], json!(1500));
        assert_eq!(lead.contact_refs().len(), 1);
        assert_eq!(lead.contact_refs()[0].contact_id(), Some(10));

        let back = serde_json::to_value(&lead).unwrap();
        assert_eq!(back["name"], json!("Deal"));
        assert_eq!(back["_embedded"]["tags"], json!([]));
        assert_eq!(back["_embedded"]["contacts"][0]["is_main"], json!(true));
    }

    #[test]
    fn test_malformed_contact_ref_does_not_fail_lead() {
        let lead: Lead = serde_json::from_value(json!({
            "id": 8,
            "_embedded": {"contacts": [{"id": 10}, {"is_main": true}, {"id": "x"}]}
        }))
        .unwrap();

        let ids: Vec<Option<i64>> = lead.contact_refs().iter().map(ContactRef::contact_id).collect();
        assert_eq!(ids, vec![Some(10), None, None]);

        let back = serde_json::to_value(&lead).unwrap();
        assert_eq!(back["_embedded"]["contacts"][1], json!({"is_main": true}));
        assert_eq!(back["_embedded"]["contacts"][2], json!({"id": "x"}));
    }

    #[test]
    fn test_lead_without_embedded_has_no_refs() {
        let lead: Lead = serde_json::from_value(json!({"id": 2})).unwrap();
        assert!(lead.contact_refs().is_empty());

        let lead: Lead = serde_json::from_value(json!({"id": 3, "_embedded": {}})).unwrap();
        assert!(lead.contact_refs().is_empty());
    }

    #[test]
    fn test_unmatched_contact_serializes_as_null() {
        let enriched = EnrichedLead {
            lead: serde_json::from_value(json!({"id": 1})).unwrap(),
            contacts: vec![None],
        };
        assert_eq!(
            serde_json::to_value(&enriched).unwrap(),
            json!({"id": 1, "contacts": [null]})
        );
    }

    #[test]
    fn test_error_body_uses_status_code_key() {
        let body = ErrorBody {
            status_code: 404,
            message: "No leads found in the response".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"statusCode": 404, "message": "No leads found in the response"})
        );
    }

    #[test]
    fn test_credentials_debug_hides_tokens() {
        let creds = Credentials::new("access-abc", "refresh-xyz");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("access-abc"));
        assert!(!rendered.contains("refresh-xyz"));
    }
}
