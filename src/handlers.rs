use crate::crm_client::CrmClient;
use crate::errors::AppError;
use crate::models::{ErrorBody, LeadsQuery, LeadsResponse, MessageBody};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Minimum number of characters a non-empty search query must have.
pub const MIN_QUERY_LEN: usize = 3;

pub const SHORT_QUERY_MESSAGE: &str = "Query parameter must be at least 3 characters long";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// CRM client (owns the OAuth token manager).
    pub crm_client: CrmClient,
}

/// What to do with the incoming `query` parameter.
#[derive(Debug, PartialEq, Eq)]
pub enum QueryCheck<'a> {
    /// No filter: fetch the unfiltered first page.
    Unfiltered,
    Search(&'a str),
    TooShort,
}

/// Classifies a raw `query` value. An empty string counts as absent.
pub fn check_query(query: Option<&str>) -> QueryCheck<'_> {
    match query {
        None | Some("") => QueryCheck::Unfiltered,
        Some(q) if q.chars().count() < MIN_QUERY_LEN => QueryCheck::TooShort,
        Some(q) => QueryCheck::Search(q),
    }
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "amocrm-leads-proxy",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/leads
///
/// Searches CRM leads and returns them with their contacts inlined.
/// Queries shorter than three characters are answered with a message and
/// never reach the CRM.
#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "leads",
    params(LeadsQuery),
    responses(
        (status = 200, description = "Leads with contacts inlined, or a short-query message", body = [crate::api_docs::EnrichedLead]),
        (status = 400, description = "Token refresh or CRM request failed", body = ErrorBody),
        (status = 404, description = "CRM response had no leads/contacts collection", body = ErrorBody),
        (status = 500, description = "CRM response had no embedded envelope", body = ErrorBody)
    )
)]
pub async fn get_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadsQuery>,
) -> Result<Json<LeadsResponse>, AppError> {
    tracing::info!("GET /api/leads - query: {:?}", params.query);

    let query = match check_query(params.query.as_deref()) {
        QueryCheck::TooShort => {
            return Ok(Json(LeadsResponse::Message(MessageBody {
                message: SHORT_QUERY_MESSAGE.to_string(),
            })));
        }
        QueryCheck::Unfiltered => None,
        QueryCheck::Search(q) => Some(q),
    };

    let leads = state.crm_client.get_leads(query).await?;
    tracing::info!("Returning {} enriched lead(s)", leads.len());

    Ok(Json(LeadsResponse::Leads(leads)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_query() {
        assert_eq!(check_query(None), QueryCheck::Unfiltered);
        assert_eq!(check_query(Some("")), QueryCheck::Unfiltered);
        assert_eq!(check_query(Some("a")), QueryCheck::TooShort);
        assert_eq!(check_query(Some("ab")), QueryCheck::TooShort);
        assert_eq!(check_query(Some("abc")), QueryCheck::Search("abc"));
    }

    #[test]
    fn test_check_query_counts_characters_not_bytes() {
        // Two Cyrillic letters are four bytes.
        assert_eq!(check_query(Some("Ив")), QueryCheck::TooShort);
        assert_eq!(check_query(Some("Иван")), QueryCheck::Search("Иван"));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, Json(body)) = health().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
