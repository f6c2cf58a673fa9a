//! OpenAPI document served at `/api-docs/openapi.json` and rendered at `/docs`.
//!
//! `Contact` and `EnrichedLead` here are documentation shapes only; the real
//! models in `crate::models` carry arbitrary CRM fields.

use utoipa::{OpenApi, ToSchema};

use crate::models::{ErrorBody, MessageBody};

/// Documentation shape of a contact. The proxy passes every CRM field through.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct Contact {
    id: i64,
    name: Option<String>,
}

/// Documentation shape of an enriched lead; other CRM lead fields are passed through.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct EnrichedLead {
    id: i64,
    name: Option<String>,
    /// Resolved contacts; an entry is `null` where a referenced contact was not returned.
    contacts: Vec<Contact>,
}

#[derive(OpenApi)]
#[openapi(
    paths(crate::handlers::health, crate::handlers::get_leads),
    components(schemas(Contact, EnrichedLead, MessageBody, ErrorBody)),
    tags(
        (name = "leads", description = "CRM leads with inlined contacts"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;
