// Thin namespace wrapper for API-layer components
use axum::{routing::get, Router};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_docs::ApiDoc;
use crate::handlers::AppState;

pub mod handlers {
    pub use crate::handlers::*;
}

pub mod api_docs {
    pub use crate::api_docs::*;
}

/// Routes served by the proxy, without transport middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::handlers::health))
        .route("/api/leads", get(crate::handlers::get_leads))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
