use std::sync::Arc;

use amocrm_leads_proxy::api;
use amocrm_leads_proxy::config::Config;
use amocrm_leads_proxy::crm_client::CrmClient;
use amocrm_leads_proxy::handlers::AppState;
use amocrm_leads_proxy::token_store::{EnvTokenStore, MemoryTokenStore, TokenStore};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds the CRM client (with its
/// token manager) and serves the HTTP routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amocrm_leads_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let token_store: Arc<dyn TokenStore> = if config.mirror_tokens_to_env {
        tracing::warn!("Rotated tokens will be mirrored into the process environment");
        Arc::new(EnvTokenStore::default())
    } else {
        Arc::new(MemoryTokenStore::new())
    };
    let crm_client = CrmClient::new(&config, token_store)?;
    tracing::info!("CRM client initialized: {}", config.crm_base_url);

    let app_state = Arc::new(AppState { crm_client });

    let app = api::router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
