#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use amocrm_leads_proxy::config::Config;
use amocrm_leads_proxy::crm_client::CrmClient;
use amocrm_leads_proxy::token_store::MemoryTokenStore;
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const INITIAL_REFRESH_TOKEN: &str = "refresh-1";

/// Config pointing every CRM call at `base_url`.
pub fn create_test_config(base_url: &str, access_token: &str) -> Config {
    Config {
        port: 0,
        amocrm_domain: "example.amocrm.ru".to_string(),
        crm_base_url: Url::parse(base_url).unwrap(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://example.com/oauth/callback".to_string(),
        access_token: access_token.to_string(),
        refresh_token: INITIAL_REFRESH_TOKEN.to_string(),
        http_timeout: Duration::from_secs(5),
        mirror_tokens_to_env: false,
    }
}

pub fn create_client(server: &MockServer, access_token: &str) -> (CrmClient, Arc<MemoryTokenStore>) {
    create_client_at(&server.uri(), access_token)
}

/// Client aimed at an arbitrary base URL, e.g. a port nothing listens on.
pub fn create_client_at(base_url: &str, access_token: &str) -> (CrmClient, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    let client = CrmClient::new(&create_test_config(base_url, access_token), store.clone())
        .unwrap();
    (client, store)
}

/// Nothing listens here, so every request fails to connect.
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:1";

/// Token endpoint that swaps `refresh-1` for the given pair, expected `times` times.
pub async fn mount_token_refresh(server: &MockServer, access: &str, refresh: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .and(body_partial_json(json!({
            "client_id": "client-id",
            "client_secret": "client-secret",
            "grant_type": "refresh_token",
            "refresh_token": INITIAL_REFRESH_TOKEN,
            "redirect_uri": "https://example.com/oauth/callback"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 86400,
            "access_token": access,
            "refresh_token": refresh
        })))
        .expect(times)
        .mount(server)
        .await;
}

pub fn leads_body(leads: Value) -> Value {
    json!({"_page": 1, "_links": {}, "_embedded": {"leads": leads}})
}

pub fn contacts_body(contacts: Value) -> Value {
    json!({"_page": 1, "_links": {}, "_embedded": {"contacts": contacts}})
}
