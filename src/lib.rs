//! amoCRM Leads Proxy Library
//!
//! Exposes a simplified leads search on top of the amoCRM REST API: leads are
//! fetched, their referenced contacts are loaded in one batch and inlined, and
//! OAuth2 tokens are refreshed transparently.
//!
//! # Modules
//!
//! - `api`: Router and API-layer re-exports.
//! - `core`: Domain logic, models and errors.
//! - `integrations`: CRM client and token handling.
//! - `api_docs`: OpenAPI document.
//! - `config`: Configuration management.
//! - `crm_client`: Leads/contacts client with 401 retry.
//! - `enrichment`: Lead/contact join.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `token_manager`: OAuth token refresh.
//! - `token_store`: Persistence hooks for rotated tokens.

pub mod api;
pub mod core;
pub mod integrations;

pub mod api_docs;
pub mod config;
pub mod crm_client;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod token_manager;
pub mod token_store;
