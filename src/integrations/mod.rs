//! CRM integration: REST client, OAuth token lifecycle and token persistence hooks.

pub mod crm_client {
    pub use crate::crm_client::*;
}

pub mod token_manager {
    pub use crate::token_manager::*;
}

pub mod token_store {
    pub use crate::token_store::*;
}
