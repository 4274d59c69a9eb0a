// smartmarks services
// Stateless or self-contained helpers: url policy, crypto, session vault, settings.

pub mod crypto_service;
pub mod session_vault;
pub mod settings_engine;
pub mod url_policy;
