pub mod auth;
pub mod confirm;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod inspector;
pub mod intents;
pub mod processor;
pub mod state;
pub mod types;
pub mod webhooks;
