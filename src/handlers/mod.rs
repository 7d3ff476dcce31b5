pub mod inspector;
pub mod intents;
pub mod webhooks;
