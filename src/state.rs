use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    intents::{IdempotencyLocks, IntentConfig},
    processor::PaymentProcessor,
    webhooks::WebhookConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub processor: Arc<dyn PaymentProcessor>,
    pub intents: IntentConfig,
    pub key_locks: IdempotencyLocks,
    pub webhook: WebhookConfig,
    pub inspector_token: Option<String>,
}
