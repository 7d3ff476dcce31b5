use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::intents::store::{self, IntentRecord, StoreError, format_utc};
use crate::intents::IntentConfig;
use crate::processor::{CreateIntentCall, PaymentProcessor, ProcessorError};
use crate::types::{CreateIntentRequest, PaymentIntentStatus};

/// ISO 4217 codes the processor account is configured to charge in.
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "aud", "brl", "cad", "chf", "cny", "czk", "dkk", "eur", "gbp", "hkd", "huf", "inr", "jpy",
    "mxn", "nok", "nzd", "pln", "sek", "sgd", "usd",
];

#[derive(Debug)]
pub enum IssueError {
    InvalidAmount(String),
    InvalidCurrency(String),
    Processor(ProcessorError),
    Store(StoreError),
}

#[derive(Clone)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

/// Per-key mutual exclusion for intent creation within this process.
/// Serializing concurrent calls that share an idempotency key keeps the
/// remote-call count at one per key; the UNIQUE constraint on
/// `idempotency_key` backstops races across processes.
#[derive(Clone, Default)]
pub struct IdempotencyLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IdempotencyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

pub async fn create_intent(
    pool: &SqlitePool,
    processor: &dyn PaymentProcessor,
    config: &IntentConfig,
    locks: &IdempotencyLocks,
    req: &CreateIntentRequest,
    idempotency_key: Option<&str>,
) -> Result<CreatedIntent, IssueError> {
    if req.amount <= 0 {
        return Err(IssueError::InvalidAmount(format!(
            "amount must be a positive integer in the smallest currency unit, got {}",
            req.amount
        )));
    }

    let currency = req.currency.to_ascii_lowercase();
    if !SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
        return Err(IssueError::InvalidCurrency(format!(
            "unrecognized currency code: {}",
            req.currency
        )));
    }

    let _guard = match idempotency_key {
        Some(key) => Some(locks.acquire(key).await),
        None => None,
    };

    if let Some(key) = idempotency_key
        && let Some(existing) = store::find_by_idempotency_key(pool, key)
            .await
            .map_err(IssueError::Store)?
    {
        return Ok(CreatedIntent {
            id: existing.id,
            client_secret: existing.client_secret,
        });
    }

    let call = CreateIntentCall {
        amount: req.amount,
        currency: currency.clone(),
        idempotency_key: idempotency_key.map(str::to_string),
    };
    let remote = processor
        .create_intent(&call)
        .await
        .map_err(IssueError::Processor)?;

    let record = IntentRecord {
        id: remote.id.clone(),
        amount: req.amount,
        currency,
        status: PaymentIntentStatus::Created,
        client_secret: remote.client_secret.clone(),
        idempotency_key: idempotency_key.map(str::to_string),
        created_at: format_utc(Utc::now()),
    };

    match store::insert_intent(pool, &record).await {
        Ok(()) => {}
        Err(StoreError::Duplicate) => {
            if let Some(key) = idempotency_key
                && let Some(existing) = store::find_by_idempotency_key(pool, key)
                    .await
                    .map_err(IssueError::Store)?
            {
                tracing::warn!(
                    intent_id = %remote.id,
                    "lost idempotency-key insert race; returning first-written intent"
                );
                return Ok(CreatedIntent {
                    id: existing.id,
                    client_secret: existing.client_secret,
                });
            }
            tracing::error!(
                intent_id = %remote.id,
                "duplicate intent id on insert; reconciliation required"
            );
        }
        Err(err) if config.strict_persistence => return Err(IssueError::Store(err)),
        Err(err) => {
            // Remote state is authoritative: the intent exists at the
            // processor whether or not the local write landed.
            tracing::error!(
                intent_id = %remote.id,
                error = ?err,
                "intent created remotely but not persisted; reconciliation required"
            );
        }
    }

    Ok(CreatedIntent {
        id: remote.id,
        client_secret: remote.client_secret,
    })
}
