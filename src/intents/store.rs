use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::types::{IntentTransition, PaymentIntent, PaymentIntentStatus};

#[derive(Debug)]
pub enum StoreError {
    Db(sqlx::Error),
    /// A UNIQUE constraint fired on insert. The caller decides whether that
    /// means "lost an idempotency race" or corruption.
    Duplicate,
    NotFound(String),
    Parse(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

/// Full stored form of an intent, client secret included. Only the issuer
/// ever hands the secret out; every read surface goes through `to_api`.
#[derive(Debug, Clone)]
pub struct IntentRecord {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub client_secret: String,
    pub idempotency_key: Option<String>,
    pub created_at: String,
}

impl IntentRecord {
    pub fn to_api(&self) -> PaymentIntent {
        PaymentIntent {
            id: self.id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            status: self.status,
            created_at: self.created_at.clone(),
        }
    }
}

/// Inserts the intent row and its creation transition in one transaction.
pub async fn insert_intent(pool: &SqlitePool, record: &IntentRecord) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO payment_intents (
            id,
            amount,
            currency,
            status,
            client_secret,
            idempotency_key,
            created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(record.amount)
    .bind(&record.currency)
    .bind(status_to_str(record.status))
    .bind(&record.client_secret)
    .bind(record.idempotency_key.as_deref())
    .bind(&record.created_at)
    .execute(&mut *tx)
    .await;

    if let Err(err) = result {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            return Err(StoreError::Duplicate);
        }
        return Err(StoreError::Db(err));
    }

    sqlx::query(
        r#"
        INSERT INTO intent_transitions (id, intent_id, from_status, to_status, event_id, occurred_at)
        VALUES (?, ?, NULL, ?, NULL, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&record.id)
    .bind(status_to_str(record.status))
    .bind(&record.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn find_by_idempotency_key(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<IntentRecord>, StoreError> {
    let row = sqlx::query_as::<_, IntentRow>(
        r#"
        SELECT id, amount, currency, status, client_secret, idempotency_key, created_at
        FROM payment_intents
        WHERE idempotency_key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    row.map(IntentRow::try_into).transpose()
}

pub async fn get_intent(pool: &SqlitePool, id: &str) -> Result<Option<IntentRecord>, StoreError> {
    let row = sqlx::query_as::<_, IntentRow>(
        r#"
        SELECT id, amount, currency, status, client_secret, idempotency_key, created_at
        FROM payment_intents
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(IntentRow::try_into).transpose()
}

pub async fn get_transitions(
    pool: &SqlitePool,
    intent_id: &str,
) -> Result<Vec<IntentTransition>, StoreError> {
    let rows = sqlx::query_as::<_, TransitionRow>(
        r#"
        SELECT id, intent_id, from_status, to_status, event_id, occurred_at
        FROM intent_transitions
        WHERE intent_id = ?
        ORDER BY occurred_at ASC, rowid ASC
        "#,
    )
    .bind(intent_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TransitionRow::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct IntentRow {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    client_secret: String,
    idempotency_key: Option<String>,
    created_at: String,
}

impl TryFrom<IntentRow> for IntentRecord {
    type Error = StoreError;

    fn try_from(row: IntentRow) -> Result<Self, Self::Error> {
        Ok(IntentRecord {
            id: row.id,
            amount: row.amount,
            currency: row.currency,
            status: parse_status(&row.status)?,
            client_secret: row.client_secret,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    id: String,
    intent_id: String,
    from_status: Option<String>,
    to_status: String,
    event_id: Option<String>,
    occurred_at: String,
}

impl TryFrom<TransitionRow> for IntentTransition {
    type Error = StoreError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        Ok(IntentTransition {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| StoreError::Parse(format!("invalid transition id: {err}")))?,
            intent_id: row.intent_id,
            from_status: row.from_status.as_deref().map(parse_status).transpose()?,
            to_status: parse_status(&row.to_status)?,
            event_id: row.event_id,
            occurred_at: row.occurred_at,
        })
    }
}

pub fn parse_status(status: &str) -> Result<PaymentIntentStatus, StoreError> {
    match status {
        "created" => Ok(PaymentIntentStatus::Created),
        "requires_confirmation" => Ok(PaymentIntentStatus::RequiresConfirmation),
        "succeeded" => Ok(PaymentIntentStatus::Succeeded),
        "failed" => Ok(PaymentIntentStatus::Failed),
        "canceled" => Ok(PaymentIntentStatus::Canceled),
        other => Err(StoreError::Parse(format!("unknown status: {other}"))),
    }
}

pub fn status_to_str(status: PaymentIntentStatus) -> &'static str {
    match status {
        PaymentIntentStatus::Created => "created",
        PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
        PaymentIntentStatus::Succeeded => "succeeded",
        PaymentIntentStatus::Failed => "failed",
        PaymentIntentStatus::Canceled => "canceled",
    }
}

pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
