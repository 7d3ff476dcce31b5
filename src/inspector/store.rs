use sqlx::{QueryBuilder, SqlitePool};

use crate::intents::store::{self, StoreError, status_to_str};
use crate::types::{GetIntentResponse, PaymentIntent, PaymentIntentStatus, ProcessedEvent};
use crate::webhooks::dispatch::parse_outcome;

#[derive(Debug, Clone)]
pub struct IntentCursor {
    pub created_at: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ListIntentsParams {
    pub limit: i64,
    pub before: Option<IntentCursor>,
    pub status: Option<PaymentIntentStatus>,
}

#[derive(Debug, Clone)]
pub struct ListIntentsResult {
    pub intents: Vec<PaymentIntent>,
    pub next_before: Option<IntentCursor>,
}

pub async fn list_intents(
    pool: &SqlitePool,
    params: &ListIntentsParams,
) -> Result<ListIntentsResult, StoreError> {
    let mut query = QueryBuilder::new(
        "SELECT id, amount, currency, status, created_at \
        FROM payment_intents \
        WHERE 1 = 1",
    );

    if let Some(status) = params.status {
        query.push(" AND status = ");
        query.push_bind(status_to_str(status));
    }

    if let Some(cursor) = &params.before {
        query.push(" AND (created_at < ");
        query.push_bind(&cursor.created_at);
        query.push(" OR (created_at = ");
        query.push_bind(&cursor.created_at);
        query.push(" AND id < ");
        query.push_bind(&cursor.id);
        query.push("))");
    }

    query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    query.push_bind(params.limit + 1);

    let rows: Vec<ListIntentRow> = query.build_query_as().fetch_all(pool).await?;

    let has_more = rows.len() > params.limit as usize;
    let take_count = if has_more {
        params.limit as usize
    } else {
        rows.len()
    };

    let mut intents = Vec::with_capacity(take_count);
    let mut last_cursor = None;

    for row in rows.into_iter().take(take_count) {
        last_cursor = Some(IntentCursor {
            created_at: row.created_at.clone(),
            id: row.id.clone(),
        });
        intents.push(PaymentIntent {
            id: row.id,
            amount: row.amount,
            currency: row.currency,
            status: store::parse_status(&row.status)?,
            created_at: row.created_at,
        });
    }

    let next_before = if has_more { last_cursor } else { None };

    Ok(ListIntentsResult {
        intents,
        next_before,
    })
}

pub async fn get_intent_detail(
    pool: &SqlitePool,
    intent_id: &str,
) -> Result<GetIntentResponse, StoreError> {
    let record = store::get_intent(pool, intent_id)
        .await?
        .ok_or_else(|| StoreError::NotFound("intent not found".to_string()))?;

    let transitions = store::get_transitions(pool, intent_id).await?;

    let event_rows = sqlx::query_as::<_, ProcessedEventRow>(
        r#"
        SELECT event_id, event_type, intent_id, outcome, received_at
        FROM processed_events
        WHERE intent_id = ?
        ORDER BY received_at ASC, event_id ASC
        "#,
    )
    .bind(intent_id)
    .fetch_all(pool)
    .await?;

    let events = event_rows
        .into_iter()
        .map(ProcessedEventRow::try_into)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GetIntentResponse {
        intent: record.to_api(),
        transitions,
        events,
    })
}

#[derive(Debug, Clone)]
pub struct EventCursor {
    pub received_at: String,
    pub event_id: String,
}

#[derive(Debug, Clone)]
pub struct ListEventsParams {
    pub limit: i64,
    pub before: Option<EventCursor>,
}

#[derive(Debug, Clone)]
pub struct ListEventsResult {
    pub events: Vec<ProcessedEvent>,
    pub next_before: Option<EventCursor>,
}

pub async fn list_events(
    pool: &SqlitePool,
    params: &ListEventsParams,
) -> Result<ListEventsResult, StoreError> {
    let mut query = QueryBuilder::new(
        "SELECT event_id, event_type, intent_id, outcome, received_at \
        FROM processed_events \
        WHERE 1 = 1",
    );

    if let Some(cursor) = &params.before {
        query.push(" AND (received_at < ");
        query.push_bind(&cursor.received_at);
        query.push(" OR (received_at = ");
        query.push_bind(&cursor.received_at);
        query.push(" AND event_id < ");
        query.push_bind(&cursor.event_id);
        query.push("))");
    }

    query.push(" ORDER BY received_at DESC, event_id DESC LIMIT ");
    query.push_bind(params.limit + 1);

    let rows: Vec<ProcessedEventRow> = query.build_query_as().fetch_all(pool).await?;

    let has_more = rows.len() > params.limit as usize;
    let take_count = if has_more {
        params.limit as usize
    } else {
        rows.len()
    };

    let mut events = Vec::with_capacity(take_count);
    let mut last_cursor = None;

    for row in rows.into_iter().take(take_count) {
        last_cursor = Some(EventCursor {
            received_at: row.received_at.clone(),
            event_id: row.event_id.clone(),
        });
        events.push(row.try_into()?);
    }

    let next_before = if has_more { last_cursor } else { None };

    Ok(ListEventsResult {
        events,
        next_before,
    })
}

#[derive(sqlx::FromRow)]
struct ListIntentRow {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct ProcessedEventRow {
    event_id: String,
    event_type: String,
    intent_id: Option<String>,
    outcome: String,
    received_at: String,
}

impl TryFrom<ProcessedEventRow> for ProcessedEvent {
    type Error = StoreError;

    fn try_from(row: ProcessedEventRow) -> Result<Self, Self::Error> {
        Ok(ProcessedEvent {
            event_id: row.event_id,
            event_type: row.event_type,
            intent_id: row.intent_id,
            outcome: parse_outcome(&row.outcome)?,
            received_at: row.received_at,
        })
    }
}
