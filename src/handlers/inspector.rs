use axum::{
    Json,
    extract::{Path, State},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    extractors::ValidQuery,
    handlers::intents::map_store_error,
    inspector::{
        EventCursor, IntentCursor, ListEventsParams, ListIntentsParams, get_intent_detail,
        list_events, list_intents,
    },
    intents::store::parse_status,
    state::AppState,
    types::{GetIntentResponse, ListEventsResponse, ListIntentsResponse},
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListIntentsQuery {
    limit: Option<i64>,
    before: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    limit: Option<i64>,
    before: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    ts: String,
    id: String,
}

pub async fn list_intents_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListIntentsQuery>,
) -> Result<Json<ListIntentsResponse>, ApiError> {
    let limit = clamp_limit(query.limit);

    let before = query
        .before
        .as_deref()
        .map(decode_cursor)
        .transpose()?
        .map(|payload| IntentCursor {
            created_at: payload.ts,
            id: payload.id,
        });

    let status = query
        .status
        .as_deref()
        .map(|value| parse_status(value).map_err(|_| ApiError::validation("unknown status")))
        .transpose()?;

    let result = list_intents(
        &state.pool,
        &ListIntentsParams {
            limit,
            before,
            status,
        },
    )
    .await
    .map_err(map_store_error)?;

    Ok(Json(ListIntentsResponse {
        intents: result.intents,
        next_before: result.next_before.map(|cursor| {
            encode_cursor(&CursorPayload {
                ts: cursor.created_at,
                id: cursor.id,
            })
        }),
    }))
}

pub async fn get_intent_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GetIntentResponse>, ApiError> {
    let detail = get_intent_detail(&state.pool, &id)
        .await
        .map_err(map_store_error)?;

    Ok(Json(detail))
}

pub async fn list_events_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListEventsQuery>,
) -> Result<Json<ListEventsResponse>, ApiError> {
    let limit = clamp_limit(query.limit);

    let before = query
        .before
        .as_deref()
        .map(decode_cursor)
        .transpose()?
        .map(|payload| EventCursor {
            received_at: payload.ts,
            event_id: payload.id,
        });

    let result = list_events(&state.pool, &ListEventsParams { limit, before })
        .await
        .map_err(map_store_error)?;

    Ok(Json(ListEventsResponse {
        events: result.events,
        next_before: result.next_before.map(|cursor| {
            encode_cursor(&CursorPayload {
                ts: cursor.received_at,
                id: cursor.event_id,
            })
        }),
    }))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn encode_cursor(payload: &CursorPayload) -> String {
    let json = serde_json::to_string(payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_cursor(value: &str) -> Result<CursorPayload, ApiError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| ApiError::validation("invalid cursor"))?;
    serde_json::from_slice(&bytes).map_err(|_| ApiError::validation("invalid cursor"))
}
