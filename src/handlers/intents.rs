use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};

use crate::{
    error::ApiError,
    extractors::ValidJson,
    intents::{self, IssueError, StoreError, store},
    processor::ProcessorError,
    state::AppState,
    types::{CreateIntentRequest, CreateIntentResponse, PaymentIntent},
};

/// Header the client uses to make retried creations safe.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub async fn create_intent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>, ApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty());

    let created = intents::create_intent(
        &state.pool,
        state.processor.as_ref(),
        &state.intents,
        &state.key_locks,
        &req,
        idempotency_key,
    )
    .await
    .map_err(map_issue_error)?;

    Ok(Json(CreateIntentResponse {
        id: created.id,
        client_secret: created.client_secret,
    }))
}

/// Status polling for the UI after confirmation. Returns the reconciled view
/// only; the client secret is not part of this surface.
pub async fn intent_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let record = store::get_intent(&state.pool, &id)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| ApiError::NotFound("intent not found".to_string()))?;

    Ok(Json(record.to_api()))
}

fn map_issue_error(err: IssueError) -> ApiError {
    match err {
        IssueError::InvalidAmount(message) => ApiError::InvalidAmount(message),
        IssueError::InvalidCurrency(message) => ApiError::InvalidCurrency(message),
        IssueError::Processor(ProcessorError::Unavailable(message)) => {
            ApiError::ProcessorUnavailable(message)
        }
        IssueError::Processor(err) => ApiError::Internal(err.to_string()),
        IssueError::Store(err) => map_store_error(err),
    }
}

pub(crate) fn map_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Db(db) => ApiError::Db(db),
        StoreError::NotFound(message) => ApiError::NotFound(message),
        StoreError::Parse(message) => ApiError::Internal(message),
        StoreError::Duplicate => ApiError::Internal("unexpected duplicate record".to_string()),
    }
}
