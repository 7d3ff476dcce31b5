use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;

use crate::{
    error::ApiError,
    handlers::intents::map_store_error,
    state::AppState,
    types::DispatchOutcome,
    webhooks::{SIGNATURE_HEADER, VerifyError, apply, verify},
};

/// Receives processor webhooks. The body arrives as the exact bytes sent;
/// nothing is parsed before the signature verifies. Any verified event is
/// acknowledged with 200 regardless of dispatch outcome, so the processor
/// stops redelivering.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = match verify(
        &body,
        signature,
        state.webhook.signing_secret.as_bytes(),
        state.webhook.tolerance_secs,
        Utc::now(),
    ) {
        Ok(event) => event,
        Err(VerifyError::StaleEvent) => {
            tracing::warn!("webhook rejected: timestamp outside tolerance window");
            return Err(ApiError::StaleEvent);
        }
        Err(VerifyError::Payload(message)) => {
            tracing::warn!(%message, "webhook signed correctly but payload is not an event");
            return Err(ApiError::validation("unparseable event payload"));
        }
        Err(_) => {
            // Mismatch and malformed header take the same path: a possible
            // forgery attempt, logged, no state touched.
            tracing::warn!("webhook rejected: signature verification failed");
            return Err(ApiError::SignatureMismatch);
        }
    };

    let outcome = apply(&state.pool, &event, Utc::now())
        .await
        .map_err(map_store_error)?;

    if matches!(
        outcome,
        DispatchOutcome::AlreadyApplied | DispatchOutcome::Recorded
    ) {
        tracing::debug!(
            event_id = %event.event_id,
            outcome = ?outcome,
            "webhook event processed without state change"
        );
    }

    Ok(StatusCode::OK)
}
