use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::intents::store::{StoreError, format_utc, parse_status, status_to_str};
use crate::types::{DispatchOutcome, PaymentIntentStatus};
use crate::webhooks::verify::VerifiedEvent;

enum EventAction {
    Transition(PaymentIntentStatus),
    Record,
    Ignore,
}

fn action_for(event_type: &str) -> EventAction {
    match event_type {
        "payment_intent.succeeded" => EventAction::Transition(PaymentIntentStatus::Succeeded),
        "payment_intent.payment_failed" => EventAction::Transition(PaymentIntentStatus::Failed),
        "payment_intent.canceled" => EventAction::Transition(PaymentIntentStatus::Canceled),
        "payment_intent.requires_action" => {
            EventAction::Transition(PaymentIntentStatus::RequiresConfirmation)
        }
        "payment_method.attached" => EventAction::Record,
        _ => EventAction::Ignore,
    }
}

/// Statuses an intent may hold for the transition to `target` to apply.
/// Terminal statuses appear in no list: they are final.
fn allowed_from(target: PaymentIntentStatus) -> &'static [PaymentIntentStatus] {
    match target {
        PaymentIntentStatus::Succeeded
        | PaymentIntentStatus::Failed
        | PaymentIntentStatus::Canceled => &[
            PaymentIntentStatus::Created,
            PaymentIntentStatus::RequiresConfirmation,
        ],
        PaymentIntentStatus::RequiresConfirmation => &[PaymentIntentStatus::Created],
        PaymentIntentStatus::Created => &[],
    }
}

/// Applies a verified event to the intent store, exactly once per event id.
///
/// Everything happens in one transaction. The ledger insert comes first: it
/// both deduplicates redeliveries and takes SQLite's write lock, so
/// concurrent deliveries of the same event serialize here and the losers
/// observe `AlreadyApplied`.
pub async fn apply(
    pool: &SqlitePool,
    event: &VerifiedEvent,
    now: DateTime<Utc>,
) -> Result<DispatchOutcome, StoreError> {
    let now_str = format_utc(now);
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO processed_events (event_id, event_type, intent_id, outcome, received_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(event.intent_id.as_deref())
    .bind(outcome_to_str(DispatchOutcome::Unhandled))
    .bind(&now_str)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.commit().await?;
        return Ok(DispatchOutcome::AlreadyApplied);
    }

    let outcome = match action_for(&event.event_type) {
        EventAction::Record => DispatchOutcome::Recorded,
        EventAction::Ignore => {
            tracing::info!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                "unrecognized event type acknowledged without effect"
            );
            DispatchOutcome::Unhandled
        }
        EventAction::Transition(target) => apply_transition(&mut tx, event, target, &now_str).await?,
    };

    sqlx::query("UPDATE processed_events SET outcome = ? WHERE event_id = ?")
        .bind(outcome_to_str(outcome))
        .bind(&event.event_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(outcome)
}

async fn apply_transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    event: &VerifiedEvent,
    target: PaymentIntentStatus,
    now_str: &str,
) -> Result<DispatchOutcome, StoreError> {
    let Some(intent_id) = event.intent_id.as_deref() else {
        tracing::warn!(
            event_id = %event.event_id,
            "payment_intent event carries no intent reference"
        );
        return Ok(DispatchOutcome::Unhandled);
    };

    let current = sqlx::query_scalar::<_, String>("SELECT status FROM payment_intents WHERE id = ?")
        .bind(intent_id)
        .fetch_optional(&mut **tx)
        .await?;

    let Some(current) = current else {
        tracing::warn!(
            event_id = %event.event_id,
            intent_id,
            "event references an intent this instance never issued"
        );
        return Ok(DispatchOutcome::Unhandled);
    };
    let current = parse_status(&current)?;

    if current == target {
        return Ok(DispatchOutcome::AlreadyApplied);
    }
    if !allowed_from(target).contains(&current) {
        tracing::error!(
            event_id = %event.event_id,
            intent_id,
            current = status_to_str(current),
            target = status_to_str(target),
            "event conflicts with stored intent state; manual reconciliation required"
        );
        return Ok(DispatchOutcome::ConflictingState);
    }

    let updated =
        sqlx::query("UPDATE payment_intents SET status = ? WHERE id = ? AND status = ?")
            .bind(status_to_str(target))
            .bind(intent_id)
            .bind(status_to_str(current))
            .execute(&mut **tx)
            .await?;
    if updated.rows_affected() == 0 {
        // Lost a race on the row; report rather than retry.
        return Ok(DispatchOutcome::ConflictingState);
    }

    sqlx::query(
        r#"
        INSERT INTO intent_transitions (id, intent_id, from_status, to_status, event_id, occurred_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(intent_id)
    .bind(status_to_str(current))
    .bind(status_to_str(target))
    .bind(&event.event_id)
    .bind(now_str)
    .execute(&mut **tx)
    .await?;

    tracing::info!(
        event_id = %event.event_id,
        intent_id,
        status = status_to_str(target),
        "intent status updated"
    );
    Ok(DispatchOutcome::Applied)
}

pub fn outcome_to_str(outcome: DispatchOutcome) -> &'static str {
    match outcome {
        DispatchOutcome::Applied => "applied",
        DispatchOutcome::AlreadyApplied => "already_applied",
        DispatchOutcome::ConflictingState => "conflicting_state",
        DispatchOutcome::Recorded => "recorded",
        DispatchOutcome::Unhandled => "unhandled",
    }
}

pub fn parse_outcome(value: &str) -> Result<DispatchOutcome, StoreError> {
    match value {
        "applied" => Ok(DispatchOutcome::Applied),
        "already_applied" => Ok(DispatchOutcome::AlreadyApplied),
        "conflicting_state" => Ok(DispatchOutcome::ConflictingState),
        "recorded" => Ok(DispatchOutcome::Recorded),
        "unhandled" => Ok(DispatchOutcome::Unhandled),
        other => Err(StoreError::Parse(format!("unknown outcome: {other}"))),
    }
}
