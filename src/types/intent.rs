use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// Client-facing view of a payment intent. The client secret is deliberately
/// absent: it is returned once, at creation, and never again.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Created,
    RequiresConfirmation,
    Succeeded,
    Failed,
    Canceled,
}

/// One row of the append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct IntentTransition {
    pub id: Uuid,
    pub intent_id: String,
    pub from_status: Option<PaymentIntentStatus>,
    pub to_status: PaymentIntentStatus,
    pub event_id: Option<String>,
    pub occurred_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct CreateIntentRequest {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub id: String,
    pub client_secret: String,
}
