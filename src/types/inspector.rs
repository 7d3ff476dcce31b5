use serde::{Deserialize, Serialize};
use specta::Type;

use super::{IntentTransition, PaymentIntent, ProcessedEvent};

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListIntentsResponse {
    pub intents: Vec<PaymentIntent>,
    pub next_before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct GetIntentResponse {
    pub intent: PaymentIntent,
    pub transitions: Vec<IntentTransition>,
    pub events: Vec<ProcessedEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListEventsResponse {
    pub events: Vec<ProcessedEvent>,
    pub next_before: Option<String>,
}
