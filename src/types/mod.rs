pub mod api_error;
pub mod event;
pub mod inspector;
pub mod intent;

#[allow(unused_imports)]
pub use api_error::{ApiErrorCode, ApiErrorResponse};
#[allow(unused_imports)]
pub use event::{DispatchOutcome, ProcessedEvent};
#[allow(unused_imports)]
pub use inspector::{GetIntentResponse, ListEventsResponse, ListIntentsResponse};
#[allow(unused_imports)]
pub use intent::{
    CreateIntentRequest, CreateIntentResponse, IntentTransition, PaymentIntent,
    PaymentIntentStatus,
};
