mod config;
pub mod dispatch;
pub mod verify;

pub use config::{DEFAULT_TOLERANCE_SECS, WebhookConfig};
pub use dispatch::apply;
pub use verify::{SIGNATURE_HEADER, VerifiedEvent, VerifyError, verify};
