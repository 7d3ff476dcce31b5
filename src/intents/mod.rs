mod config;
mod issuer;
pub mod store;

pub use config::IntentConfig;
pub use issuer::{
    CreatedIntent, IdempotencyLocks, IssueError, SUPPORTED_CURRENCIES, create_intent,
};
pub use store::{IntentRecord, StoreError};
