pub mod store;

pub use store::{
    EventCursor, IntentCursor, ListEventsParams, ListEventsResult, ListIntentsParams,
    ListIntentsResult, get_intent_detail, list_events, list_intents,
};
