pub mod actions;
pub mod debounce;
pub mod errors;
pub mod events;
pub mod feed;
pub mod models;

// Re-export errors
pub use errors::{EmojiError, EmojiResult, FieldError};

// Re-export events
pub use events::{FeedEvent, FEED_TOPIC};

// Re-export models (domain models)
pub use models::{NewRecord, Record, SearchResult, Visual};

pub use debounce::{search_debouncer, SearchDebouncer, SearchOutcome};
pub use feed::{
    FeedCollection, FeedSource, FeedState, FeedStatus, FeedUpdate, HubFeedSource, LiveFeed,
};
