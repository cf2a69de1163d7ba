// src/feed/mod.rs
pub mod providers;
pub mod source;
pub mod types;

pub use source::{FeedSource, FetchError, TimeoutSource};
pub use types::{EventKind, EventRecord, FeedSnapshot};
