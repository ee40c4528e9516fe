//! # Store Adapters
//!
//! Implementations of the [`QueueStore`](crate::store::QueueStore) and
//! [`ChangeFeed`](crate::store::ChangeFeed) interfaces.

pub mod json_file;
pub mod memory;
mod table;

pub use json_file::JsonFileQueueStore;
pub use memory::{InMemoryQueueStore, DEFAULT_FEED_CAPACITY};
