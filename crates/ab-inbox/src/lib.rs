//! Inbox persistence and notification fan-out.
//!
//! [`inbox::InboxStore`] keeps the deduplicated message collection in a
//! [`storage::KeyValueStore`]; [`broker::NotificationBroker`] announces new
//! messages and unread counts to in-process listeners.

pub mod broker;
pub mod inbox;
pub mod storage;

pub use broker::{InboxEvent, NotificationBroker, Subscription};
pub use inbox::{AddOutcome, InboxEntry, InboxKeys, InboxStore, MessageFilter};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
