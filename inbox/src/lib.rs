//! Inbox - optimistic updates of a partitioned inbox cache
//!
//! The inbox is cached as several disjoint partitions, one per query the
//! client has run: a recency window, an importance classification and the
//! cleared flag. Marking messages read, unread or cleared must show up at
//! once, before the server has answered, and must vanish again if the server
//! refuses it.
//!
//! ## Module Organization
//!
//! - `message`: the cached message record
//! - `status`: requested statuses and the flags they map to
//! - `partition`: partition keys and cross-partition destinations
//! - `cache`: the injected partition store, undo handles, in-memory store
//! - `api`: the server mutation, over HTTP by default
//! - `updater`: speculative patch, dispatch, commit or rollback
//! - `in_flight`: serialization of updates touching the same messages
//! - `notify`: user-facing notices for rolled-back updates
//! - `config`: TOML configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! let cache = Arc::new(MemoryCache::from_snapshot(snapshot));
//! let api = Arc::new(HttpInboxApi::from_config(&config)?);
//! let updater = InboxUpdater::new(cache.clone(), api, Arc::new(TracingNotifier));
//!
//! match updater.update(&request).await? {
//!     Reconciled::Committed => {}
//!     Reconciled::RolledBack { notice } => eprintln!("{}", notice.message),
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod in_flight;
pub mod message;
pub mod notify;
pub mod partition;
pub mod status;
pub mod updater;

#[cfg(feature = "http")]
pub use api::HttpInboxApi;
pub use api::{InboxApi, InboxMutation};
pub use cache::{
    CacheSnapshot, MemoryCache, PartitionEdit, PartitionSnapshot, PartitionStore, Patch, PatchSet,
};
pub use config::InboxConfig;
pub use error::{InboxError, Result};
pub use in_flight::InFlight;
pub use message::Message;
pub use notify::{ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use partition::PartitionKey;
pub use status::{InboxStatus, StatusFields};
pub use updater::{InboxUpdater, Reconciled, UpdateRequest};
