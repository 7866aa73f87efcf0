// Cache entry state.
// Each entry tracks the lifecycle of one query's cached result along
// with its subscribers and invalidation tags.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;

use crate::cache::key::CacheKey;
use crate::error::{ErrorInfo, FetchOutcome};
use crate::registry::Tag;

/// Lifecycle status of a cache entry.
///
/// `Idle -> Loading -> {Success, Error}`; settled entries move to
/// `Stale` on invalidation and back through `Loading` on refetch.
/// Entries cycle until evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
    /// Data is still visible but known outdated; a refetch is either
    /// in flight or deferred until the next subscription.
    Stale,
}

/// Cached result for one endpoint + arguments pair.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Endpoint that produced this entry, kept for refetch.
    pub endpoint: String,
    /// Arguments that produced this entry, kept for refetch.
    pub args: Value,
    pub tags: Vec<Tag>,
    pub status: Status,
    pub data: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub subscriber_count: usize,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Issue instant of the fetch that produced the current data.
    /// Outcomes from fetches issued before this are discarded.
    pub(crate) data_issued_at: Option<Instant>,
    /// When the subscriber count last reached zero.
    pub(crate) idle_since: Option<Instant>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, endpoint: &str, args: Value, tags: Vec<Tag>) -> Self {
        Self {
            key,
            endpoint: endpoint.to_string(),
            args,
            tags,
            status: Status::Idle,
            data: None,
            error: None,
            subscriber_count: 0,
            last_fetched_at: None,
            data_issued_at: None,
            idle_since: Some(Instant::now()),
        }
    }

    /// Whether a mount of this entry should trigger a fetch.
    pub fn needs_fetch(&self) -> bool {
        matches!(self.status, Status::Idle | Status::Stale)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
        }
    }
}

/// Point-in-time view of an entry, published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub status: Status,
    pub data: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl EntrySnapshot {
    pub fn is_settled(&self) -> bool {
        matches!(self.status, Status::Success | Status::Error)
    }
}

/// Partial update applied to an entry through the store.
///
/// Subscriber bookkeeping is never part of a patch; only the store's
/// subscribe/release paths touch the count.
#[derive(Debug, Default)]
pub struct EntryPatch {
    pub status: Option<Status>,
    pub data: Option<Value>,
    pub clear_data: bool,
    pub error: Option<ErrorInfo>,
    pub clear_error: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub issued_at: Option<Instant>,
}

impl EntryPatch {
    /// A fetch for this entry has been issued. Existing data stays
    /// visible while the request is outstanding.
    pub fn loading() -> Self {
        Self {
            status: Some(Status::Loading),
            ..Self::default()
        }
    }

    /// Mark the entry outdated without touching its data.
    pub fn stale() -> Self {
        Self {
            status: Some(Status::Stale),
            ..Self::default()
        }
    }

    /// Apply a completed fetch. Success stores the body and clears any
    /// previous error; failure stores the error and clears the data.
    pub fn settled(outcome: FetchOutcome, issued_at: Instant, fetched_at: DateTime<Utc>) -> Self {
        match outcome {
            Ok(data) => Self {
                status: Some(Status::Success),
                data: Some(data),
                clear_error: true,
                last_fetched_at: Some(fetched_at),
                issued_at: Some(issued_at),
                ..Self::default()
            },
            Err(error) => Self {
                status: Some(Status::Error),
                error: Some(error),
                clear_data: true,
                last_fetched_at: Some(fetched_at),
                issued_at: Some(issued_at),
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_is_idle() {
        let key = CacheKey::derive("getAllUsers", &json!({}));
        let entry = CacheEntry::new(key, "getAllUsers", json!({}), vec![Tag("User")]);

        assert_eq!(entry.status, Status::Idle);
        assert!(entry.needs_fetch());
        assert_eq!(entry.subscriber_count, 0);
        assert!(entry.data.is_none());
    }

    #[test]
    fn test_settled_success_clears_error() {
        let patch = EntryPatch::settled(Ok(json!([1, 2])), Instant::now(), Utc::now());
        assert_eq!(patch.status, Some(Status::Success));
        assert!(patch.clear_error);
        assert!(!patch.clear_data);
    }

    #[test]
    fn test_settled_failure_clears_data() {
        let patch = EntryPatch::settled(
            Err(crate::error::ErrorInfo::transport("boom")),
            Instant::now(),
            Utc::now(),
        );
        assert_eq!(patch.status, Some(Status::Error));
        assert!(patch.clear_data);
    }
}
