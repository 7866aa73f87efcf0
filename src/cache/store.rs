// Cache store.
// Keyed storage of query results with subscriber counting, synchronous
// publication of changes, and grace-period eviction.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::entry::{CacheEntry, EntryPatch, EntrySnapshot};
use crate::cache::key::CacheKey;
use crate::registry::Tag;

struct Slot {
    entry: CacheEntry,
    publisher: watch::Sender<EntrySnapshot>,
}

/// Owner of all cache entries.
///
/// The store itself is a plain struct; the client wraps it in a single
/// mutex, which linearizes upserts and evictions on every key.
pub struct CacheStore {
    entries: HashMap<CacheKey, Slot>,
    grace_period: Duration,
}

impl CacheStore {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            grace_period,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create the entry for a key if it does not exist yet.
    pub fn ensure(&mut self, key: &CacheKey, endpoint: &str, args: serde_json::Value, tags: Vec<Tag>) {
        self.entries.entry(key.clone()).or_insert_with(|| {
            let entry = CacheEntry::new(key.clone(), endpoint, args, tags);
            let (publisher, _) = watch::channel(entry.snapshot());
            Slot { entry, publisher }
        });
    }

    /// Register interest in a key. Increments the subscriber count and
    /// returns a receiver that observes every published change.
    pub fn subscribe(&mut self, key: &CacheKey) -> Option<watch::Receiver<EntrySnapshot>> {
        let slot = self.entries.get_mut(key)?;
        slot.entry.subscriber_count += 1;
        slot.entry.idle_since = None;
        Some(slot.publisher.subscribe())
    }

    /// Drop one subscription. At zero the entry becomes eligible for
    /// eviction once the grace period elapses.
    pub fn release(&mut self, key: &CacheKey) {
        if let Some(slot) = self.entries.get_mut(key) {
            slot.entry.subscriber_count = slot.entry.subscriber_count.saturating_sub(1);
            if slot.entry.subscriber_count == 0 {
                slot.entry.idle_since = Some(Instant::now());
            }
        }
    }

    /// Apply a partial update and publish the new state to all current
    /// subscribers of the key.
    ///
    /// Returns false when the key is absent or the patch carries an
    /// outcome from a fetch issued before the one that produced the
    /// entry's current data; superseded responses never overwrite
    /// newer data.
    pub fn upsert(&mut self, key: &CacheKey, patch: EntryPatch) -> bool {
        let Some(slot) = self.entries.get_mut(key) else {
            return false;
        };

        if let (Some(incoming), Some(current)) = (patch.issued_at, slot.entry.data_issued_at) {
            if incoming < current {
                debug!(key = key.as_str(), "discarding superseded response");
                return false;
            }
        }

        let entry = &mut slot.entry;
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if patch.clear_data {
            entry.data = None;
        }
        if let Some(data) = patch.data {
            entry.data = Some(data);
        }
        if patch.clear_error {
            entry.error = None;
        }
        if let Some(error) = patch.error {
            entry.error = Some(error);
        }
        if let Some(fetched_at) = patch.last_fetched_at {
            entry.last_fetched_at = Some(fetched_at);
        }
        if let Some(issued_at) = patch.issued_at {
            entry.data_issued_at = Some(issued_at);
        }

        slot.publisher.send_replace(entry.snapshot());
        true
    }

    /// Remove the entry only if nobody subscribes to it and the grace
    /// period has passed since the count reached zero.
    pub fn evict_if_unreferenced(&mut self, key: &CacheKey) -> bool {
        let eligible = self.entries.get(key).is_some_and(|slot| {
            slot.entry.subscriber_count == 0
                && slot
                    .entry
                    .idle_since
                    .is_some_and(|since| since.elapsed() >= self.grace_period)
        });
        if eligible {
            self.entries.remove(key);
            debug!(key = key.as_str(), "evicted unreferenced cache entry");
        }
        eligible
    }

    /// Evict every eligible entry. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let keys: Vec<CacheKey> = self.entries.keys().cloned().collect();
        keys.iter()
            .filter(|key| self.evict_if_unreferenced(key))
            .count()
    }

    /// Keys of all entries carrying any of the given tags.
    pub fn tagged(&self, tags: &[Tag]) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|(_, slot)| slot.entry.tags.iter().any(|tag| tags.contains(tag)))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::Status;
    use crate::error::ErrorInfo;
    use chrono::Utc;
    use serde_json::json;

    fn store() -> (CacheStore, CacheKey) {
        let mut store = CacheStore::new(Duration::from_secs(30));
        let key = CacheKey::derive("getAllPromotions", &json!({}));
        store.ensure(&key, "getAllPromotions", json!({}), vec![Tag("Promotion")]);
        (store, key)
    }

    #[test]
    fn test_subscribe_and_release_track_count() {
        let (mut store, key) = store();

        let _rx1 = store.subscribe(&key).unwrap();
        let _rx2 = store.subscribe(&key).unwrap();
        assert_eq!(store.get(&key).unwrap().subscriber_count, 2);

        store.release(&key);
        store.release(&key);
        assert_eq!(store.get(&key).unwrap().subscriber_count, 0);

        // Never goes negative.
        store.release(&key);
        assert_eq!(store.get(&key).unwrap().subscriber_count, 0);
    }

    #[test]
    fn test_upsert_publishes_to_subscribers() {
        let (mut store, key) = store();
        let rx = store.subscribe(&key).unwrap();
        assert_eq!(rx.borrow().status, Status::Idle);

        store.upsert(&key, EntryPatch::loading());
        assert_eq!(rx.borrow().status, Status::Loading);

        store.upsert(
            &key,
            EntryPatch::settled(Ok(json!([{ "id": 1 }])), Instant::now(), Utc::now()),
        );
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, Status::Success);
        assert_eq!(snapshot.data, Some(json!([{ "id": 1 }])));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_error_outcome_clears_data() {
        let (mut store, key) = store();

        store.upsert(
            &key,
            EntryPatch::settled(Ok(json!([1])), Instant::now(), Utc::now()),
        );
        store.upsert(
            &key,
            EntryPatch::settled(
                Err(ErrorInfo::http(500, "server error", "{}")),
                Instant::now() + Duration::from_millis(1),
                Utc::now(),
            ),
        );

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status, Status::Error);
        assert!(entry.data.is_none());
        assert!(entry.error.is_some());
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let (mut store, key) = store();
        let early = Instant::now();
        let late = early + Duration::from_millis(10);

        assert!(store.upsert(
            &key,
            EntryPatch::settled(Ok(json!("new")), late, Utc::now())
        ));
        // A slower request issued earlier completes afterwards.
        assert!(!store.upsert(
            &key,
            EntryPatch::settled(Ok(json!("old")), early, Utc::now())
        ));

        assert_eq!(store.get(&key).unwrap().data, Some(json!("new")));
    }

    #[test]
    fn test_tagged_matches_any_tag() {
        let (mut store, promo_key) = store();
        let user_key = CacheKey::derive("getAllUsers", &json!({}));
        store.ensure(&user_key, "getAllUsers", json!({}), vec![Tag("User")]);

        let tagged = store.tagged(&[Tag("Promotion")]);
        assert_eq!(tagged, vec![promo_key]);
        assert!(store.tagged(&[Tag("Nothing")]).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_respects_grace_period() {
        let (mut store, key) = store();
        let rx = store.subscribe(&key).unwrap();

        // Subscribed: never evicted.
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!store.evict_if_unreferenced(&key));

        drop(rx);
        store.release(&key);

        // Zero subscribers but inside the grace period.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!store.evict_if_unreferenced(&key));
        assert!(store.contains(&key));

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(store.evict_if_unreferenced(&key));
        assert!(!store.contains(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_resets_grace_clock() {
        let (mut store, key) = store();
        let rx = store.subscribe(&key).unwrap();
        drop(rx);
        store.release(&key);

        tokio::time::advance(Duration::from_secs(20)).await;
        let _rx = store.subscribe(&key).unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        // Remounted before the grace period ran out.
        assert_eq!(store.sweep(), 0);
        assert!(store.contains(&key));
    }
}
