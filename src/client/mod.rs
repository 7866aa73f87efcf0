// Resource client.
// Ties the endpoint registry, cache store, request executor, and
// session together: views mount queries, mutations invalidate by tag.

pub mod executor;
pub mod transport;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore, EntryPatch, EntrySnapshot, Status};
use crate::config::Config;
use crate::error::{FetchOutcome, PlinthError, Result};
use crate::registry::{EndpointKind, EndpointRegistry};
use crate::session::Session;

pub use transport::{HttpTransport, MultipartField, OutboundRequest, RequestBody, Transport, WireResponse};

/// A query fetch that is currently outstanding. Joiners await the
/// leader's outcome through the watch channel.
pub(crate) struct InFlight {
    pub(crate) outcome: watch::Receiver<Option<FetchOutcome>>,
}

/// Cache entries and the in-flight request map, guarded together so
/// dedup checks, upserts, and evictions are linearized. The lock is
/// never held across an await.
pub(crate) struct CoreState {
    pub(crate) cache: CacheStore,
    pub(crate) inflight: HashMap<CacheKey, InFlight>,
}

pub(crate) struct ClientInner<T> {
    pub(crate) registry: EndpointRegistry,
    pub(crate) transport: T,
    pub(crate) session: Session,
    pub(crate) config: Config,
    pub(crate) state: Mutex<CoreState>,
}

/// The resource cache and mutation coordinator.
///
/// Cheap to clone; all clones share one cache, one in-flight map, and
/// one session.
pub struct ResourceClient<T: Transport> {
    pub(crate) inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ResourceClient<T> {
    pub fn new(config: Config, registry: EndpointRegistry, transport: T, session: Session) -> Self {
        let state = CoreState {
            cache: CacheStore::new(config.grace_period),
            inflight: HashMap::new(),
        };
        Self {
            inner: Arc::new(ClientInner {
                registry,
                transport,
                session,
                config,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.inner.registry
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, CoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declare interest in a query. Creates the cache entry if absent,
    /// increments its subscriber count, and triggers a fetch when the
    /// entry is new or stale. Returns a live handle that observes every
    /// published change for the key.
    pub fn mount(&self, endpoint: &str, args: Value) -> Result<QueryHandle<T>> {
        let descriptor = self.inner.registry.resolve(endpoint)?;
        if descriptor.kind != EndpointKind::Query {
            return Err(PlinthError::NotAQuery(endpoint.to_string()));
        }
        let tags = descriptor.tags.clone();

        let key = CacheKey::derive(endpoint, &args);
        let (updates, needs_fetch) = {
            let mut state = self.lock_state();
            state.cache.ensure(&key, endpoint, args, tags);
            let needs_fetch = state.cache.get(&key).is_some_and(|entry| entry.needs_fetch());
            let updates = match state.cache.subscribe(&key) {
                Some(updates) => updates,
                // The entry was just ensured; subscribe cannot miss.
                None => return Err(PlinthError::UnknownEndpoint(endpoint.to_string())),
            };
            (updates, needs_fetch)
        };

        if needs_fetch {
            self.spawn_fetch(key.clone());
        }

        Ok(QueryHandle {
            client: self.clone(),
            key,
            updates,
        })
    }

    /// Drop a subscription. The entry stays cached for the grace
    /// period in case the view remounts.
    pub fn unmount(&self, handle: QueryHandle<T>) {
        drop(handle);
    }

    /// Run a mutation. The outcome goes only to the caller; on success
    /// the endpoint's declared tags are invalidated and subscribed
    /// entries refetch in the background.
    pub async fn mutate(&self, endpoint: &str, args: Value, body: RequestBody) -> Result<Value> {
        let descriptor = self.inner.registry.resolve(endpoint)?;
        if descriptor.kind != EndpointKind::Mutation {
            return Err(PlinthError::NotAMutation(endpoint.to_string()));
        }

        let request = self.build_request(descriptor, &args, body);
        debug!(endpoint, url = request.url, "issuing mutation");
        let outcome = self.perform(request).await;

        self.on_mutation_settled(endpoint, &outcome);
        outcome.map_err(PlinthError::from)
    }

    /// Invalidation coordinator. On a successful mutation, every entry
    /// carrying one of the mutation's tags goes stale: subscribed
    /// entries refetch immediately, unreferenced ones wait for their
    /// next mount. Failed mutations invalidate nothing.
    pub fn on_mutation_settled(&self, endpoint: &str, outcome: &FetchOutcome) {
        if outcome.is_err() {
            return;
        }
        let tags = match self.inner.registry.resolve(endpoint) {
            Ok(descriptor) => descriptor.tags.clone(),
            Err(_) => {
                warn!(endpoint, "mutation settled for unregistered endpoint");
                return;
            }
        };
        if tags.is_empty() {
            return;
        }

        let refetch = {
            let mut state = self.lock_state();
            let keys = state.cache.tagged(&tags);
            let mut refetch = Vec::new();
            for key in keys {
                let Some(entry) = state.cache.get(&key) else {
                    continue;
                };
                match entry.status {
                    Status::Success | Status::Error => {
                        let subscribed = entry.subscriber_count > 0;
                        state.cache.upsert(&key, EntryPatch::stale());
                        if subscribed {
                            refetch.push(key);
                        }
                    }
                    // Already stale: marking again is a no-op, but a
                    // subscribed entry with no fetch outstanding still
                    // needs its refetch.
                    Status::Stale => {
                        if entry.subscriber_count > 0 && !state.inflight.contains_key(&key) {
                            refetch.push(key);
                        }
                    }
                    Status::Idle | Status::Loading => {}
                }
            }
            refetch
        };

        for key in refetch {
            info!(key = key.as_str(), endpoint, "refetching after mutation");
            self.spawn_fetch(key);
        }
    }

    /// Current state of a cached entry, if present.
    pub fn entry_snapshot(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.lock_state().cache.get(key).map(|entry| entry.snapshot())
    }

    /// Evict one key if it is unreferenced past the grace period.
    pub fn evict_if_unreferenced(&self, key: &CacheKey) -> bool {
        self.lock_state().cache.evict_if_unreferenced(key)
    }

    /// Evict every eligible entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.lock_state().cache.sweep()
    }

    /// Background task that sweeps unreferenced entries on an
    /// interval. Abort the handle to stop it.
    pub fn start_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = client.sweep();
                if evicted > 0 {
                    debug!(evicted, "sweeper evicted cache entries");
                }
            }
        })
    }

    fn spawn_fetch(&self, key: CacheKey) {
        let client = self.clone();
        tokio::spawn(async move {
            let _ = client.run_fetch(&key, false).await;
        });
    }
}

/// Live view of one mounted query.
///
/// Holds a subscription on the cache entry; dropping the handle
/// releases it (the entry itself survives for the grace period).
pub struct QueryHandle<T: Transport> {
    client: ResourceClient<T>,
    key: CacheKey,
    updates: watch::Receiver<EntrySnapshot>,
}

impl<T: Transport> std::fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> QueryHandle<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest published state for the entry.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.updates.borrow().clone()
    }

    pub fn status(&self) -> Status {
        self.updates.borrow().status
    }

    /// Wait for the next published change.
    pub async fn changed(&mut self) -> EntrySnapshot {
        let _ = self.updates.changed().await;
        self.snapshot()
    }

    /// Wait until the entry reaches `Success` or `Error`.
    pub async fn settled(&mut self) -> EntrySnapshot {
        let result = self
            .updates
            .wait_for(EntrySnapshot::is_settled)
            .await
            .map(|snapshot| snapshot.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// Force the executor to run again, regardless of current status.
    /// Concurrent refetches of the same key share one network call.
    pub async fn refetch(&self) -> FetchOutcome {
        self.client.run_fetch(&self.key, true).await
    }
}

impl<T: Transport> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        self.client.lock_state().cache.release(&self.key);
    }
}
