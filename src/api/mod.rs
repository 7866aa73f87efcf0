// Dashboard API module.
// Endpoint registrations, wire types, and the typed query wrapper.

pub mod endpoints;
pub mod types;

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::cache::{CacheKey, EntrySnapshot, Status};
use crate::client::{QueryHandle, Transport};
use crate::error::{ErrorInfo, FetchOutcome, Result};

pub use endpoints::{builtin, connect, tags};
pub use types::{
    ImageFile, LoginResponse, NewPromotion, NewUser, Promotion, PromotionUpdate, Role, User,
    UserUpdate,
};

/// A mounted query whose cached value decodes into `V`.
pub struct TypedQuery<V, T: Transport> {
    handle: QueryHandle<T>,
    _marker: PhantomData<V>,
}

impl<V: DeserializeOwned, T: Transport> TypedQuery<V, T> {
    pub fn new(handle: QueryHandle<T>) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &CacheKey {
        self.handle.key()
    }

    pub fn status(&self) -> Status {
        self.handle.status()
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        self.handle.snapshot()
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.handle.snapshot().error
    }

    /// Decode the cached data, if any.
    pub fn data(&self) -> Result<Option<V>> {
        match self.handle.snapshot().data {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Wait for the next published change.
    pub async fn changed(&mut self) -> EntrySnapshot {
        self.handle.changed().await
    }

    /// Wait until the query reaches `Success` or `Error`.
    pub async fn settled(&mut self) -> EntrySnapshot {
        self.handle.settled().await
    }

    /// Force a refetch, deduplicated against identical in-flight
    /// requests.
    pub async fn refetch(&self) -> FetchOutcome {
        self.handle.refetch().await
    }

    pub fn into_inner(self) -> QueryHandle<T> {
        self.handle
    }
}
