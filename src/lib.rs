//! Resource cache and mutation coordinator for the admin dashboard.
//!
//! Views declare interest in a query (endpoint + arguments) through
//! [`ResourceClient::mount`]; the client caches results per key,
//! deduplicates concurrent identical fetches, and publishes every
//! state change to all subscribers of that key. Mutations go through
//! [`ResourceClient::mutate`]; on success their declared tags are
//! invalidated and subscribed queries refetch in the background.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod testing;

pub use api::{
    ImageFile, NewPromotion, NewUser, Promotion, PromotionUpdate, Role, TypedQuery, User,
    UserUpdate, connect,
};
pub use cache::{CacheKey, EntrySnapshot, Status};
pub use client::{
    HttpTransport, MultipartField, OutboundRequest, QueryHandle, RequestBody, ResourceClient,
    Transport, WireResponse,
};
pub use config::Config;
pub use error::{ErrorInfo, ErrorKind, FetchOutcome, PlinthError, Result};
pub use registry::{EndpointDescriptor, EndpointKind, EndpointRegistry, Tag};
pub use session::{Session, TokenStore};
