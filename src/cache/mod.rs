// Cache module.
// Keyed storage of query results, their lifecycle state, and the
// subscribers watching them.

pub mod entry;
pub mod key;
pub mod store;

pub use entry::{CacheEntry, EntryPatch, EntrySnapshot, Status};
pub use key::CacheKey;
pub use store::CacheStore;
