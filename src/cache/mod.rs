//! TTL caching in front of the executor
//!
//! Server-side calls use a process-local [`MemoryStore`]; client-side calls
//! use a [`FileStore`] persisted under the user cache directory.

mod entry;
mod read_through;
mod store;

pub use entry::{CacheEntry, Freshness, TtlPolicy};
pub use read_through::ReadThroughCache;
pub use store::{CacheStore, FileStore, MemoryStore};
