//! In-memory backends.
//!
//! Used by the binary when no external index is configured, and by tests
//! across the workspace. Both types are cheap handles over shared state, so
//! a clone observes the same data as the original.

mod index;
mod store;

pub use index::InMemorySearchIndex;
pub use store::InMemoryRecordStore;
