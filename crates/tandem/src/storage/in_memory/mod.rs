//! In-memory storage backend.
//!
//! All data is held in RAM behind a single `tokio::sync::Mutex` and is **lost
//! when the process exits** unless it is written out with [`save_to_jsonl`].
//!
//! - **In-memory only**: Use [`new_in_memory_store()`] for ephemeral storage
//! - **With persistence**: Use [`load_from_jsonl()`] to read a data file and
//!   [`save_to_jsonl()`] to write it back
//!
//! # Thread Safety
//!
//! The state is wrapped in `Arc<Mutex<StoreState>>`. Every trait method takes
//! the lock exactly once, so [`FeatureStore::apply`] reads the current status,
//! checks the transition table and writes the result with no other operation
//! interleaving. That makes `apply` a compare-and-transition primitive the claim
//! coordinator can race against safely.
//!
//! # Ordering
//!
//! Features and edges are kept in `BTreeMap`s, so snapshots come out ordered by
//! id and by `(feature_id, depends_on_id)` without a separate sort.

mod inner;
mod jsonl;
mod trait_impl;

use crate::storage::FeatureStore;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) use inner::StoreState;
pub(crate) use jsonl::{read_state, write_state};

// Re-export public API
pub use jsonl::{LoadWarning, load_from_jsonl, save_to_jsonl};

/// Thread-safe in-memory storage.
///
/// Implements [`FeatureStore`] via the trait implementation in `trait_impl.rs`.
pub(crate) type InMemoryStore = Arc<Mutex<StoreState>>;

/// Create an empty in-memory store handle.
pub(crate) fn empty_store() -> InMemoryStore {
    Arc::new(Mutex::new(StoreState::default()))
}

/// Create a new in-memory store.
///
/// # Example
///
/// ```
/// use tandem::storage::in_memory::new_in_memory_store;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let store = new_in_memory_store();
///     assert!(store.features().await.unwrap().is_empty());
/// }
/// ```
#[must_use]
pub fn new_in_memory_store() -> Arc<dyn FeatureStore> {
    Arc::new(empty_store())
}
