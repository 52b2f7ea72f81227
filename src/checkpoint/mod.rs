//! Checkpoint persistence
//!
//! One current-best checkpoint per stage, published atomically, readable
//! concurrently with writes.

mod backend;
mod handle;
mod store;

#[cfg(test)]
mod tests;

pub use backend::{FsBackend, MemoryBackend, StorageBackend};
pub use handle::{compute_digest, CheckpointHandle};
pub use store::CheckpointStore;
