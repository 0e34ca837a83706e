//! Concrete [`RemoteStore`](crate::ports::RemoteStore),
//! [`Catalog`](crate::ports::Catalog) and
//! [`VideoService`](crate::ports::VideoService) implementations.

/// JSON lines journal acting as catalog and video service
pub mod journal;
/// Directory tree acting as the remote store
pub mod local;
/// In-process store and recording catalog
pub mod memory;

pub use journal::{JournalCatalog, JournalEntry};
pub use local::LocalFolderStore;
pub use memory::{MemoryCatalog, MemoryStore, MemoryStoreBuilder};
