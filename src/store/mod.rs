// Re-export all public items from the store modules
pub use document_store::*;
pub use memory_store::InMemoryStore;
pub use mutation::*;
pub use path::*;
pub use slow_store::SlowStore;
pub use snapshot::*;
pub use sqlite_store::SqliteStore;
pub use subscription::*;

pub mod document_store;
pub mod memory_store;
pub mod mutation;
pub mod path;
pub mod slow_store;
pub mod snapshot;
pub mod sqlite_store;
pub mod subscription;
