pub mod handle;
pub mod sqlite;
pub mod trait_def;

pub use handle::StorageHandle;
pub use sqlite::SqliteStorage;
pub use trait_def::{EventPage, EventQuery, Storage, StorageError, StorageResult};
