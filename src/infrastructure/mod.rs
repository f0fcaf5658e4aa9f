pub mod database;
pub mod error;
pub mod storage;

pub use database::{connect_store, MemoryStore, PgStore, Store};
pub use storage::MediaStorage;
