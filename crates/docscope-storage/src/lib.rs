//! docscope-storage: SQLite persistence for the knowledge base.
//!
//! One serialized write connection plus a pool of read-only connections,
//! versioned migrations, free-function queries per table, and the
//! [`SqliteKnowledgeStore`] / [`SqliteReviewQueue`] implementations of the
//! core collaborator traits.

pub mod connection;
pub mod migrations;
pub mod queries;
pub mod review_queue;
pub mod store;

pub use connection::DatabaseManager;
pub use review_queue::SqliteReviewQueue;
pub use store::SqliteKnowledgeStore;

use docscope_core::errors::StorageError;

pub(crate) fn sqlite_err(e: rusqlite::Error) -> StorageError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
}
