//! Company storage port.
//!
//! Reads go straight to the store. Writes always go through a `CompanyTx`, so
//! the write, the verifying re-read and the event publish can share one unit
//! of work that either commits or rolls back as a whole.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCompanyStore;
pub use postgres::{PostgresCompanyStore, PostgresOptions};

use async_trait::async_trait;
use thiserror::Error;

use corpreg_companies::{Company, CompanyDraft, CompanyFilter};
use corpreg_core::CompanyId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("company not found")]
    NotFound,

    /// Connection/pool level failure.
    #[error("connection error in {operation}: {message}")]
    Connection {
        operation: &'static str,
        message: String,
    },

    /// The database rejected or failed a statement.
    #[error("database error in {operation}: {message}")]
    Query {
        operation: &'static str,
        message: String,
    },

    /// A stored value could not be mapped onto the domain type.
    #[error("corrupt row in {operation}: {message}")]
    Corrupt {
        operation: &'static str,
        message: String,
    },
}

/// Entry point to company storage.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Open a read-committed unit of work.
    async fn begin(&self) -> Result<Box<dyn CompanyTx>, StoreError>;

    /// Companies matching every active filter field, ordered by id.
    async fn list(&self, filter: &CompanyFilter) -> Result<Vec<Company>, StoreError>;

    async fn get(&self, id: CompanyId) -> Result<Option<Company>, StoreError>;

    /// Cheap liveness probe used by the health check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release pooled connections. Called once at shutdown.
    async fn close(&self);
}

/// One open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait CompanyTx: Send {
    /// Insert a new row; storage assigns the id.
    async fn insert(&mut self, draft: &CompanyDraft) -> Result<CompanyId, StoreError>;

    /// Overwrite every text field of an existing row. `NotFound` when absent.
    async fn update(&mut self, id: CompanyId, draft: &CompanyDraft) -> Result<(), StoreError>;

    /// Remove a row. `NotFound` when absent.
    async fn delete(&mut self, id: CompanyId) -> Result<(), StoreError>;

    /// Read through the transaction (sees its own uncommitted writes).
    async fn get(&mut self, id: CompanyId) -> Result<Option<Company>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
