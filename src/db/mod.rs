pub mod memory;
pub mod orders;
pub mod pool;
pub mod postgres;
pub mod queries;

pub use memory::{MemoryOrders, MemoryStore};
pub use pool::{create_pool, run_migrations};
pub use postgres::PgStore;

use crate::error::Result;
use crate::models::{
    AnchorSeed, BaseOrder, Mutation, NewStatement, Scope, Site, Statement, SubcontractOrder,
};
use async_trait::async_trait;

/// Transactional store of progress statements (client and subcontractor tracks).
///
/// Every write re-reads the statement and its scope inside the unit of work
/// that persists it; nothing is committed when a rule rejects the write.
#[async_trait]
pub trait StatementStore: Send + Sync {
    /// Statements of a scope, ordered by sequence number
    async fn list(&self, scope: Scope) -> Result<Vec<Statement>>;

    async fn get(&self, id: i64) -> Result<Statement>;

    /// Appends a statement to its scope. Subcontractor statements are anchored
    /// on the site's latest client statement, created from `draft.anchor` if
    /// the site has none.
    async fn create(&self, draft: NewStatement) -> Result<Statement>;

    /// Latest client statement of the site, or a new draft #1 seeded from `seed`.
    async fn ensure_client_anchor(&self, site_id: i64, seed: AnchorSeed) -> Result<Statement>;

    async fn mutate(&self, id: i64, mutation: Mutation) -> Result<Statement>;

    /// Deletes the statement if it is the tail of its scope; returns it.
    async fn delete_tail(&self, id: i64) -> Result<Statement>;
}

/// Read-only access to sites and the orders statements are seeded from.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn site_by_code(&self, code: &str) -> Result<Option<Site>>;

    async fn base_order(&self, site_id: i64) -> Result<Option<BaseOrder>>;

    async fn subcontract_order(
        &self,
        site_id: i64,
        subcontractor_id: i64,
    ) -> Result<Option<SubcontractOrder>>;
}
