//! In-memory backend, used by tests and for local runs without PostgreSQL.

use crate::db::{OrderSource, StatementStore};
use crate::error::{LedgerError, Result};
use crate::models::{
    AnchorSeed, BaseOrder, LineTemplate, Mutation, NewStatement, OrderSeed, Scope, Site,
    Statement, StatementHeader, SubcontractOrder,
};
use crate::service::ledger::{ensure_tail, next_sequence, select_anchor};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    statements: IndexMap<i64, Statement>,
    last_id: i64,
}

impl MemoryState {
    fn max_sequence(&self, scope: &Scope) -> Option<i32> {
        self.statements
            .values()
            .filter(|s| s.scope == *scope)
            .map(|s| s.sequence_number)
            .max()
    }

    fn append(
        &mut self,
        scope: Scope,
        order_id: Option<i64>,
        anchor_statement_id: Option<i64>,
        header: StatementHeader,
        draft_templates: &[LineTemplate],
    ) -> Statement {
        self.last_id += 1;
        let statement = Statement::seed(
            self.last_id,
            scope,
            next_sequence(self.max_sequence(&scope)),
            order_id,
            anchor_statement_id,
            header,
            draft_templates,
            Utc::now(),
        );
        self.statements.insert(statement.id, statement.clone());
        statement
    }

    fn ensure_anchor(&mut self, site_id: i64, seed: AnchorSeed) -> Statement {
        let existing = select_anchor(
            self.statements
                .values()
                .filter(|s| s.scope.site_id() == site_id),
        );
        match existing {
            Some(anchor) => anchor.clone(),
            None => {
                tracing::info!(site_id, "creating client anchor statement");
                self.append(
                    Scope::Client { site_id },
                    seed.base_order_id,
                    None,
                    StatementHeader::default(),
                    &seed.templates,
                )
            }
        }
    }
}

/// Statement store guarded by a single async mutex; each call is one unit of work.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatementStore for MemoryStore {
    async fn list(&self, scope: Scope) -> Result<Vec<Statement>> {
        let state = self.state.lock().await;
        let mut statements: Vec<Statement> = state
            .statements
            .values()
            .filter(|s| s.scope == scope)
            .cloned()
            .collect();
        statements.sort_by_key(|s| s.sequence_number);
        Ok(statements)
    }

    async fn get(&self, id: i64) -> Result<Statement> {
        let state = self.state.lock().await;
        state
            .statements
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("statement {}", id)))
    }

    async fn create(&self, draft: NewStatement) -> Result<Statement> {
        let mut state = self.state.lock().await;
        let anchor_statement_id = match draft.scope {
            Scope::Client { .. } => None,
            Scope::Subcontractor { site_id, .. } => {
                let seed = draft.anchor.ok_or_else(|| {
                    LedgerError::Internal("subcontractor statement without anchor seed".into())
                })?;
                Some(state.ensure_anchor(site_id, seed).id)
            }
        };

        Ok(state.append(
            draft.scope,
            draft.order_id,
            anchor_statement_id,
            draft.header,
            &draft.templates,
        ))
    }

    async fn ensure_client_anchor(&self, site_id: i64, seed: AnchorSeed) -> Result<Statement> {
        let mut state = self.state.lock().await;
        Ok(state.ensure_anchor(site_id, seed))
    }

    async fn mutate(&self, id: i64, mutation: Mutation) -> Result<Statement> {
        let mut state = self.state.lock().await;
        let stored = state
            .statements
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(format!("statement {}", id)))?;

        let mut next = stored.clone();
        next.apply(mutation, Utc::now())?;
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn delete_tail(&self, id: i64) -> Result<Statement> {
        let mut state = self.state.lock().await;
        let statement = state
            .statements
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("statement {}", id)))?;

        ensure_tail(&statement, state.max_sequence(&statement.scope))?;

        let anchored = state
            .statements
            .values()
            .filter(|s| s.anchor_statement_id == Some(id))
            .count();
        if anchored > 0 {
            return Err(LedgerError::conflict(format!(
                "statement {} anchors {} subcontractor statement(s)",
                id, anchored
            )));
        }

        state.statements.shift_remove(&id);
        Ok(statement)
    }
}

/// Order source backed by concurrent maps, filled from an [`OrderSeed`].
#[derive(Debug, Default)]
pub struct MemoryOrders {
    sites: DashMap<String, Site>,
    base_orders: DashMap<i64, BaseOrder>,
    subcontract_orders: DashMap<(i64, i64), SubcontractOrder>,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: OrderSeed) -> Self {
        let orders = Self::new();
        for site in seed.sites {
            orders.insert_site(site);
        }
        for order in seed.base_orders {
            orders.insert_base_order(order);
        }
        for order in seed.subcontract_orders {
            orders.insert_subcontract_order(order);
        }
        orders
    }

    pub fn insert_site(&self, site: Site) {
        self.sites.insert(site.code.clone(), site);
    }

    /// One base order per site; a later insert replaces the earlier one.
    pub fn insert_base_order(&self, order: BaseOrder) {
        self.base_orders.insert(order.site_id, order);
    }

    pub fn insert_subcontract_order(&self, order: SubcontractOrder) {
        self.subcontract_orders
            .insert((order.site_id, order.subcontractor_id), order);
    }
}

#[async_trait]
impl OrderSource for MemoryOrders {
    async fn site_by_code(&self, code: &str) -> Result<Option<Site>> {
        Ok(self.sites.get(code).map(|s| s.value().clone()))
    }

    async fn base_order(&self, site_id: i64) -> Result<Option<BaseOrder>> {
        Ok(self.base_orders.get(&site_id).map(|o| o.value().clone()))
    }

    async fn subcontract_order(
        &self,
        site_id: i64,
        subcontractor_id: i64,
    ) -> Result<Option<SubcontractOrder>> {
        Ok(self
            .subcontract_orders
            .get(&(site_id, subcontractor_id))
            .map(|o| o.value().clone()))
    }
}
