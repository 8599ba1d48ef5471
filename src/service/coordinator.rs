//! Binds the subcontractor track to the client track of the same site.

use crate::db::{OrderSource, StatementStore};
use crate::error::{LedgerError, Result};
use crate::models::{AnchorSeed, NewStatement, Scope, Statement, StatementHeader};
use std::sync::Arc;
use tracing::info;

pub struct DualTrackCoordinator {
    store: Arc<dyn StatementStore>,
    orders: Arc<dyn OrderSource>,
}

impl DualTrackCoordinator {
    pub fn new(store: Arc<dyn StatementStore>, orders: Arc<dyn OrderSource>) -> Self {
        Self { store, orders }
    }

    /// Seed for a client anchor: the site's base order, or no lines at all.
    async fn anchor_seed(&self, site_id: i64) -> Result<AnchorSeed> {
        Ok(match self.orders.base_order(site_id).await? {
            Some(order) => AnchorSeed {
                base_order_id: Some(order.id),
                templates: order.lines,
            },
            None => AnchorSeed::default(),
        })
    }

    /// Latest client statement of the site, created as draft #1 when missing.
    pub async fn ensure_client_anchor(&self, site_id: i64) -> Result<Statement> {
        let seed = self.anchor_seed(site_id).await?;
        self.store.ensure_client_anchor(site_id, seed).await
    }

    pub async fn create_subcontractor_statement(
        &self,
        site_id: i64,
        subcontractor_id: i64,
        header: StatementHeader,
    ) -> Result<Statement> {
        let order = self
            .orders
            .subcontract_order(site_id, subcontractor_id)
            .await?
            .ok_or_else(|| {
                LedgerError::not_found(format!(
                    "subcontract order for subcontractor {} on site {}",
                    subcontractor_id, site_id
                ))
            })?;

        let anchor = self.anchor_seed(site_id).await?;
        let statement = self
            .store
            .create(NewStatement {
                scope: Scope::Subcontractor {
                    site_id,
                    subcontractor_id,
                },
                order_id: Some(order.id),
                header,
                templates: order.lines,
                anchor: Some(anchor),
            })
            .await?;

        info!(
            statement_id = statement.id,
            anchor_statement_id = ?statement.anchor_statement_id,
            "subcontractor {} statement #{} created on site {}",
            subcontractor_id,
            statement.sequence_number,
            site_id
        );
        Ok(statement)
    }

    pub async fn list_subcontractor(
        &self,
        site_id: i64,
        subcontractor_id: i64,
    ) -> Result<Vec<Statement>> {
        self.store
            .list(Scope::Subcontractor {
                site_id,
                subcontractor_id,
            })
            .await
    }
}
