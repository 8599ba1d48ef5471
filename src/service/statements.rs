use crate::config::LedgerConfig;
use crate::db::{OrderSource, StatementStore};
use crate::error::{LedgerError, Result};
use crate::models::{
    AmendmentInput, AmendmentPatch, FiguresPatch, MetaPatch, Mutation, NewStatement, Scope, Site,
    Statement, StatementHeader, StatementView,
};
use crate::service::calculator;
use crate::service::coordinator::DualTrackCoordinator;
use crate::service::export::statement_to_csv;
use crate::service::totals::{aggregate, vat_summary};
use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::info;

/// Entry point of the ledger: resolves sites, seeds statements from orders and
/// routes every write through the store.
pub struct LedgerService {
    store: Arc<dyn StatementStore>,
    orders: Arc<dyn OrderSource>,
    coordinator: DualTrackCoordinator,
    vat_rate: BigDecimal,
    allow_reopen: bool,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn StatementStore>,
        orders: Arc<dyn OrderSource>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            coordinator: DualTrackCoordinator::new(store.clone(), orders.clone()),
            store,
            orders,
            vat_rate: calculator::from_f64(config.vat_rate),
            allow_reopen: config.allow_reopen,
        }
    }

    pub async fn resolve_site(&self, code: &str) -> Result<Site> {
        self.orders
            .site_by_code(code)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("site {}", code)))
    }

    pub fn view(&self, statement: Statement) -> StatementView {
        let totals = aggregate(&statement.lines, &statement.amendments);
        let vat = vat_summary(&totals.grand, &self.vat_rate);
        StatementView {
            finalized: statement.is_finalized(),
            totals,
            vat,
            statement,
        }
    }

    fn views(&self, statements: Vec<Statement>) -> Vec<StatementView> {
        statements.into_iter().map(|s| self.view(s)).collect()
    }

    async fn mutate(&self, id: i64, mutation: Mutation) -> Result<StatementView> {
        let statement = self.store.mutate(id, mutation).await?;
        Ok(self.view(statement))
    }

    pub async fn list_client(&self, site_code: &str) -> Result<Vec<StatementView>> {
        let site = self.resolve_site(site_code).await?;
        let statements = self.store.list(Scope::Client { site_id: site.id }).await?;
        Ok(self.views(statements))
    }

    pub async fn create_client(
        &self,
        site_code: &str,
        header: StatementHeader,
    ) -> Result<StatementView> {
        let site = self.resolve_site(site_code).await?;
        let order = self
            .orders
            .base_order(site.id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("base order for site {}", site.code)))?;

        let statement = self
            .store
            .create(NewStatement {
                scope: Scope::Client { site_id: site.id },
                order_id: Some(order.id),
                header,
                templates: order.lines,
                anchor: None,
            })
            .await?;

        info!(
            statement_id = statement.id,
            "client statement #{} created on site {}",
            statement.sequence_number,
            site.code
        );
        Ok(self.view(statement))
    }

    pub async fn ensure_anchor(&self, site_code: &str) -> Result<StatementView> {
        let site = self.resolve_site(site_code).await?;
        let anchor = self.coordinator.ensure_client_anchor(site.id).await?;
        Ok(self.view(anchor))
    }

    pub async fn list_subcontractor(
        &self,
        site_code: &str,
        subcontractor_id: i64,
    ) -> Result<Vec<StatementView>> {
        let site = self.resolve_site(site_code).await?;
        let statements = self
            .coordinator
            .list_subcontractor(site.id, subcontractor_id)
            .await?;
        Ok(self.views(statements))
    }

    pub async fn create_subcontractor(
        &self,
        site_code: &str,
        subcontractor_id: i64,
        header: StatementHeader,
    ) -> Result<StatementView> {
        let site = self.resolve_site(site_code).await?;
        let statement = self
            .coordinator
            .create_subcontractor_statement(site.id, subcontractor_id, header)
            .await?;
        Ok(self.view(statement))
    }

    pub async fn get(&self, id: i64) -> Result<StatementView> {
        let statement = self.store.get(id).await?;
        Ok(self.view(statement))
    }

    pub async fn update_meta(&self, id: i64, patch: MetaPatch) -> Result<StatementView> {
        self.mutate(id, Mutation::UpdateMeta(patch)).await
    }

    pub async fn finalize(&self, id: i64) -> Result<StatementView> {
        let view = self.mutate(id, Mutation::Finalize).await?;
        info!(statement_id = id, "statement finalized");
        Ok(view)
    }

    pub async fn reopen(&self, id: i64) -> Result<StatementView> {
        if !self.allow_reopen {
            return Err(LedgerError::Unauthorized(
                "reopening finalized statements is disabled".to_string(),
            ));
        }
        let view = self.mutate(id, Mutation::Reopen).await?;
        info!(statement_id = id, "statement reopened");
        Ok(view)
    }

    pub async fn delete(&self, id: i64) -> Result<Statement> {
        let deleted = self.store.delete_tail(id).await?;
        info!(
            statement_id = id,
            "statement #{} of {} deleted",
            deleted.sequence_number,
            deleted.scope
        );
        Ok(deleted)
    }

    pub async fn update_line(
        &self,
        id: i64,
        line_id: i64,
        patch: FiguresPatch,
    ) -> Result<StatementView> {
        self.mutate(id, Mutation::UpdateLine { line_id, patch }).await
    }

    pub async fn delete_line(&self, id: i64, line_id: i64) -> Result<StatementView> {
        self.mutate(id, Mutation::DeleteLine { line_id }).await
    }

    pub async fn add_amendment(&self, id: i64, input: AmendmentInput) -> Result<StatementView> {
        self.mutate(id, Mutation::AddAmendment(input)).await
    }

    pub async fn update_amendment(
        &self,
        id: i64,
        amendment_id: i64,
        patch: AmendmentPatch,
    ) -> Result<StatementView> {
        self.mutate(
            id,
            Mutation::UpdateAmendment {
                amendment_id,
                patch,
            },
        )
        .await
    }

    pub async fn delete_amendment(&self, id: i64, amendment_id: i64) -> Result<StatementView> {
        self.mutate(id, Mutation::DeleteAmendment { amendment_id })
            .await
    }

    pub async fn export_csv(&self, id: i64) -> Result<String> {
        let view = self.get(id).await?;
        statement_to_csv(&view)
    }
}
