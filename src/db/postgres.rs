//! PostgreSQL backend. Each write is one transaction: scope creations and
//! deletions take an advisory lock on the scope, statement writes lock the
//! header row and re-check its version before committing.

use crate::db::{orders, queries, OrderSource, StatementStore};
use crate::error::{LedgerError, Result};
use crate::models::{
    AnchorSeed, BaseOrder, Change, LineTemplate, Mutation, NewStatement, Scope, Site,
    Statement, StatementHeader, SubcontractOrder,
};
use crate::service::ledger::{ensure_tail, next_sequence};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(conn: &mut PgConnection, id: i64, for_update: bool) -> Result<Statement> {
        let row = queries::get_statement_row(conn, id, for_update)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("statement {}", id)))?;
        let mut statements = queries::hydrate(conn, vec![row]).await?;
        statements
            .pop()
            .ok_or_else(|| LedgerError::Internal(format!("statement {} vanished", id)))
    }

    /// Appends a draft to a scope whose lock is already held.
    async fn append(
        conn: &mut PgConnection,
        scope: Scope,
        order_id: Option<i64>,
        anchor_statement_id: Option<i64>,
        header: StatementHeader,
        templates: &[LineTemplate],
    ) -> Result<Statement> {
        let sequence_number = next_sequence(queries::max_sequence(conn, &scope).await?);
        let mut statement = Statement::seed(
            0,
            scope,
            sequence_number,
            order_id,
            anchor_statement_id,
            header,
            templates,
            Utc::now(),
        );
        statement.id = queries::insert_statement(conn, &statement).await?;
        queries::insert_lines(conn, statement.id, &statement.lines).await?;

        tracing::info!(
            statement_id = statement.id,
            sequence_number,
            "created statement for {}",
            scope
        );
        Ok(statement)
    }

    async fn find_or_create_anchor(
        conn: &mut PgConnection,
        site_id: i64,
        seed: AnchorSeed,
    ) -> Result<Statement> {
        let client_scope = Scope::Client { site_id };
        queries::lock_scope(conn, &client_scope).await?;

        if let Some(row) = queries::latest_client_statement_row(conn, site_id).await? {
            let mut found = queries::hydrate(conn, vec![row]).await?;
            if let Some(anchor) = found.pop() {
                return Ok(anchor);
            }
        }

        tracing::info!(site_id, "creating client anchor statement");
        Self::append(
            conn,
            client_scope,
            seed.base_order_id,
            None,
            StatementHeader::default(),
            &seed.templates,
        )
        .await
    }

    async fn persist(
        conn: &mut PgConnection,
        statement: &Statement,
        change: Change,
        expected_version: i64,
    ) -> Result<()> {
        let updated = queries::update_statement_header(conn, statement, expected_version).await?;
        if updated == 0 {
            return Err(LedgerError::conflict(format!(
                "statement {} was modified concurrently",
                statement.id
            )));
        }

        match change {
            Change::Header => {}
            Change::LineUpserted(line_id) => {
                if let Some(line) = statement.lines.iter().find(|l| l.id == line_id) {
                    queries::upsert_line(conn, statement.id, line).await?;
                }
            }
            Change::LineRemoved(line_id) => {
                queries::delete_line(conn, statement.id, line_id).await?;
            }
            Change::AmendmentUpserted(amendment_id) => {
                if let Some(amendment) = statement.amendments.iter().find(|a| a.id == amendment_id)
                {
                    queries::upsert_amendment(conn, statement.id, amendment).await?;
                }
            }
            Change::AmendmentRemoved(amendment_id) => {
                queries::delete_amendment(conn, statement.id, amendment_id).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StatementStore for PgStore {
    async fn list(&self, scope: Scope) -> Result<Vec<Statement>> {
        let mut conn = self.pool.acquire().await?;
        let rows = queries::list_statement_rows(&mut conn, &scope).await?;
        Ok(queries::hydrate(&mut conn, rows).await?)
    }

    async fn get(&self, id: i64) -> Result<Statement> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, id, false).await
    }

    async fn create(&self, draft: NewStatement) -> Result<Statement> {
        let mut tx = self.pool.begin().await?;

        let anchor_statement_id = match draft.scope {
            Scope::Client { .. } => None,
            Scope::Subcontractor { site_id, .. } => {
                let seed = draft.anchor.ok_or_else(|| {
                    LedgerError::Internal("subcontractor statement without anchor seed".into())
                })?;
                Some(Self::find_or_create_anchor(&mut tx, site_id, seed).await?.id)
            }
        };

        queries::lock_scope(&mut tx, &draft.scope).await?;
        let statement = Self::append(
            &mut tx,
            draft.scope,
            draft.order_id,
            anchor_statement_id,
            draft.header,
            &draft.templates,
        )
        .await?;

        tx.commit().await?;
        Ok(statement)
    }

    async fn ensure_client_anchor(&self, site_id: i64, seed: AnchorSeed) -> Result<Statement> {
        let mut tx = self.pool.begin().await?;
        let anchor = Self::find_or_create_anchor(&mut tx, site_id, seed).await?;
        tx.commit().await?;
        Ok(anchor)
    }

    async fn mutate(&self, id: i64, mutation: Mutation) -> Result<Statement> {
        let mut tx = self.pool.begin().await?;

        let mut statement = Self::load(&mut tx, id, true).await?;
        let expected_version = statement.version;
        let change = statement.apply(mutation, Utc::now())?;
        statement.version += 1;

        Self::persist(&mut tx, &statement, change, expected_version).await?;
        tx.commit().await?;

        tracing::debug!(statement_id = id, version = statement.version, ?change, "statement updated");
        Ok(statement)
    }

    async fn delete_tail(&self, id: i64) -> Result<Statement> {
        let mut tx = self.pool.begin().await?;

        let row = queries::get_statement_row(&mut tx, id, false)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("statement {}", id)))?;
        let scope = Scope::from_parts(row.site_id, row.subcontractor_id);
        queries::lock_scope(&mut tx, &scope).await?;

        // re-read under the scope lock
        let statement = Self::load(&mut tx, id, true).await?;
        ensure_tail(&statement, queries::max_sequence(&mut tx, &scope).await?)?;

        let anchored = queries::count_anchored(&mut tx, id).await?;
        if anchored > 0 {
            return Err(LedgerError::conflict(format!(
                "statement {} anchors {} subcontractor statement(s)",
                id, anchored
            )));
        }

        queries::delete_statement(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(statement_id = id, "deleted tail statement of {}", scope);
        Ok(statement)
    }
}

#[async_trait]
impl OrderSource for PgStore {
    async fn site_by_code(&self, code: &str) -> Result<Option<Site>> {
        Ok(orders::get_site_by_code(&self.pool, code).await?)
    }

    async fn base_order(&self, site_id: i64) -> Result<Option<BaseOrder>> {
        Ok(orders::get_base_order(&self.pool, site_id).await?)
    }

    async fn subcontract_order(
        &self,
        site_id: i64,
        subcontractor_id: i64,
    ) -> Result<Option<SubcontractOrder>> {
        Ok(orders::get_subcontract_order(&self.pool, site_id, subcontractor_id).await?)
    }
}
