//! SQL for the statement tables. Every function runs on the caller's
//! connection so the store can group them into one transaction.

use crate::models::{
    Amendment, LineFigures, LineItem, LineKind, Scope, Statement, StatementState,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;

/// Rows per multi-row INSERT
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone, FromRow)]
pub struct StatementRow {
    pub id: i64,
    pub site_id: i64,
    pub subcontractor_id: Option<i64>,
    pub sequence_number: i32,
    pub order_id: Option<i64>,
    pub anchor_statement_id: Option<i64>,
    pub finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub statement_date: NaiveDate,
    pub billing_month: Option<String>,
    pub comments: Option<String>,
    pub next_amendment_id: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LineRow {
    pub statement_id: i64,
    pub line_id: i64,
    pub line_ref: i64,
    pub article: String,
    pub description: String,
    pub kind: String,
    pub unit: String,
    pub unit_price: BigDecimal,
    pub precedent_qty: BigDecimal,
    pub current_qty: BigDecimal,
    pub total_qty: BigDecimal,
    pub precedent_amount: BigDecimal,
    pub current_amount: BigDecimal,
    pub total_amount: BigDecimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct AmendmentRow {
    pub statement_id: i64,
    pub amendment_id: i64,
    pub article: String,
    pub description: String,
    pub kind: String,
    pub unit: String,
    pub unit_price: BigDecimal,
    pub precedent_qty: BigDecimal,
    pub current_qty: BigDecimal,
    pub total_qty: BigDecimal,
    pub precedent_amount: BigDecimal,
    pub current_amount: BigDecimal,
    pub total_amount: BigDecimal,
}

impl From<LineRow> for LineItem {
    fn from(row: LineRow) -> Self {
        LineItem {
            id: row.line_id,
            line_ref: row.line_ref,
            article: row.article,
            description: row.description,
            kind: LineKind::from_string(&row.kind),
            unit: row.unit,
            figures: LineFigures {
                unit_price: row.unit_price,
                precedent_qty: row.precedent_qty,
                current_qty: row.current_qty,
                total_qty: row.total_qty,
                precedent_amount: row.precedent_amount,
                current_amount: row.current_amount,
                total_amount: row.total_amount,
            },
        }
    }
}

impl From<AmendmentRow> for Amendment {
    fn from(row: AmendmentRow) -> Self {
        Amendment {
            id: row.amendment_id,
            article: row.article,
            description: row.description,
            kind: LineKind::from_string(&row.kind),
            unit: row.unit,
            figures: LineFigures {
                unit_price: row.unit_price,
                precedent_qty: row.precedent_qty,
                current_qty: row.current_qty,
                total_qty: row.total_qty,
                precedent_amount: row.precedent_amount,
                current_amount: row.current_amount,
                total_amount: row.total_amount,
            },
        }
    }
}

impl StatementRow {
    pub fn into_statement(self, lines: Vec<LineItem>, amendments: Vec<Amendment>) -> Statement {
        let state = match (self.finalized, self.finalized_at) {
            (true, Some(finalized_at)) => StatementState::Finalized { finalized_at },
            (true, None) => StatementState::Finalized {
                finalized_at: self.created_at,
            },
            (false, _) => StatementState::Draft,
        };

        Statement {
            id: self.id,
            scope: Scope::from_parts(self.site_id, self.subcontractor_id),
            sequence_number: self.sequence_number,
            order_id: self.order_id,
            anchor_statement_id: self.anchor_statement_id,
            state,
            date: self.statement_date,
            billing_month: self.billing_month,
            comments: self.comments,
            lines,
            amendments,
            next_amendment_id: self.next_amendment_id,
            version: self.version,
            created_at: self.created_at,
        }
    }
}

const STATEMENT_COLUMNS: &str = "id, site_id, subcontractor_id, sequence_number, order_id, \
    anchor_statement_id, finalized, finalized_at, statement_date, billing_month, comments, \
    next_amendment_id, version, created_at";

/// Serializes creations and deletions within a scope until the transaction ends
pub async fn lock_scope(conn: &mut PgConnection, scope: &Scope) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(scope.lock_key())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Highest sequence number of a scope
pub async fn max_sequence(conn: &mut PgConnection, scope: &Scope) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i32>>(
        r#"
        SELECT MAX(sequence_number)
        FROM progress_statements
        WHERE site_id = $1
          AND subcontractor_id IS NOT DISTINCT FROM $2
        "#
    )
    .bind(scope.site_id())
    .bind(scope.subcontractor_id())
    .fetch_one(&mut *conn)
    .await
}

/// Statement header, optionally locked for update
pub async fn get_statement_row(
    conn: &mut PgConnection,
    id: i64,
    for_update: bool,
) -> Result<Option<StatementRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM progress_statements WHERE id = $1{}",
        STATEMENT_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, StatementRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Statement headers of a scope, by sequence number
pub async fn list_statement_rows(
    conn: &mut PgConnection,
    scope: &Scope,
) -> Result<Vec<StatementRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM progress_statements \
         WHERE site_id = $1 AND subcontractor_id IS NOT DISTINCT FROM $2 \
         ORDER BY sequence_number",
        STATEMENT_COLUMNS
    );
    sqlx::query_as::<_, StatementRow>(&sql)
        .bind(scope.site_id())
        .bind(scope.subcontractor_id())
        .fetch_all(&mut *conn)
        .await
}

/// Latest client statement of a site
pub async fn latest_client_statement_row(
    conn: &mut PgConnection,
    site_id: i64,
) -> Result<Option<StatementRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM progress_statements \
         WHERE site_id = $1 AND subcontractor_id IS NULL \
         ORDER BY sequence_number DESC LIMIT 1",
        STATEMENT_COLUMNS
    );
    sqlx::query_as::<_, StatementRow>(&sql)
        .bind(site_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Lines of several statements, ordered by statement then line id
pub async fn list_lines(
    conn: &mut PgConnection,
    statement_ids: &[i64],
) -> Result<Vec<LineRow>, sqlx::Error> {
    sqlx::query_as::<_, LineRow>(
        r#"
        SELECT statement_id, line_id, line_ref, article, description, kind, unit,
               unit_price, precedent_qty, current_qty, total_qty,
               precedent_amount, current_amount, total_amount
        FROM statement_lines
        WHERE statement_id = ANY($1)
        ORDER BY statement_id, line_id
        "#
    )
    .bind(statement_ids)
    .fetch_all(&mut *conn)
    .await
}

/// Amendments of several statements, ordered by statement then amendment id
pub async fn list_amendments(
    conn: &mut PgConnection,
    statement_ids: &[i64],
) -> Result<Vec<AmendmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AmendmentRow>(
        r#"
        SELECT statement_id, amendment_id, article, description, kind, unit,
               unit_price, precedent_qty, current_qty, total_qty,
               precedent_amount, current_amount, total_amount
        FROM statement_amendments
        WHERE statement_id = ANY($1)
        ORDER BY statement_id, amendment_id
        "#
    )
    .bind(statement_ids)
    .fetch_all(&mut *conn)
    .await
}

/// Attaches lines and amendments to their headers
pub async fn hydrate(
    conn: &mut PgConnection,
    rows: Vec<StatementRow>,
) -> Result<Vec<Statement>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut lines: HashMap<i64, Vec<LineItem>> = HashMap::new();
    for row in list_lines(conn, &ids).await? {
        lines.entry(row.statement_id).or_default().push(row.into());
    }
    let mut amendments: HashMap<i64, Vec<Amendment>> = HashMap::new();
    for row in list_amendments(conn, &ids).await? {
        amendments.entry(row.statement_id).or_default().push(row.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.into_statement(
                lines.remove(&id).unwrap_or_default(),
                amendments.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

/// Inserts a statement header and returns its generated id
pub async fn insert_statement(
    conn: &mut PgConnection,
    statement: &Statement,
) -> Result<i64, sqlx::Error> {
    let (finalized, finalized_at) = state_columns(&statement.state);
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO progress_statements (
            site_id, subcontractor_id, sequence_number, order_id, anchor_statement_id,
            finalized, finalized_at, statement_date, billing_month, comments,
            next_amendment_id, version, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING id
        "#
    )
    .bind(statement.scope.site_id())
    .bind(statement.scope.subcontractor_id())
    .bind(statement.sequence_number)
    .bind(statement.order_id)
    .bind(statement.anchor_statement_id)
    .bind(finalized)
    .bind(finalized_at)
    .bind(statement.date)
    .bind(&statement.billing_month)
    .bind(&statement.comments)
    .bind(statement.next_amendment_id)
    .bind(statement.version)
    .bind(statement.created_at)
    .fetch_one(&mut *conn)
    .await
}

/// Writes the header back, guarded by the version read at the start of the
/// transaction. Returns the number of rows updated (0 on a lost update).
pub async fn update_statement_header(
    conn: &mut PgConnection,
    statement: &Statement,
    expected_version: i64,
) -> Result<u64, sqlx::Error> {
    let (finalized, finalized_at) = state_columns(&statement.state);
    let result = sqlx::query(
        r#"
        UPDATE progress_statements
        SET finalized = $1,
            finalized_at = $2,
            statement_date = $3,
            billing_month = $4,
            comments = $5,
            next_amendment_id = $6,
            version = $7
        WHERE id = $8 AND version = $9
        "#
    )
    .bind(finalized)
    .bind(finalized_at)
    .bind(statement.date)
    .bind(&statement.billing_month)
    .bind(&statement.comments)
    .bind(statement.next_amendment_id)
    .bind(statement.version)
    .bind(statement.id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

fn state_columns(state: &StatementState) -> (bool, Option<DateTime<Utc>>) {
    match state {
        StatementState::Draft => (false, None),
        StatementState::Finalized { finalized_at } => (true, Some(*finalized_at)),
    }
}

/// Batch insert of statement lines
pub async fn insert_lines(
    conn: &mut PgConnection,
    statement_id: i64,
    lines: &[LineItem],
) -> Result<(), sqlx::Error> {
    if lines.is_empty() {
        return Ok(());
    }

    let start_time = std::time::Instant::now();
    for chunk in lines.chunks(INSERT_CHUNK) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO statement_lines (
                statement_id, line_id, line_ref, article, description, kind, unit,
                unit_price, precedent_qty, current_qty, total_qty,
                precedent_amount, current_amount, total_amount
            ) "
        );

        query_builder.push_values(chunk, |mut b, line| {
            b.push_bind(statement_id)
                .push_bind(line.id)
                .push_bind(line.line_ref)
                .push_bind(&line.article)
                .push_bind(&line.description)
                .push_bind(line.kind.as_str())
                .push_bind(&line.unit)
                .push_bind(line.figures.unit_price.clone())
                .push_bind(line.figures.precedent_qty.clone())
                .push_bind(line.figures.current_qty.clone())
                .push_bind(line.figures.total_qty.clone())
                .push_bind(line.figures.precedent_amount.clone())
                .push_bind(line.figures.current_amount.clone())
                .push_bind(line.figures.total_amount.clone());
        });

        query_builder.build().execute(&mut *conn).await?;
    }

    tracing::debug!(
        "inserted {} lines for statement {} in {:?}",
        lines.len(),
        statement_id,
        start_time.elapsed()
    );
    Ok(())
}

/// Insert-or-replace of one statement line
pub async fn upsert_line(
    conn: &mut PgConnection,
    statement_id: i64,
    line: &LineItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO statement_lines (
            statement_id, line_id, line_ref, article, description, kind, unit,
            unit_price, precedent_qty, current_qty, total_qty,
            precedent_amount, current_amount, total_amount
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (statement_id, line_id) DO UPDATE
        SET unit_price = EXCLUDED.unit_price,
            precedent_qty = EXCLUDED.precedent_qty,
            current_qty = EXCLUDED.current_qty,
            total_qty = EXCLUDED.total_qty,
            precedent_amount = EXCLUDED.precedent_amount,
            current_amount = EXCLUDED.current_amount,
            total_amount = EXCLUDED.total_amount
        "#
    )
    .bind(statement_id)
    .bind(line.id)
    .bind(line.line_ref)
    .bind(&line.article)
    .bind(&line.description)
    .bind(line.kind.as_str())
    .bind(&line.unit)
    .bind(&line.figures.unit_price)
    .bind(&line.figures.precedent_qty)
    .bind(&line.figures.current_qty)
    .bind(&line.figures.total_qty)
    .bind(&line.figures.precedent_amount)
    .bind(&line.figures.current_amount)
    .bind(&line.figures.total_amount)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_line(
    conn: &mut PgConnection,
    statement_id: i64,
    line_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM statement_lines WHERE statement_id = $1 AND line_id = $2")
        .bind(statement_id)
        .bind(line_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert-or-replace of one amendment
pub async fn upsert_amendment(
    conn: &mut PgConnection,
    statement_id: i64,
    amendment: &Amendment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO statement_amendments (
            statement_id, amendment_id, article, description, kind, unit,
            unit_price, precedent_qty, current_qty, total_qty,
            precedent_amount, current_amount, total_amount
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (statement_id, amendment_id) DO UPDATE
        SET article = EXCLUDED.article,
            description = EXCLUDED.description,
            kind = EXCLUDED.kind,
            unit = EXCLUDED.unit,
            unit_price = EXCLUDED.unit_price,
            precedent_qty = EXCLUDED.precedent_qty,
            current_qty = EXCLUDED.current_qty,
            total_qty = EXCLUDED.total_qty,
            precedent_amount = EXCLUDED.precedent_amount,
            current_amount = EXCLUDED.current_amount,
            total_amount = EXCLUDED.total_amount
        "#
    )
    .bind(statement_id)
    .bind(amendment.id)
    .bind(&amendment.article)
    .bind(&amendment.description)
    .bind(amendment.kind.as_str())
    .bind(&amendment.unit)
    .bind(&amendment.figures.unit_price)
    .bind(&amendment.figures.precedent_qty)
    .bind(&amendment.figures.current_qty)
    .bind(&amendment.figures.total_qty)
    .bind(&amendment.figures.precedent_amount)
    .bind(&amendment.figures.current_amount)
    .bind(&amendment.figures.total_amount)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_amendment(
    conn: &mut PgConnection,
    statement_id: i64,
    amendment_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM statement_amendments WHERE statement_id = $1 AND amendment_id = $2")
        .bind(statement_id)
        .bind(amendment_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Number of subcontractor statements anchored on a client statement
pub async fn count_anchored(conn: &mut PgConnection, statement_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM progress_statements WHERE anchor_statement_id = $1"
    )
    .bind(statement_id)
    .fetch_one(&mut *conn)
    .await
}

/// Deletes a statement; lines and amendments cascade
pub async fn delete_statement(conn: &mut PgConnection, statement_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM progress_statements WHERE id = $1")
        .bind(statement_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
