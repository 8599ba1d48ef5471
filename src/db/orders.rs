use crate::models::{BaseOrder, LineKind, LineTemplate, Site, SubcontractOrder};
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
struct TemplateRow {
    line_ref: i64,
    article: String,
    description: String,
    kind: String,
    unit: String,
    unit_price: BigDecimal,
    quantity: BigDecimal,
}

impl From<TemplateRow> for LineTemplate {
    fn from(row: TemplateRow) -> Self {
        LineTemplate {
            line_ref: row.line_ref,
            article: row.article,
            description: row.description,
            kind: LineKind::from_string(&row.kind),
            unit: row.unit,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// Site by its human-readable code
pub async fn get_site_by_code(pool: &PgPool, code: &str) -> Result<Option<Site>, sqlx::Error> {
    sqlx::query_as::<_, Site>(
        r#"
        SELECT id, code, name
        FROM sites
        WHERE code = $1
        "#
    )
    .bind(code)
    .fetch_optional(pool)
    .await
}

/// Latest base order of a site, with its lines in document order
pub async fn get_base_order(pool: &PgPool, site_id: i64) -> Result<Option<BaseOrder>, sqlx::Error> {
    let order_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM base_orders
        WHERE site_id = $1
        ORDER BY id DESC
        LIMIT 1
        "#
    )
    .bind(site_id)
    .fetch_optional(pool)
    .await?;

    let Some(order_id) = order_id else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id as line_ref, article, description, kind, unit, unit_price, quantity
        FROM base_order_lines
        WHERE base_order_id = $1
        ORDER BY position, id
        "#
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(BaseOrder {
        id: order_id,
        site_id,
        lines: lines.into_iter().map(LineTemplate::from).collect(),
    }))
}

/// Latest subcontract order of a subcontractor on a site, with its lines
pub async fn get_subcontract_order(
    pool: &PgPool,
    site_id: i64,
    subcontractor_id: i64,
) -> Result<Option<SubcontractOrder>, sqlx::Error> {
    let order_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM subcontract_orders
        WHERE site_id = $1
          AND subcontractor_id = $2
        ORDER BY id DESC
        LIMIT 1
        "#
    )
    .bind(site_id)
    .bind(subcontractor_id)
    .fetch_optional(pool)
    .await?;

    let Some(order_id) = order_id else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id as line_ref, article, description, kind, unit, unit_price, quantity
        FROM subcontract_order_lines
        WHERE subcontract_order_id = $1
        ORDER BY position, id
        "#
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(SubcontractOrder {
        id: order_id,
        site_id,
        subcontractor_id,
        lines: lines.into_iter().map(LineTemplate::from).collect(),
    }))
}
