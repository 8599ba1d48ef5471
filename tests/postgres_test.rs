//! PostgreSQL store round trip. Needs a database reachable at `DATABASE_URL`.

use bigdecimal::BigDecimal;
use progress_billing::config::{DatabaseConfig, LedgerConfig};
use progress_billing::db::{create_pool, run_migrations, PgStore};
use progress_billing::models::{FiguresPatch, StatementHeader};
use progress_billing::{LedgerError, LedgerService};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

async fn seed_site(pool: &PgPool, code: &str) -> i64 {
    let site_id: i64 = sqlx::query_scalar("INSERT INTO sites (code, name) VALUES ($1, $2) RETURNING id")
        .bind(code)
        .bind("Test site")
        .fetch_one(pool)
        .await
        .unwrap();
    let order_id: i64 = sqlx::query_scalar("INSERT INTO base_orders (site_id) VALUES ($1) RETURNING id")
        .bind(site_id)
        .fetch_one(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO base_order_lines (base_order_id, position, article, description, kind, unit, unit_price, quantity) \
         VALUES ($1, 1, '1', 'Lot 1', 'TITLE', '', 0, 0), \
                ($1, 2, '1.1', 'Terrassement', 'STANDARD', 'm3', 100, 10)",
    )
    .bind(order_id)
    .execute(pool)
    .await
    .unwrap();
    site_id
}

#[tokio::test]
#[ignore = "Requires PostgreSQL at DATABASE_URL"]
async fn postgres_store_round_trip() {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        max_connections: 5,
        run_migrations: true,
    };
    let pool = create_pool(&config).await.expect("Failed to connect");
    run_migrations(&pool).await.expect("Failed to migrate");

    let code = format!("PG-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
    seed_site(&pool, &code).await;

    let store = Arc::new(PgStore::new(pool));
    let ledger = LedgerService::new(
        store.clone(),
        store,
        &LedgerConfig {
            vat_rate: 20.0,
            allow_reopen: false,
        },
    );

    let first = ledger
        .create_client(&code, StatementHeader::default())
        .await
        .unwrap();
    let second = ledger
        .create_client(&code, StatementHeader::default())
        .await
        .unwrap();
    assert_eq!(first.statement.sequence_number, 1);
    assert_eq!(second.statement.sequence_number, 2);
    assert_eq!(second.statement.lines.len(), 2);

    let patch: FiguresPatch =
        serde_json::from_value(json!({ "precedent_qty": 4, "current_qty": 6 })).unwrap();
    let view = ledger
        .update_line(second.statement.id, 2, patch)
        .await
        .unwrap();
    assert_eq!(view.totals.grand.total, BigDecimal::from(1000));

    ledger.finalize(second.statement.id).await.unwrap();
    let stored = ledger.get(second.statement.id).await.unwrap();
    assert!(stored.finalized);
    assert_eq!(stored.statement.version, 2);
    assert_eq!(stored.totals.grand.total, BigDecimal::from(1000));

    assert!(matches!(
        ledger.delete(first.statement.id).await,
        Err(LedgerError::Conflict(_))
    ));
    ledger.delete(second.statement.id).await.unwrap();
    ledger.delete(first.statement.id).await.unwrap();
}
