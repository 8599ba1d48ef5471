pub mod handlers;

pub use handlers::*;

use crate::service::LedgerService;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// HTTP routes of the ledger
pub fn router(service: Arc<LedgerService>) -> Router {
    let site_routes = Router::new()
        .route(
            "/api/sites/:code/statements",
            get(list_client_statements).post(create_client_statement),
        )
        .route("/api/sites/:code/anchor", post(ensure_client_anchor))
        .route(
            "/api/sites/:code/subcontractors/:sub/statements",
            get(list_subcontractor_statements).post(create_subcontractor_statement),
        );

    let statement_routes = Router::new()
        .route(
            "/api/statements/:id",
            get(get_statement)
                .patch(update_statement)
                .delete(delete_statement),
        )
        .route("/api/statements/:id/finalize", post(finalize_statement))
        .route("/api/statements/:id/reopen", post(reopen_statement))
        .route(
            "/api/statements/:id/lines/:line_id",
            patch(update_line).delete(delete_line),
        )
        .route("/api/statements/:id/amendments", post(add_amendment))
        .route(
            "/api/statements/:id/amendments/:amendment_id",
            patch(update_amendment).delete(delete_amendment),
        )
        .route("/api/statements/:id/export.csv", get(export_statement_csv));

    Router::new()
        .route("/health", get(health_check))
        .merge(site_routes)
        .merge(statement_routes)
        .with_state(service)
}
