use crate::error::LedgerError;
use crate::models::{
    AmendmentInput, AmendmentPatch, FiguresPatch, MetaPatch, Statement, StatementHeader,
    StatementView,
};
use crate::service::LedgerService;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

type Ledger = State<Arc<LedgerService>>;
type ApiResult<T> = Result<Json<T>, LedgerError>;

/// A request without a JSON body gets the default header; a malformed one is rejected.
fn header_or_default(
    body: Result<Json<StatementHeader>, JsonRejection>,
) -> Result<StatementHeader, LedgerError> {
    match body {
        Ok(Json(header)) => Ok(header),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(StatementHeader::default()),
        Err(rejection) => Err(LedgerError::validation(rejection.body_text())),
    }
}

/// Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// Client statements of a site, by sequence
pub async fn list_client_statements(
    State(service): Ledger,
    Path(code): Path<String>,
) -> ApiResult<Vec<StatementView>> {
    Ok(Json(service.list_client(&code).await?))
}

/// Next client statement, seeded from the base order
pub async fn create_client_statement(
    State(service): Ledger,
    Path(code): Path<String>,
    body: Result<Json<StatementHeader>, JsonRejection>,
) -> ApiResult<StatementView> {
    let view = service
        .create_client(&code, header_or_default(body)?)
        .await?;
    Ok(Json(view))
}

/// Latest client statement, created if the site has none
pub async fn ensure_client_anchor(
    State(service): Ledger,
    Path(code): Path<String>,
) -> ApiResult<StatementView> {
    Ok(Json(service.ensure_anchor(&code).await?))
}

pub async fn list_subcontractor_statements(
    State(service): Ledger,
    Path((code, subcontractor_id)): Path<(String, i64)>,
) -> ApiResult<Vec<StatementView>> {
    Ok(Json(
        service.list_subcontractor(&code, subcontractor_id).await?,
    ))
}

/// Next subcontractor statement
pub async fn create_subcontractor_statement(
    State(service): Ledger,
    Path((code, subcontractor_id)): Path<(String, i64)>,
    body: Result<Json<StatementHeader>, JsonRejection>,
) -> ApiResult<StatementView> {
    let view = service
        .create_subcontractor(&code, subcontractor_id, header_or_default(body)?)
        .await?;
    Ok(Json(view))
}

pub async fn get_statement(State(service): Ledger, Path(id): Path<i64>) -> ApiResult<StatementView> {
    Ok(Json(service.get(id).await?))
}

pub async fn update_statement(
    State(service): Ledger,
    Path(id): Path<i64>,
    Json(patch): Json<MetaPatch>,
) -> ApiResult<StatementView> {
    Ok(Json(service.update_meta(id, patch).await?))
}

/// Deletes the tail of its track
pub async fn delete_statement(State(service): Ledger, Path(id): Path<i64>) -> ApiResult<Statement> {
    Ok(Json(service.delete(id).await?))
}

pub async fn finalize_statement(
    State(service): Ledger,
    Path(id): Path<i64>,
) -> ApiResult<StatementView> {
    Ok(Json(service.finalize(id).await?))
}

/// Only when `ledger.allow_reopen` is set
pub async fn reopen_statement(
    State(service): Ledger,
    Path(id): Path<i64>,
) -> ApiResult<StatementView> {
    Ok(Json(service.reopen(id).await?))
}

pub async fn update_line(
    State(service): Ledger,
    Path((id, line_id)): Path<(i64, i64)>,
    Json(patch): Json<FiguresPatch>,
) -> ApiResult<StatementView> {
    Ok(Json(service.update_line(id, line_id, patch).await?))
}

pub async fn delete_line(
    State(service): Ledger,
    Path((id, line_id)): Path<(i64, i64)>,
) -> ApiResult<StatementView> {
    Ok(Json(service.delete_line(id, line_id).await?))
}

pub async fn add_amendment(
    State(service): Ledger,
    Path(id): Path<i64>,
    Json(input): Json<AmendmentInput>,
) -> ApiResult<StatementView> {
    Ok(Json(service.add_amendment(id, input).await?))
}

pub async fn update_amendment(
    State(service): Ledger,
    Path((id, amendment_id)): Path<(i64, i64)>,
    Json(patch): Json<AmendmentPatch>,
) -> ApiResult<StatementView> {
    Ok(Json(service.update_amendment(id, amendment_id, patch).await?))
}

pub async fn delete_amendment(
    State(service): Ledger,
    Path((id, amendment_id)): Path<(i64, i64)>,
) -> ApiResult<StatementView> {
    Ok(Json(service.delete_amendment(id, amendment_id).await?))
}

/// Statement as CSV, whatever its state
pub async fn export_statement_csv(
    State(service): Ledger,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, LedgerError> {
    let csv = service.export_csv(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"statement-{}.csv\"", id),
            ),
        ],
        csv,
    ))
}
