//! HTTP routes exercised with `oneshot` against the in-memory backend.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::IntoResponse,
    Router,
};
use common::{ledger, ledger_with, EARTHWORK_LINE, SITE, SUBCONTRACTOR};
use http_body_util::BodyExt;
use progress_billing::{api, LedgerError};
use serde_json::{json, Value};
use tower::util::ServiceExt;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn create_client_statement(app: &Router) -> i64 {
    let (status, body) = send_json(
        app,
        "POST",
        &format!("/api/sites/{}/statements", SITE),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let app = api::router(ledger());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn create_statement_returns_numbers_and_totals() {
    let app = api::router(ledger());

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/sites/{}/statements", SITE),
        Some(json!({ "billing_month": "2026-03", "comments": "Situation n°1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sequence_number"], 1);
    assert_eq!(body["track"], "client");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["finalized"], false);
    assert_eq!(body["billing_month"], "2026-03");
    assert_eq!(body["lines"][1]["unit_price"].as_f64(), Some(100.0));
    assert_eq!(body["lines"][0]["kind"], "TITLE");
    assert_eq!(body["totals"]["grand"]["total"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn line_patch_recomputes_amounts() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;
    let uri = format!("/api/statements/{}/lines/{}", id, EARTHWORK_LINE);

    let (status, body) = send_json(&app, "PATCH", &uri, Some(json!({ "current_qty": "4" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][1]["current_amount"].as_f64(), Some(400.0));

    let (_, body) = send_json(
        &app,
        "PATCH",
        &uri,
        Some(json!({ "precedent_qty": 4, "current_qty": 6 })),
    )
    .await;
    let line = &body["lines"][1];
    assert_eq!(line["total_qty"].as_f64(), Some(10.0));
    assert_eq!(line["current_amount"].as_f64(), Some(600.0));
    assert_eq!(line["total_amount"].as_f64(), Some(1000.0));
    assert_eq!(body["totals"]["grand"]["total"].as_f64(), Some(1000.0));
    assert_eq!(body["vat"]["gross"]["total"].as_f64(), Some(1200.0));
}

#[tokio::test]
async fn cent_amounts_come_back_exactly() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;

    let (status, bytes) = send(
        &app,
        "PATCH",
        &format!("/api/statements/{}/lines/{}", id, EARTHWORK_LINE),
        Some(json!({ "unit_price": "0,30", "current_qty": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("0.30000000000000004"));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["lines"][1]["current_amount"].to_string(), "0.3");
    assert_eq!(body["totals"]["grand"]["total"].to_string(), "0.3");
}

#[tokio::test]
async fn malformed_header_is_rejected() {
    let app = api::router(ledger());

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/sites/{}/statements", SITE),
        Some(json!({ "date": "not-a-date", "comments": "keep me" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sites/{}/subcontractors/{}/statements", SITE, SUBCONTRACTOR),
        Some(json!({ "comments": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listed) = send_json(
        &app,
        "GET",
        &format!("/api/sites/{}/statements", SITE),
        None,
    )
    .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_numbers_are_rejected() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/statements/{}/lines/{}", id, EARTHWORK_LINE),
        Some(json!({ "current_qty": "1e3000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn server_errors_keep_details_private() {
    let response = LedgerError::Database(sqlx::Error::PoolTimedOut).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn finalized_statement_answers_conflict() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;

    let (status, body) =
        send_json(&app, "POST", &format!("/api/statements/{}/finalize", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "finalized");
    assert!(body["finalized_at"].is_string());

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/statements/{}/lines/{}", id, EARTHWORK_LINE),
        Some(json!({ "current_qty": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("finalized"));

    let (status, _) = send(&app, "POST", &format!("/api/statements/{}/reopen", id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reopen_is_allowed_when_enabled() {
    let app = api::router(ledger_with(true));
    let id = create_client_statement(&app).await;
    send(&app, "POST", &format!("/api/statements/{}/finalize", id), None).await;

    let (status, body) =
        send_json(&app, "POST", &format!("/api/statements/{}/reopen", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["finalized"], false);
}

#[tokio::test]
async fn meta_patch_cannot_touch_the_lock() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/statements/{}", id),
        Some(json!({ "finalized": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/statements/{}", id),
        Some(json!({ "date": "2026-03-31", "comments": "Relu" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2026-03-31");
    assert_eq!(body["finalized"], false);
}

#[tokio::test]
async fn deleting_a_non_tail_statement_is_a_conflict() {
    let app = api::router(ledger());
    let first = create_client_statement(&app).await;
    let second = create_client_statement(&app).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/statements/{}", first), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "DELETE", &format!("/api/statements/{}", second), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/sites/{}/statements", SITE),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn amendments_round_trip_through_the_api() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;
    let uri = format!("/api/statements/{}/amendments", id);

    let (status, body) = send_json(
        &app,
        "POST",
        &uri,
        Some(json!({ "article": "TS-1", "unit_price": "1 000,00", "current_qty": 1.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amendments"][0]["id"], 1);
    assert_eq!(body["amendments"][0]["current_amount"].as_f64(), Some(1500.0));

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("{}/1", uri),
        Some(json!({ "current_qty": 2, "description": "Reprise" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amendments"][0]["description"], "Reprise");
    assert_eq!(body["totals"]["amendments"]["current"].as_f64(), Some(2000.0));

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(json!({ "article": "bad", "unit_price": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send_json(&app, "DELETE", &format!("{}/1", uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["amendments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn subcontractor_track_creates_its_anchor() {
    let app = api::router(ledger());
    let uri = format!("/api/sites/{}/subcontractors/{}/statements", SITE, SUBCONTRACTOR);

    let (status, body) = send_json(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["track"], "subcontractor");
    assert_eq!(body["subcontractor_id"], SUBCONTRACTOR);
    assert_eq!(body["sequence_number"], 1);
    let anchor_id = body["anchor_statement_id"].as_i64().unwrap();

    let (_, clients) = send_json(
        &app,
        "GET",
        &format!("/api/sites/{}/statements", SITE),
        None,
    )
    .await;
    assert_eq!(clients.as_array().unwrap().len(), 1);
    assert_eq!(clients[0]["id"].as_i64(), Some(anchor_id));

    let (status, anchor) =
        send_json(&app, "POST", &format!("/api/sites/{}/anchor", SITE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchor["id"].as_i64(), Some(anchor_id));

    let (_, subs) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(subs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_resources_answer_not_found() {
    let app = api::router(ledger());

    let (status, body) = send_json(&app, "GET", "/api/sites/NOPE/statements", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/api/statements/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sites/{}/subcontractors/99/statements", SITE),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn statement_exports_as_csv() {
    let app = api::router(ledger());
    let id = create_client_statement(&app).await;

    let request = Request::builder()
        .uri(format!("/api/statements/{}/export.csv", id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("section,id,article"));
    assert!(csv.contains("subtotal,,,grand"));
}
