//! Monitored cases, historical backfill, and the alert inbox.

mod common;

use axum::http::{Method, StatusCode};
use common::{bearer_for, bulletin_entry, cron_bearer, expect_status, send};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn cases_require_authentication(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = send(&app, Method::GET, "/api/v1/cases", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, Method::GET, "/api/v1/cases", Some("Bearer garbage"), None).await;
    let json = expect_status(response, StatusCode::UNAUTHORIZED).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_cases_are_rejected(pool: PgPool) {
    let user_id = common::seed_user(&pool, "ana@despacho.mx").await;
    let app = common::build_test_app(pool);
    let auth = bearer_for(user_id);

    for body in [
        json!({ "case_number": "sin numero" }),
        json!({ "court_name": "Juzgado Primero" }),
        json!({ "party_name": "Maria" }),
    ] {
        let response = send(&app, Method::POST, "/api/v1/cases", Some(&auth), Some(body)).await;
        let json = expect_status(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    let list = send(&app, Method::GET, "/api/v1/cases", Some(&auth), None).await;
    let json = expect_status(list, StatusCode::OK).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn history_check_creates_alerts_once_and_inbox_tracks_reads(pool: PgPool) {
    let user_id = common::seed_user(&pool, "ana@despacho.mx").await;
    let app = common::build_test_app(pool);
    let auth = bearer_for(user_id);

    let ingest = send(
        &app,
        Method::POST,
        "/api/v1/cron/bulletins",
        Some(&cron_bearer()),
        Some(json!({ "entries": [
            bulletin_entry("2025-02-03", "Juzgado Cuarto Civil", "", "MARIA LOPEZ HERNANDEZ vs BANCO DEL NORTE"),
            bulletin_entry("2025-02-04", "Juzgado Cuarto Civil", "", "PEDRO RUIZ vs INMOBILIARIA SUR"),
        ]})),
    )
    .await;
    assert_eq!(ingest.status(), StatusCode::OK);

    let created = send(
        &app,
        Method::POST,
        "/api/v1/cases",
        Some(&auth),
        Some(json!({ "party_name": "María López Hernández", "check_history": true })),
    )
    .await;
    let json = expect_status(created, StatusCode::CREATED).await;
    assert_eq!(json["data"]["historical"]["alerts_created"], 1);
    let case_id = json["data"]["id"].as_i64().unwrap();

    let recheck = send(
        &app,
        Method::POST,
        &format!("/api/v1/cases/{case_id}/historical-check"),
        Some(&auth),
        None,
    )
    .await;
    let json = expect_status(recheck, StatusCode::OK).await;
    assert_eq!(json["data"]["matches_found"], 1);
    assert_eq!(json["data"]["alerts_created"], 0);

    let alerts = send(&app, Method::GET, "/api/v1/alerts?unread_only=true", Some(&auth), None).await;
    let json = expect_status(alerts, StatusCode::OK).await;
    let list = json["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["bulletin_date"], "2025-02-03");
    let alert_id = list[0]["id"].as_i64().unwrap();

    let read_uri = format!("/api/v1/alerts/{alert_id}/read");
    let read = send(&app, Method::POST, &read_uri, Some(&auth), None).await;
    assert_eq!(read.status(), StatusCode::NO_CONTENT);
    let read_again = send(&app, Method::POST, &read_uri, Some(&auth), None).await;
    assert_eq!(read_again.status(), StatusCode::NOT_FOUND);

    let count = send(&app, Method::GET, "/api/v1/alerts/unread-count", Some(&auth), None).await;
    let json = expect_status(count, StatusCode::OK).await;
    assert_eq!(json["data"]["count"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn users_cannot_touch_each_others_cases(pool: PgPool) {
    let owner = common::seed_user(&pool, "ana@despacho.mx").await;
    let other = common::seed_user(&pool, "luis@despacho.mx").await;
    let app = common::build_test_app(pool);

    let created = send(
        &app,
        Method::POST,
        "/api/v1/cases",
        Some(&bearer_for(owner)),
        Some(json!({ "case_number": "17/2025", "court_name": "Juzgado Primero Civil" })),
    )
    .await;
    let json = expect_status(created, StatusCode::CREATED).await;
    assert_eq!(json["data"]["case_key"], "17/2025");
    assert!(json["data"].get("historical").is_none());
    let uri = format!("/api/v1/cases/{}", json["data"]["id"]);

    let history = send(
        &app,
        Method::POST,
        &format!("{uri}/historical-check"),
        Some(&bearer_for(other)),
        None,
    )
    .await;
    assert_eq!(history.status(), StatusCode::NOT_FOUND);

    let foreign = send(&app, Method::DELETE, &uri, Some(&bearer_for(other)), None).await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let own = send(&app, Method::DELETE, &uri, Some(&bearer_for(owner)), None).await;
    assert_eq!(own.status(), StatusCode::NO_CONTENT);
}
