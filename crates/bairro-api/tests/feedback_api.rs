mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::test_app;

async fn seeded() -> (common::TestApp, String, i64) {
    let app = test_app();
    let author = app.register("autor").await;
    let report = app.submit(&author, "Poste apagado", "TAQUARA", "CENTRO").await;
    let id = report.body["id"].as_i64().unwrap();
    let voter = app.register("ana").await;
    (app, voter, id)
}

#[tokio::test]
async fn same_vote_twice_counts_once() {
    let (app, voter, id) = seeded().await;
    let uri = format!("/reports/{id}/feedback");

    let res = app.post(&uri, json!({"vote": "UP"}), Some(&voter)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["votes"], 1);

    let res = app.post(&uri, json!({"vote": "UP"}), Some(&voter)).await;
    assert_eq!(res.body["votes"], 1);
}

#[tokio::test]
async fn opposite_vote_replaces_previous() {
    let (app, voter, id) = seeded().await;
    let uri = format!("/reports/{id}/feedback");

    app.post(&uri, json!({"vote": "UP"}), Some(&voter)).await;
    let res = app.post(&uri, json!({"vote": "DOWN"}), Some(&voter)).await;
    assert_eq!(res.body["votes"], -1);

    let report = app.get(&format!("/reports/{id}")).await;
    assert_eq!(report.body["votes"], -1);
}

#[tokio::test]
async fn unknown_vote_value_is_rejected() {
    let (app, voter, id) = seeded().await;
    let res = app
        .post(&format!("/reports/{id}/feedback"), json!({"vote": "MAYBE"}), Some(&voter))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_fields(), ["vote"]);
}

#[tokio::test]
async fn voting_on_missing_report_is_not_found() {
    let (app, voter, _) = seeded().await;
    let res = app
        .post("/reports/424242/feedback", json!({"vote": "UP"}), Some(&voter))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voting_requires_a_session() {
    let (app, _, id) = seeded().await;
    let res = app
        .post(&format!("/reports/{id}/feedback"), json!({"vote": "UP"}), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
