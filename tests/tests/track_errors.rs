//! Validation behavior at the ingestion boundary.
//!
//! Rejected envelopes must never be persisted or aggregated.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::{json, Value};

async fn post_and_expect(ctx: &TestContext, event: &Value, code: &str) {
    let response = ctx
        .server
        .post("/analytics/track-event")
        .json(event)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], code, "unexpected error body: {body}");
}

#[tokio::test]
async fn missing_tenant_is_rejected() {
    let ctx = TestContext::new().await;
    let mut event = fixtures::page_view(7, "S1", "/forum");
    event.as_object_mut().unwrap().remove("tenantId");
    post_and_expect(&ctx, &event, "MISSING_FIELD").await;
}

#[tokio::test]
async fn non_positive_tenant_is_rejected() {
    let ctx = TestContext::new().await;
    let event = fixtures::page_view(0, "S1", "/forum");
    post_and_expect(&ctx, &event, "INVALID_TENANT").await;
}

#[tokio::test]
async fn missing_event_type_is_rejected() {
    let ctx = TestContext::new().await;
    let mut event = fixtures::page_view(7, "S1", "/forum");
    event.as_object_mut().unwrap().remove("eventType");
    post_and_expect(&ctx, &event, "MISSING_FIELD").await;
}

#[tokio::test]
async fn malformed_timestamp_is_rejected_and_not_persisted() {
    let ctx = TestContext::new().await;
    let mut event = fixtures::page_view(99, "S1", "/forum");
    event["timestamp"] = json!("yesterday-ish");
    post_and_expect(&ctx, &event, "VALIDATION").await;

    assert_eq!(ctx.store.count_raw_events(99).await.unwrap(), 0);
}

#[tokio::test]
async fn far_future_timestamp_is_rejected() {
    let ctx = TestContext::new().await;
    let mut event = fixtures::page_view(7, "S1", "/forum");
    event["timestamp"] = json!("2031-01-01T00:00:00Z");
    post_and_expect(&ctx, &event, "VALIDATION").await;
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-event")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let ctx = TestContext::new().await;
    // 40KB of padding exceeds the 32KB envelope limit.
    let mut event = fixtures::page_view(7, "S1", "/forum");
    event["padding"] = json!("x".repeat(40 * 1024));

    let response = ctx
        .server
        .post("/analytics/track-event")
        .json(&event)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_event_id_is_rejected() {
    let ctx = TestContext::new().await;
    let mut event = fixtures::page_view(7, "S1", "/forum");
    event["eventId"] = json!("not-a-uuid");
    post_and_expect(&ctx, &event, "VALIDATION").await;
}

#[tokio::test]
async fn direct_engagement_delta_requires_valid_tenant() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-user-engagement")
        .json(&json!({
            "tenantId": 0,
            "date": fixtures::EVENT_DAY,
            "pageViews": 1
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_TENANT");
}

#[tokio::test]
async fn negative_engagement_delta_is_rejected_and_not_stored() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-user-engagement")
        .json(&json!({
            "tenantId": 31,
            "date": fixtures::EVENT_DAY,
            "pageViews": -5,
            "bounceSessions": -3,
            "endedSessions": 2
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION");

    // Counters never went backwards and no ratio went negative.
    let report = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 31)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    let report: Value = report.json();
    assert_eq!(report["summary"]["page_views"], 0);
    assert_eq!(report["summary"]["bounce_rate"], 0.0);
}

#[tokio::test]
async fn negative_content_delta_is_rejected() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-content-performance")
        .json(&json!({
            "tenantId": 31,
            "contentType": "post",
            "contentId": 1,
            "scoreDate": fixtures::EVENT_DAY,
            "impressions": -10
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn negative_keyword_counters_are_rejected() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-keyword-ranking")
        .json(&json!({
            "keywordId": 3,
            "date": fixtures::EVENT_DAY,
            "location": "us",
            "position": 4.0,
            "clicks": -2
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn direct_content_delta_requires_content_type() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-content-performance")
        .json(&json!({
            "tenantId": 7,
            "contentType": "  ",
            "contentId": 1,
            "scoreDate": fixtures::EVENT_DAY,
            "impressions": 1
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn keyword_sample_requires_positive_position() {
    let ctx = TestContext::new().await;
    let response = ctx
        .server
        .post("/analytics/track-keyword-ranking")
        .json(&json!({
            "keywordId": 3,
            "date": fixtures::EVENT_DAY,
            "location": "us",
            "position": 0.0
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION");
}
