//! Reporting endpoint tests, including the full funnel flow.

use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;

#[tokio::test]
async fn funnel_traversal_produces_a_day_report() {
    let ctx = TestContext::new().await;
    ctx.seed_funnel(&fixtures::signup_funnel(7, 1)).await;

    // Session A walks the whole funnel, converting 300 seconds after
    // entering. Session B only visits.
    let events = [
        fixtures::action_click(7, "A", Some("visit"), None, &fixtures::ts(12, 0, 0)),
        fixtures::action_click(7, "A", Some("sign_up"), None, &fixtures::ts(12, 1, 0)),
        fixtures::action_click(7, "A", None, Some("purchase"), &fixtures::ts(12, 5, 0)),
        fixtures::action_click(7, "B", Some("visit"), None, &fixtures::ts(12, 2, 0)),
    ];
    for event in events {
        ctx.server
            .post("/analytics/track-event")
            .json(&event)
            .await
            .assert_status_ok();
    }

    let report = ctx
        .server
        .get("/reports/funnel/1")
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    report.assert_status_ok();
    let report: Value = report.json();

    assert_eq!(report["funnel_id"], 1);
    assert_eq!(report["name"], "signup");
    assert_eq!(
        report["steps"],
        serde_json::json!(["Visit", "SignUp", "Purchase"])
    );

    let days = report["days"].as_array().expect("days array");
    assert_eq!(days.len(), 1);
    let day = &days[0];
    assert_eq!(day["date"], fixtures::EVENT_DAY);
    assert_eq!(day["entrances"], 2);
    assert_eq!(day["completions"], 1);
    assert_eq!(day["step_counts"], serde_json::json!([2, 1, 1]));
    assert_eq!(day["drop_offs"], serde_json::json!([1, 0]));
    assert_eq!(day["conversion_rate"], 0.5);
    assert_eq!(day["avg_time_to_conversion_seconds"], 300.0);
}

#[tokio::test]
async fn replayed_funnel_steps_do_not_inflate_counts() {
    let ctx = TestContext::new().await;
    ctx.seed_funnel(&fixtures::signup_funnel(7, 1)).await;

    // The same session revisits the entrance and tries to skip ahead.
    let events = [
        fixtures::action_click(7, "A", Some("visit"), None, &fixtures::ts(12, 0, 0)),
        fixtures::action_click(7, "A", Some("visit"), None, &fixtures::ts(12, 0, 30)),
        fixtures::action_click(7, "A", None, Some("purchase"), &fixtures::ts(12, 1, 0)),
    ];
    for event in events {
        ctx.server
            .post("/analytics/track-event")
            .json(&event)
            .await
            .assert_status_ok();
    }

    let report = ctx
        .server
        .get("/reports/funnel/1")
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    let report: Value = report.json();

    let day = &report["days"][0];
    assert_eq!(day["entrances"], 1);
    assert_eq!(day["completions"], 0);
    assert_eq!(day["step_counts"], serde_json::json!([1, 0, 0]));
}

#[tokio::test]
async fn unknown_funnel_returns_not_found() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .get("/reports/funnel/999")
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNKNOWN_FUNNEL");
}

#[tokio::test]
async fn empty_range_reports_zero_totals() {
    let ctx = TestContext::new().await;

    let report = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 404)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    report.assert_status_ok();
    let report: Value = report.json();

    assert_eq!(report["summary"]["page_views"], 0);
    assert_eq!(report["summary"]["bounce_rate"], 0.0);
    assert_eq!(report["days"], serde_json::json!([]));
}

#[tokio::test]
async fn inverted_date_range_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 7)
        .add_query_param("from", "2026-08-21")
        .add_query_param("to", "2026-08-20")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn unknown_content_metric_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .get("/reports/content")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .add_query_param("metric", "upvotes")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn content_report_orders_by_requested_metric() {
    let ctx = TestContext::new().await;

    // Content 1 leads on impressions, content 2 leads on clicks.
    for (content_id, impressions, clicks) in [(1, 100, 2), (2, 50, 30)] {
        ctx.server
            .post("/analytics/track-content-performance")
            .json(&serde_json::json!({
                "tenantId": 7,
                "contentType": "post",
                "contentId": content_id,
                "scoreDate": fixtures::EVENT_DAY,
                "impressions": impressions,
                "clicks": clicks
            }))
            .await
            .assert_status_ok();
    }

    let by_clicks = ctx
        .server
        .get("/reports/content")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .add_query_param("metric", "clicks")
        .await;
    let by_clicks: Value = by_clicks.json();
    let rows = by_clicks["rows"].as_array().expect("rows array");
    assert_eq!(rows[0]["content_id"], 2);
    assert_eq!(rows[1]["content_id"], 1);

    let by_impressions = ctx
        .server
        .get("/reports/content")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    let by_impressions: Value = by_impressions.json();
    let rows = by_impressions["rows"].as_array().expect("rows array");
    assert_eq!(rows[0]["content_id"], 1);
}
