//! End-to-end tests for the ingestion pipeline.
//!
//! Each test drives the real router: POST /analytics/track-event
//! persists the raw fact and folds it into the rollup tables, then the
//! reporting endpoints are asserted against.

use chrono::{DateTime, Duration, Utc};
use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn page_view_shows_up_in_the_engagement_report() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/analytics/track-event")
        .json(&fixtures::page_view_with_hint(7, "S1", "firstVisit"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["deduplicated"], false);

    let report = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    report.assert_status_ok();
    let report: Value = report.json();

    assert_eq!(report["summary"]["page_views"], 1);
    assert_eq!(report["summary"]["unique_visitors"], 1);
    assert_eq!(report["summary"]["new_users"], 1);

    let days = report["days"].as_array().expect("days array");
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], fixtures::EVENT_DAY);
    assert_eq!(days[0]["device_type"], "all");
    assert_eq!(days[0]["page_views"], 1);
}

#[tokio::test]
async fn session_lifecycle_drives_bounce_and_duration() {
    let ctx = TestContext::new().await;

    // Session A: two pages, 120 seconds. Session B: a single-page bounce.
    for event in [
        fixtures::page_view(7, "A", "/forum"),
        fixtures::page_view(7, "A", "/forum/thread-1"),
        fixtures::session_end(7, "A", 120.0, 2),
        fixtures::page_view(7, "B", "/forum"),
        fixtures::session_end(7, "B", 30.0, 1),
    ] {
        ctx.server
            .post("/analytics/track-event")
            .json(&event)
            .await
            .assert_status_ok();
    }

    let report = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    report.assert_status_ok();
    let report: Value = report.json();

    let summary = &report["summary"];
    assert_eq!(summary["page_views"], 3);
    assert_eq!(summary["sessions"], 2);
    assert_eq!(summary["ended_sessions"], 2);
    assert_eq!(summary["bounce_sessions"], 1);
    assert_eq!(summary["bounce_rate"], 0.5);
    assert_eq!(summary["avg_session_duration"], 75.0);
}

#[tokio::test]
async fn duplicate_event_id_is_acknowledged_but_not_recounted() {
    let ctx = TestContext::new().await;

    let event_id = Uuid::new_v4().to_string();
    let mut event = fixtures::page_view(7, "S1", "/forum");
    event["eventId"] = serde_json::json!(event_id);

    let first = ctx
        .server
        .post("/analytics/track-event")
        .json(&event)
        .await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["deduplicated"], false);
    assert_eq!(first["event_id"], event_id.as_str());

    // Same delivery replayed: acknowledged, no new increments.
    let second = ctx
        .server
        .post("/analytics/track-event")
        .json(&event)
        .await;
    second.assert_status_ok();
    let second: Value = second.json();
    assert_eq!(second["success"], true);
    assert_eq!(second["deduplicated"], true);
    assert_eq!(second["event_id"], event_id.as_str());

    assert_eq!(ctx.store.count_raw_events(7).await.unwrap(), 1);

    let report = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    let report: Value = report.json();
    assert_eq!(report["summary"]["page_views"], 1);
}

#[tokio::test]
async fn replayed_page_view_keeps_the_swept_session_a_bounce() {
    let ctx = TestContext::new().await;

    let mut event = fixtures::page_view(7, "S1", "/forum");
    event["eventId"] = serde_json::json!(Uuid::new_v4().to_string());
    for _ in 0..2 {
        ctx.server
            .post("/analytics/track-event")
            .json(&event)
            .await
            .assert_status_ok();
    }

    // The replayed delivery must not count as a second page view in
    // the live-session registry: swept, the session is still a bounce.
    let now: DateTime<Utc> = "2026-08-20T14:00:00Z".parse().unwrap();
    let expired = ctx.state.sessions.sweep(now, Duration::minutes(30));
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].delta.bounce_sessions, 1);
}

#[tokio::test]
async fn content_events_feed_the_content_report() {
    let ctx = TestContext::new().await;

    for event_type in ["content_view", "content_view", "content_click", "social_share"] {
        ctx.server
            .post("/analytics/track-event")
            .json(&fixtures::content_event(7, "S1", event_type, 42))
            .await
            .assert_status_ok();
    }

    let report = ctx
        .server
        .get("/reports/content")
        .add_query_param("tenantId", 7)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    report.assert_status_ok();
    let report: Value = report.json();

    assert_eq!(report["metric"], "impressions");
    let rows = report["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["content_id"], 42);
    assert_eq!(rows[0]["content_type"], "thread");
    assert_eq!(rows[0]["impressions"], 2);
    assert_eq!(rows[0]["clicks"], 1);
    assert_eq!(rows[0]["social_shares"], 1);
    assert_eq!(rows[0]["ctr"], 0.5);
}

#[tokio::test]
async fn direct_engagement_deltas_accumulate() {
    let ctx = TestContext::new().await;

    let delta = serde_json::json!({
        "tenantId": 9,
        "date": fixtures::EVENT_DAY,
        "deviceType": "mobile",
        "pageViews": 10,
        "sessions": 4,
        "bounceSessions": 1,
        "sessionSeconds": 400.0,
        "endedSessions": 4
    });

    for _ in 0..2 {
        let response = ctx
            .server
            .post("/analytics/track-user-engagement")
            .json(&delta)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
    }

    let report = ctx
        .server
        .get("/reports/engagement")
        .add_query_param("tenantId", 9)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    let report: Value = report.json();
    assert_eq!(report["summary"]["page_views"], 20);
    assert_eq!(report["summary"]["sessions"], 8);
    assert_eq!(report["summary"]["bounce_rate"], 0.25);
    assert_eq!(report["summary"]["avg_session_duration"], 100.0);
}

#[tokio::test]
async fn direct_content_deltas_accumulate() {
    let ctx = TestContext::new().await;

    let delta = serde_json::json!({
        "tenantId": 9,
        "contentType": "post",
        "contentId": 5,
        "scoreDate": fixtures::EVENT_DAY,
        "impressions": 100,
        "clicks": 10
    });
    ctx.server
        .post("/analytics/track-content-performance")
        .json(&delta)
        .await
        .assert_status_ok();

    let report = ctx
        .server
        .get("/reports/content")
        .add_query_param("tenantId", 9)
        .add_query_param("from", fixtures::EVENT_DAY)
        .add_query_param("to", fixtures::EVENT_DAY)
        .await;
    let report: Value = report.json();
    let rows = report["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["impressions"], 100);
    assert_eq!(rows[0]["ctr"], 0.1);
}

#[tokio::test]
async fn keyword_samples_derive_position_change() {
    let ctx = TestContext::new().await;

    let sample = |date: &str, position: f64| {
        serde_json::json!({
            "keywordId": 3,
            "date": date,
            "deviceType": "desktop",
            "location": "us",
            "position": position,
            "clicks": 5,
            "impressions": 250
        })
    };

    ctx.server
        .post("/analytics/track-keyword-ranking")
        .json(&sample("2026-08-19", 12.0))
        .await
        .assert_status_ok();
    ctx.server
        .post("/analytics/track-keyword-ranking")
        .json(&sample("2026-08-20", 8.0))
        .await
        .assert_status_ok();

    let history = ctx
        .store
        .keyword_history(3, "desktop", "us", 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    // Newest first; positive change means the ranking improved.
    assert_eq!(history[0].position, 8.0);
    assert_eq!(history[0].previous_position, Some(12.0));
    assert_eq!(history[0].change, Some(4.0));
    assert_eq!(history[1].change, None);
}
