//! SQLite-backed storage for raw events and rollup aggregates.
//!
//! The write path (`insert`) expresses every aggregate mutation as an
//! atomic upsert-with-increment keyed on the row's natural key; the
//! read path (`query`) serves reports without touching aggregates.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod query;
pub mod schema;

pub use client::EventStore;
pub use config::StoreConfig;
pub use query::{
    ContentMetric, ContentPerformanceRow, DailyMetricRow, EngagementSummary, FunnelDayReport,
    KeywordSampleRow,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use engine_core::{
        ContentDelta, ContentKey, DailyMetricKey, DeviceType, EngagementDelta, EventEnvelope,
        FunnelDefinition, FunnelStep, KeywordSample,
    };
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn metric_key(d: u32) -> DailyMetricKey {
        DailyMetricKey {
            tenant_id: 7,
            date: day(d),
            device_type: DeviceType::Desktop,
        }
    }

    fn envelope(event_id: &str) -> EventEnvelope {
        let body = serde_json::to_vec(&json!({
            "eventId": event_id,
            "tenantId": 7,
            "eventType": "page_view",
            "timestamp": "2026-08-20T12:00:00Z",
            "sessionId": "S1",
            "path": "/forum",
            "deviceType": "desktop"
        }))
        .unwrap();
        EventEnvelope::parse(&body).unwrap()
    }

    #[tokio::test]
    async fn raw_event_insert_is_idempotent() {
        let store = EventStore::in_memory().await.unwrap();
        let raw = envelope("7ad0ad6a-22a5-4b4a-bd2c-6a0ac9ad9e10").to_raw();

        assert!(store.insert_raw_event(&raw).await.unwrap());
        assert!(!store.insert_raw_event(&raw).await.unwrap());
        assert_eq!(store.count_raw_events(7).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn daily_metric_increments_accumulate() {
        let store = EventStore::in_memory().await.unwrap();
        let key = metric_key(20);

        for _ in 0..3 {
            store
                .increment_daily_metric(&key, &EngagementDelta::page_view())
                .await
                .unwrap();
        }

        let row = store.get_daily_metric(&key).await.unwrap().unwrap();
        assert_eq!(row.page_views, 3);
        assert_eq!(row.sessions, 0);
        assert_eq!(row.bounce_rate, 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_on_one_key_sum_exactly() {
        // `in_memory` pins the pool to a single connection, so a
        // file-backed pool is needed for writers to genuinely
        // interleave.
        let path = std::env::temp_dir().join(format!(
            "rollup-concurrency-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let config = StoreConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 8,
            busy_timeout_ms: 5000,
        };
        let store = EventStore::connect(&config).await.unwrap();
        let key = metric_key(20);

        let mut writers = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            writers.push(tokio::spawn(async move {
                for _ in 0..25 {
                    loop {
                        match store
                            .increment_daily_metric(&key, &EngagementDelta::page_view())
                            .await
                        {
                            Ok(()) => break,
                            Err(e) if e.is_transient() => tokio::task::yield_now().await,
                            Err(e) => panic!("increment failed: {e}"),
                        }
                    }
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }

        // 8 writers x 25 increments: nothing lost, nothing doubled.
        let row = store.get_daily_metric(&key).await.unwrap().unwrap();
        assert_eq!(row.page_views, 200);

        drop(store);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn derived_ratios_follow_counters() {
        let store = EventStore::in_memory().await.unwrap();
        let key = metric_key(20);

        // One bounced session, one engaged session of 100s.
        store
            .increment_daily_metric(&key, &EngagementDelta::session_end(20.0, 1))
            .await
            .unwrap();
        store
            .increment_daily_metric(&key, &EngagementDelta::session_end(100.0, 4))
            .await
            .unwrap();

        let row = store.get_daily_metric(&key).await.unwrap().unwrap();
        assert_eq!(row.ended_sessions, 2);
        assert_eq!(row.bounce_sessions, 1);
        assert!((row.bounce_rate - 0.5).abs() < 1e-9);
        assert!((row.avg_session_duration - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_delta_writes_nothing() {
        let store = EventStore::in_memory().await.unwrap();
        let key = metric_key(20);
        store
            .increment_daily_metric(&key, &EngagementDelta::default())
            .await
            .unwrap();
        assert!(store.get_daily_metric(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn content_ratios_recomputed_in_upsert() {
        let store = EventStore::in_memory().await.unwrap();
        let key = ContentKey {
            tenant_id: 7,
            content_type: "post".to_string(),
            content_id: 42,
            score_date: day(20),
        };

        for _ in 0..4 {
            store
                .increment_content_performance(&key, &ContentDelta::impression())
                .await
                .unwrap();
        }
        store
            .increment_content_performance(&key, &ContentDelta::click())
            .await
            .unwrap();
        store
            .increment_content_performance(&key, &ContentDelta::share())
            .await
            .unwrap();

        let row = store
            .get_content_performance(7, "post", 42, day(20))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.impressions, 4);
        assert_eq!(row.clicks, 1);
        assert!((row.ctr - 0.25).abs() < 1e-9);
        assert!((row.engagement_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn click_before_impression_keeps_ctr_clamped() {
        let store = EventStore::in_memory().await.unwrap();
        let key = ContentKey {
            tenant_id: 7,
            content_type: "post".to_string(),
            content_id: 42,
            score_date: day(20),
        };

        store
            .increment_content_performance(&key, &ContentDelta::click())
            .await
            .unwrap();
        let row = store
            .get_content_performance(7, "post", 42, day(20))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.ctr, 0.0);

        store
            .increment_content_performance(&key, &ContentDelta::impression())
            .await
            .unwrap();
        let row = store
            .get_content_performance(7, "post", 42, day(20))
            .await
            .unwrap()
            .unwrap();
        assert!(row.ctr <= 1.0);
    }

    fn signup_funnel() -> FunnelDefinition {
        FunnelDefinition {
            tenant_id: 7,
            funnel_id: 1,
            name: "signup".to_string(),
            steps: vec![
                FunnelStep {
                    name: "Visit".to_string(),
                    event_action: Some("visit".to_string()),
                    event_label: None,
                },
                FunnelStep {
                    name: "SignUp".to_string(),
                    event_action: Some("sign_up".to_string()),
                    event_label: None,
                },
            ],
            conversion_goal: None,
        }
    }

    #[tokio::test]
    async fn funnel_counters_and_derived_report() {
        let store = EventStore::in_memory().await.unwrap();
        let def = signup_funnel();
        store.upsert_funnel_definition(&def).await.unwrap();

        // Three entrances, one of which converts in 30s.
        for _ in 0..3 {
            store.record_funnel_entrance(1, day(20)).await.unwrap();
        }
        store.record_funnel_step(1, day(20), 1).await.unwrap();
        store.record_funnel_completion(1, day(20), 30.0).await.unwrap();

        let reports = store.funnel_series(&def, day(20), day(20)).await.unwrap();
        assert_eq!(reports.len(), 1);
        let r = &reports[0];
        assert_eq!(r.entrances, 3);
        assert_eq!(r.completions, 1);
        assert_eq!(r.step_counts, vec![3, 1]);
        assert_eq!(r.drop_offs, vec![2]);
        assert!((r.conversion_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((r.avg_time_to_conversion_seconds - 30.0).abs() < 1e-9);
        assert!(r.entrances >= r.completions);
    }

    #[tokio::test]
    async fn funnel_definitions_round_trip() {
        let store = EventStore::in_memory().await.unwrap();
        let def = signup_funnel();
        store.upsert_funnel_definition(&def).await.unwrap();

        let loaded = store.get_funnel_definition(1).await.unwrap().unwrap();
        assert_eq!(loaded, def);
        assert_eq!(store.list_funnel_definitions(7).await.unwrap(), vec![def]);
        assert!(store.get_funnel_definition(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keyword_sample_derives_change_from_prior_day() {
        let store = EventStore::in_memory().await.unwrap();

        let first = KeywordSample {
            keyword_id: 5,
            date: day(19),
            device_type: DeviceType::Desktop,
            location: "us".to_string(),
            position: 12.0,
            clicks: 2,
            impressions: 100,
        };
        store.insert_keyword_sample(&first).await.unwrap();

        let second = KeywordSample {
            date: day(20),
            position: 8.0,
            ..first.clone()
        };
        store.insert_keyword_sample(&second).await.unwrap();

        let history = store.keyword_history(5, "desktop", "us", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        let newest = &history[0];
        assert_eq!(newest.date, day(20));
        assert_eq!(newest.previous_position, Some(12.0));
        // Moving from 12 to 8 is an improvement of 4.
        assert_eq!(newest.change, Some(4.0));
        assert!((newest.ctr - 0.02).abs() < 1e-9);

        assert_eq!(history[1].previous_position, None);
        assert_eq!(history[1].change, None);
    }

    #[tokio::test]
    async fn keyword_resubmission_overwrites_not_increments() {
        let store = EventStore::in_memory().await.unwrap();
        let sample = KeywordSample {
            keyword_id: 5,
            date: day(20),
            device_type: DeviceType::Mobile,
            location: "us".to_string(),
            position: 10.0,
            clicks: 3,
            impressions: 50,
        };
        store.insert_keyword_sample(&sample).await.unwrap();
        store
            .insert_keyword_sample(&KeywordSample {
                position: 9.0,
                clicks: 4,
                ..sample.clone()
            })
            .await
            .unwrap();

        let history = store.keyword_history(5, "mobile", "us", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].position, 9.0);
        assert_eq!(history[0].clicks, 4);
    }

    #[tokio::test]
    async fn engagement_summary_sums_across_devices() {
        let store = EventStore::in_memory().await.unwrap();
        let desktop = metric_key(20);
        let mobile = DailyMetricKey {
            device_type: DeviceType::Mobile,
            ..desktop
        };

        store
            .increment_daily_metric(&desktop, &EngagementDelta::page_view())
            .await
            .unwrap();
        store
            .increment_daily_metric(&mobile, &EngagementDelta::page_view())
            .await
            .unwrap();
        store
            .increment_daily_metric(&mobile, &EngagementDelta::session_end(60.0, 1))
            .await
            .unwrap();

        let summary = store.engagement_summary(7, day(20), day(20)).await.unwrap();
        assert_eq!(summary.page_views, 2);
        assert_eq!(summary.ended_sessions, 1);
        assert_eq!(summary.bounce_rate, 1.0);

        let series = store.engagement_series(7, day(20), day(20)).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].page_views, 2);

        let breakdown = store.device_breakdown(7, day(20)).await.unwrap();
        assert_eq!(breakdown.len(), 2);
    }

    #[tokio::test]
    async fn retention_purges_old_rows() {
        let store = EventStore::in_memory().await.unwrap();
        let raw = envelope("7ad0ad6a-22a5-4b4a-bd2c-6a0ac9ad9e10").to_raw();
        store.insert_raw_event(&raw).await.unwrap();

        let removed = store.purge_raw_events_before(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_raw_events(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ping_succeeds() {
        let store = EventStore::in_memory().await.unwrap();
        store.ping().await.unwrap();
    }
}
