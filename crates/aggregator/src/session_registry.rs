//! Server-side view of live sessions.
//!
//! Page views and heartbeats keep a session's entry fresh; an explicit
//! `session_end` removes it. The sweep finalizes anything that went
//! quiet past the idle timeout, synthesizing the same engagement
//! contribution an explicit end would have produced.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use engine_core::{DailyMetricKey, DeviceType, EngagementDelta, EventEnvelope, EventKind};
use parking_lot::Mutex;
use telemetry::metrics;

#[derive(Debug, Clone)]
struct SessionEntry {
    tenant_id: i64,
    device_type: DeviceType,
    started_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    page_views: i64,
}

/// A session finalized by the sweep rather than by the client.
#[derive(Debug, Clone)]
pub struct ExpiredSession {
    pub session_id: String,
    pub key: DailyMetricKey,
    pub delta: EngagementDelta,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<(i64, String), SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the registry from one incoming event.
    pub fn observe(&self, envelope: &EventEnvelope) {
        let Some(session_id) = envelope.session_id.clone() else {
            return;
        };
        let key = (envelope.tenant_id, session_id);
        let mut sessions = self.sessions.lock();

        match envelope.kind {
            EventKind::SessionEnd => {
                if sessions.remove(&key).is_some() {
                    metrics().sessions_ended.inc();
                }
            }
            EventKind::PageView | EventKind::Heartbeat => {
                let entry = sessions.entry(key).or_insert_with(|| {
                    metrics().sessions_opened.inc();
                    SessionEntry {
                        tenant_id: envelope.tenant_id,
                        device_type: envelope.device_type,
                        started_at: envelope.timestamp,
                        last_seen: envelope.timestamp,
                        page_views: 0,
                    }
                });
                entry.last_seen = entry.last_seen.max(envelope.timestamp);
                if envelope.kind == EventKind::PageView {
                    entry.page_views += 1;
                }
            }
            _ => {
                if let Some(entry) = sessions.get_mut(&key) {
                    entry.last_seen = entry.last_seen.max(envelope.timestamp);
                }
            }
        }

        metrics().open_sessions.set(sessions.len() as u64);
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Removes and returns every session idle past the timeout.
    ///
    /// Duration is measured to the last observed activity, not to the
    /// sweep, so a swept session contributes the same numbers whether
    /// the sweep runs one minute or one hour late.
    pub fn sweep(&self, now: DateTime<Utc>, idle_timeout: Duration) -> Vec<ExpiredSession> {
        let mut sessions = self.sessions.lock();
        let expired_keys: Vec<(i64, String)> = sessions
            .iter()
            .filter(|(_, entry)| now - entry.last_seen >= idle_timeout)
            .map(|(key, _)| key.clone())
            .collect();

        let expired = expired_keys
            .into_iter()
            .filter_map(|key| {
                let entry = sessions.remove(&key)?;
                let duration = (entry.last_seen - entry.started_at)
                    .num_milliseconds()
                    .max(0) as f64
                    / 1000.0;
                Some(ExpiredSession {
                    session_id: key.1,
                    key: DailyMetricKey {
                        tenant_id: entry.tenant_id,
                        date: entry.last_seen.date_naive(),
                        device_type: entry.device_type,
                    },
                    delta: EngagementDelta::session_end(duration, entry.page_views),
                })
            })
            .collect();

        metrics().open_sessions.set(sessions.len() as u64);
        expired
    }
}
