//! Explicit session contexts.
//!
//! A `Session` is a cheap clonable handle; the mutable part (page view
//! count, visited paths) sits behind a mutex so instrumented code can
//! record from anywhere. There is no process-global session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_core::{Browser, DeviceType};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::client::CaptureClient;

/// Immutable facts about one session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub tenant_id: i64,
    pub started_at: DateTime<Utc>,
    pub device_type: DeviceType,
    pub browser: Browser,
}

#[derive(Debug, Default)]
struct SessionState {
    page_view_count: i64,
    visited_paths: Vec<String>,
    ended: bool,
}

/// Handle to one live session.
#[derive(Clone)]
pub struct Session {
    client: CaptureClient,
    context: Arc<SessionContext>,
    state: Arc<Mutex<SessionState>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        client: CaptureClient,
        tenant_id: i64,
        device_type: DeviceType,
        browser: Browser,
    ) -> Self {
        Self {
            client,
            context: Arc::new(SessionContext {
                session_id: Uuid::new_v4(),
                tenant_id,
                started_at: Utc::now(),
                device_type,
                browser,
            }),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn page_view_count(&self) -> i64 {
        self.state.lock().page_view_count
    }

    pub fn visited_paths(&self) -> Vec<String> {
        self.state.lock().visited_paths.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    /// Records a page view.
    ///
    /// The first view of the session carries a `sessionStart` hint; the
    /// first view this client installation has ever recorded carries
    /// `firstVisit` instead, which is what feeds unique-visitor and
    /// new-user counts server-side.
    pub fn record_page_view(&self, path: &str) {
        let session_start = {
            let mut state = self.state.lock();
            if state.ended {
                return;
            }
            state.page_view_count += 1;
            state.visited_paths.push(path.to_string());
            state.page_view_count == 1
        };

        let mut extra = Map::new();
        if session_start {
            if self.client.mark_visited() {
                extra.insert("firstVisit".to_string(), Value::Bool(true));
            } else {
                extra.insert("sessionStart".to_string(), Value::Bool(true));
            }
        }

        self.emit("page_view", |envelope| {
            envelope.insert("path".to_string(), json!(path));
            envelope.insert("extra".to_string(), Value::Object(extra));
        });
    }

    pub fn record_content_view(&self, content_type: &str, content_id: i64) {
        self.emit_content("content_view", "view", content_type, content_id, None);
    }

    pub fn record_content_click(&self, content_type: &str, content_id: i64) {
        self.emit_content("content_click", "click", content_type, content_id, None);
    }

    pub fn record_social_share(&self, content_type: &str, content_id: i64, network: &str) {
        self.emit_content(
            "social_share",
            "share",
            content_type,
            content_id,
            Some(network.to_string()),
        );
    }

    pub fn record_form_submission(&self, form_name: &str) {
        self.emit("form_submission", |envelope| {
            envelope.insert("category".to_string(), json!("form"));
            envelope.insert("label".to_string(), json!(form_name));
        });
    }

    pub fn record_conversion(&self, goal: &str, value: Option<f64>) {
        self.emit("conversion", |envelope| {
            envelope.insert("label".to_string(), json!(goal));
            if let Some(value) = value {
                envelope.insert("value".to_string(), json!(value));
            }
        });
    }

    pub fn record_search(&self, query: &str) {
        self.emit("search", |envelope| {
            envelope.insert("category".to_string(), json!("search"));
            envelope.insert("label".to_string(), json!(query));
        });
    }

    /// Records an arbitrary interaction with an action/label pair,
    /// which is what funnel steps match against.
    pub fn record_action(&self, action: &str, label: Option<&str>) {
        self.emit("click", |envelope| {
            envelope.insert("action".to_string(), json!(action));
            if let Some(label) = label {
                envelope.insert("label".to_string(), json!(label));
            }
        });
    }

    /// Keeps the session alive in the server-side registry.
    pub fn heartbeat(&self) {
        if self.is_ended() {
            return;
        }
        self.emit("heartbeat", |_| {});
    }

    /// Spawns the periodic heartbeat task; it stops on its own once the
    /// session is flushed.
    pub fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        let session = self.clone();
        let interval = self.client.config().heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                if session.is_ended() {
                    break;
                }
                session.heartbeat();
            }
        })
    }

    /// Ends the session: computes the duration and page view count and
    /// emits the `session_end` event their rollup rides on. Idempotent;
    /// later records on this handle are dropped.
    pub fn flush_session(&self) {
        let page_view_count = {
            let mut state = self.state.lock();
            if state.ended {
                return;
            }
            state.ended = true;
            state.page_view_count
        };

        let duration_seconds = (Utc::now() - self.context.started_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;

        debug!(
            session_id = %self.context.session_id,
            duration_seconds,
            page_view_count,
            "Flushing session"
        );

        self.emit("session_end", |envelope| {
            envelope.insert("value".to_string(), json!(duration_seconds));
            envelope.insert(
                "extra".to_string(),
                json!({ "pageViewCount": page_view_count }),
            );
        });
    }

    fn emit_content(
        &self,
        event_type: &str,
        action: &str,
        content_type: &str,
        content_id: i64,
        label: Option<String>,
    ) {
        self.emit(event_type, |envelope| {
            envelope.insert("category".to_string(), json!("content"));
            envelope.insert("action".to_string(), json!(action));
            if let Some(label) = label {
                envelope.insert("label".to_string(), json!(label));
            }
            envelope.insert(
                "extra".to_string(),
                json!({ "contentId": content_id, "contentType": content_type }),
            );
        });
    }

    fn emit<F>(&self, event_type: &str, customize: F)
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        if self.is_ended() && event_type != "session_end" {
            return;
        }
        let mut envelope = self.base_envelope(event_type);
        customize(&mut envelope);
        self.client.send(Value::Object(envelope));
    }

    fn base_envelope(&self, event_type: &str) -> Map<String, Value> {
        let mut envelope = Map::new();
        envelope.insert("eventId".to_string(), json!(Uuid::new_v4()));
        envelope.insert("tenantId".to_string(), json!(self.context.tenant_id));
        envelope.insert("eventType".to_string(), json!(event_type));
        envelope.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        envelope.insert(
            "sessionId".to_string(),
            json!(self.context.session_id.to_string()),
        );
        envelope.insert(
            "deviceType".to_string(),
            json!(self.context.device_type.as_str()),
        );
        envelope.insert("browser".to_string(), json!(self.context.browser.as_str()));
        envelope
    }
}
