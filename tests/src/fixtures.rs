//! Test fixtures and envelope generators.
//!
//! All envelopes use a fixed day safely in the past so daily buckets
//! are deterministic regardless of when the suite runs.

use engine_core::{FunnelDefinition, FunnelStep};
use serde_json::{json, Value};

/// The daily bucket every fixture lands in.
pub const EVENT_DAY: &str = "2026-08-20";

/// RFC 3339 timestamp on the fixture day.
pub fn ts(hour: u32, minute: u32, second: u32) -> String {
    format!("{EVENT_DAY}T{hour:02}:{minute:02}:{second:02}Z")
}

/// A minimal valid envelope. The event id is omitted so the server
/// assigns a fresh one per delivery.
pub fn envelope(tenant_id: i64, event_type: &str, session_id: &str) -> Value {
    json!({
        "tenantId": tenant_id,
        "eventType": event_type,
        "timestamp": ts(12, 0, 0),
        "sessionId": session_id,
        "deviceType": "desktop",
        "browser": "chrome"
    })
}

pub fn page_view(tenant_id: i64, session_id: &str, path: &str) -> Value {
    let mut event = envelope(tenant_id, "page_view", session_id);
    event["path"] = json!(path);
    event
}

/// A page view carrying the capture client's visitor-identity hint.
pub fn page_view_with_hint(tenant_id: i64, session_id: &str, hint: &str) -> Value {
    let mut event = page_view(tenant_id, session_id, "/forum");
    event["extra"] = json!({ hint: true });
    event
}

pub fn session_end(
    tenant_id: i64,
    session_id: &str,
    duration_seconds: f64,
    page_view_count: i64,
) -> Value {
    let mut event = envelope(tenant_id, "session_end", session_id);
    event["value"] = json!(duration_seconds);
    event["extra"] = json!({ "pageViewCount": page_view_count });
    event
}

/// A content-targeted event (`content_view`, `content_click`, ...).
pub fn content_event(tenant_id: i64, session_id: &str, event_type: &str, content_id: i64) -> Value {
    let mut event = envelope(tenant_id, event_type, session_id);
    event["extra"] = json!({ "contentId": content_id, "contentType": "thread" });
    event
}

/// A click with the action/label pair funnel steps match against.
pub fn action_click(
    tenant_id: i64,
    session_id: &str,
    action: Option<&str>,
    label: Option<&str>,
    timestamp: &str,
) -> Value {
    let mut event = envelope(tenant_id, "click", session_id);
    event["timestamp"] = json!(timestamp);
    if let Some(action) = action {
        event["action"] = json!(action);
    }
    if let Some(label) = label {
        event["label"] = json!(label);
    }
    event
}

/// Visit → SignUp → Purchase, with the last step matched by label.
pub fn signup_funnel(tenant_id: i64, funnel_id: i64) -> FunnelDefinition {
    FunnelDefinition {
        tenant_id,
        funnel_id,
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
            FunnelStep {
                name: "Purchase".to_string(),
                event_action: None,
                event_label: Some("purchase".to_string()),
            },
        ],
        conversion_goal: Some("purchase".to_string()),
    }
}
