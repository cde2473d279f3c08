//! Derived-field math for aggregate entities.
//!
//! Every ratio a rollup row exposes is computed here (or by the
//! equivalent SQL expression inside the upsert statement), never ad hoc
//! at call sites, so the safe-division invariant is enforced exactly once
//! per entity kind.

/// A ratio of two additive counters, guarded against zero denominators
/// and clamped to [0, 1].
///
/// Counters arriving out of order can momentarily put the numerator
/// ahead of the denominator (a click recorded before its impression);
/// the clamp keeps the exposed ratio well-formed while the counters
/// catch up.
pub fn safe_ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
    }
}

/// An average of an accumulated total over a count, 0 when empty.
pub fn safe_average(total: f64, count: i64) -> f64 {
    if count <= 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Bounce rate: single-page sessions over ended sessions.
pub fn bounce_rate(bounce_sessions: i64, ended_sessions: i64) -> f64 {
    safe_ratio(bounce_sessions, ended_sessions)
}

/// Average session duration in seconds.
pub fn avg_session_duration(total_session_seconds: f64, ended_sessions: i64) -> f64 {
    safe_average(total_session_seconds, ended_sessions)
}

/// Click-through rate: clicks over impressions.
pub fn ctr(clicks: i64, impressions: i64) -> f64 {
    safe_ratio(clicks, impressions)
}

/// Engagement rate: all interactions over impressions.
pub fn engagement_rate(clicks: i64, shares: i64, comments: i64, impressions: i64) -> f64 {
    safe_ratio(clicks + shares + comments, impressions)
}
