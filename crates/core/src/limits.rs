//! Size limits for inbound envelopes.
//!
//! Analytics must never degrade the product it observes, so the
//! ingestion boundary caps everything it accepts. Limits are enforced
//! before parsing where possible.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

/// Maximum envelope payload size in bytes (32KB).
///
/// A single event with a full `extra` map stays well under this.
pub const MAX_EVENT_SIZE_BYTES: usize = 32 * 1024;

/// Maximum `extra` map JSON size in bytes (16KB).
pub const MAX_EXTRA_BYTES: usize = 16 * 1024;

/// URL path max length.
pub const MAX_PATH_LEN: usize = 2000;

/// Referrer URL max length. Matches the HTTP Referer header limit.
pub const MAX_REFERRER_LEN: usize = 2048;

/// Category / action / label max length.
pub const MAX_DIMENSION_LEN: usize = 500;

/// Session token max length (UUIDs are 36 chars; allow custom tokens).
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Keyword location dimension max length (country or region code).
pub const MAX_LOCATION_LEN: usize = 64;

/// Maximum allowed clock skew for future timestamps (seconds).
pub const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Maximum funnel steps per definition.
pub const MAX_FUNNEL_STEPS: usize = 16;
