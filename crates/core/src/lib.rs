//! Core types, validation, and rollup math for the analytics engine.

pub mod deltas;
pub mod derived;
pub mod device;
pub mod envelope;
pub mod error;
pub mod funnel;
pub mod limits;

pub use deltas::*;
pub use device::{classify_browser, classify_device, Browser, DeviceType};
pub use envelope::{EventEnvelope, EventKind, RawEvent};
pub use error::{Error, Result};
pub use funnel::{FunnelDefinition, FunnelStep};
