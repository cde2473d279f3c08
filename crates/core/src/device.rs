//! Device and browser classification.
//!
//! A pure function of the user-agent string, used only as a dimension
//! on aggregate rows. Classification mistakes skew a breakdown, never
//! correctness, so the matching is deliberately coarse.

use serde::{Deserialize, Serialize};

/// Coarse device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a wire value; anything unrecognized maps to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "mobile" => Self::Mobile,
            "tablet" => Self::Tablet,
            "desktop" => Self::Desktop,
            _ => Self::Unknown,
        }
    }
}

/// Small fixed browser-name set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Opera,
    #[default]
    Other,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::Edge => "edge",
            Self::Opera => "opera",
            Self::Other => "other",
        }
    }
}

/// Classifies a user-agent string into a device class.
///
/// Tablet tokens are checked before mobile ones because tablet UAs
/// frequently also contain "Mobile".
pub fn classify_device(user_agent: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();
    if ua.is_empty() {
        return DeviceType::Unknown;
    }
    if ua.contains("ipad") || ua.contains("tablet") || (ua.contains("android") && !ua.contains("mobile")) {
        DeviceType::Tablet
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}

/// Classifies a user-agent string into a browser name.
///
/// Order matters: Edge and Opera UAs contain "Chrome", and Chrome UAs
/// contain "Safari".
pub fn classify_browser(user_agent: &str) -> Browser {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("edg/") || ua.contains("edge") {
        Browser::Edge
    } else if ua.contains("opr/") || ua.contains("opera") {
        Browser::Opera
    } else if ua.contains("firefox") {
        Browser::Firefox
    } else if ua.contains("chrome") || ua.contains("crios") {
        Browser::Chrome
    } else if ua.contains("safari") {
        Browser::Safari
    } else {
        Browser::Other
    }
}
