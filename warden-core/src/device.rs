//! Device information derived from the raw client signature.
//!
//! Best-effort parsing of the User-Agent header into a coarse browser/OS
//! pair and a mobile flag. This exists for the audit trail, not for
//! content negotiation, so unknown agents simply yield empty fields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub is_mobile: bool,
}

impl DeviceInfo {
    /// Derive coarse device information from a raw user agent.
    ///
    /// Browser detection order matters: Edge and Opera embed "Chrome" in
    /// their signatures, and Chrome embeds "Safari".
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return Self::default();
        };

        let browser = if ua.contains("Edg/") || ua.contains("Edge/") {
            Some("Edge")
        } else if ua.contains("OPR/") || ua.contains("Opera") {
            Some("Opera")
        } else if ua.contains("Firefox/") {
            Some("Firefox")
        } else if ua.contains("Chrome/") {
            Some("Chrome")
        } else if ua.contains("Safari/") {
            Some("Safari")
        } else {
            None
        };

        let os = if ua.contains("Windows") {
            Some("Windows")
        } else if ua.contains("Android") {
            Some("Android")
        } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iOS") {
            Some("iOS")
        } else if ua.contains("Mac OS") || ua.contains("Macintosh") {
            Some("macOS")
        } else if ua.contains("Linux") {
            Some("Linux")
        } else {
            None
        };

        let is_mobile = ua.contains("Mobile")
            || ua.contains("Android")
            || ua.contains("iPhone")
            || ua.contains("iPad");

        Self {
            browser: browser.map(str::to_string),
            os: os.map(str::to_string),
            is_mobile,
        }
    }
}
