// Data models for panel API payloads

pub mod admin;
pub mod host;
pub mod image;
pub mod user;
pub mod vps;

pub use admin::DashboardStats;
pub use host::{Host, HostStats};
pub use image::Image;
pub use user::User;
pub use vps::{NetworkType, Vps, VpsCreate, VpsQuery};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 with `Z` or an explicit offset, and naive timestamps
/// (no zone), which the backend emits for UTC columns.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Failed to parse timestamp: {}", s))
}
