use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::parse_timestamp;

// ==================================================================================================
// Response Models
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vps {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub status: String,
    pub cpu_cores: u32,
    pub ram_gb: f64,
    pub storage_gb: u32,
    #[serde(default)]
    pub public_ipv4: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    pub network_type: String,
    pub owner_id: i64,
    #[serde(default)]
    pub host_id: Option<i64>,
    #[serde(default)]
    pub os_image_id: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub expiration_action: Option<String>,
    #[serde(default)]
    pub auto_backups: Option<bool>,
    #[serde(default)]
    pub stats_cache: Option<Value>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Vps {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at).ok()
    }

    /// Best address to reach the instance on
    pub fn address(&self) -> Option<&str> {
        self.public_ipv4.as_deref().or(self.private_ip.as_deref())
    }
}

// ==================================================================================================
// Request Models
// ==================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    PublicIpv4,
    PrivateOnly,
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "public_ipv4" | "public" => Ok(NetworkType::PublicIpv4),
            "private_only" | "private" => Ok(NetworkType::PrivateOnly),
            other => Err(format!(
                "unknown network type '{}' (expected public_ipv4 or private_only)",
                other
            )),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::PublicIpv4 => write!(f, "public_ipv4"),
            NetworkType::PrivateOnly => write!(f, "private_only"),
        }
    }
}

/// Body of `POST /vps`
#[derive(Debug, Clone, Serialize)]
pub struct VpsCreate {
    pub name: String,
    pub cpu_cores: u32,
    pub ram_gb: f64,
    pub storage_gb: u32,
    pub os_image_id: i64,
    pub network_type: NetworkType,
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_on_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_backups: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_init_data: Option<String>,
}

/// Filters for `GET /vps`
#[derive(Debug, Clone, Default)]
pub struct VpsQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub owner_id: Option<i64>,
    pub status: Option<String>,
}

impl VpsQuery {
    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(owner_id) = self.owner_id {
            pairs.push(("owner_id", owner_id.to_string()));
        }
        if let Some(ref status) = self.status {
            pairs.push(("status_filter", status.clone()));
        }
        pairs
    }
}
