use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    pub status: String,
    pub total_cpu_cores: u32,
    #[serde(default)]
    pub used_cpu_cores: Option<u32>,
    pub total_ram_gb: f64,
    #[serde(default)]
    pub used_ram_gb: Option<f64>,
    pub total_storage_gb: f64,
    #[serde(default)]
    pub used_storage_gb: Option<f64>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub stats_cache: Option<Value>,
}

/// Cluster-wide totals from `GET /hosts/stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostStats {
    #[serde(default)]
    pub hosts: Option<HostCounts>,
    #[serde(default)]
    pub resources: Option<ResourceUsage>,
    #[serde(default)]
    pub vpses: Option<ActiveVpsCounts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostCounts {
    pub total: u64,
    #[serde(default)]
    pub online: u64,
    #[serde(default)]
    pub offline: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveVpsCounts {
    pub total: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub creating: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub cpu: Option<CpuUsage>,
    #[serde(default)]
    pub ram: Option<CapacityUsage>,
    #[serde(default)]
    pub storage: Option<CapacityUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuUsage {
    pub used: f64,
    pub total: f64,
    #[serde(default)]
    pub usage_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacityUsage {
    pub total_gb: f64,
    #[serde(default)]
    pub used_gb: Option<f64>,
    #[serde(default)]
    pub usage_percent: Option<f64>,
}
