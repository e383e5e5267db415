use serde::{Deserialize, Serialize};

/// Totals from `GET /admin/dashboard`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub users: Option<UserTotals>,
    #[serde(default)]
    pub vpses: Option<VpsTotals>,
    #[serde(default)]
    pub hosts: Option<HostTotals>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTotals {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VpsTotals {
    pub total: u64,
    pub running: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostTotals {
    pub total: u64,
    pub online: u64,
}
