use serde::{Deserialize, Serialize};

/// OS image available for new instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub os_family: String,
    #[serde(default)]
    pub os_version: Option<String>,
    pub file_size_gb: f64,
    pub file_format: String,
    #[serde(default)]
    pub is_public: Option<bool>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Image {
    /// e.g. "ubuntu 22.04"
    pub fn os_label(&self) -> String {
        match self.os_version.as_deref() {
            Some(version) if !version.is_empty() => format!("{} {}", self.os_family, version),
            _ => self.os_family.clone(),
        }
    }
}
