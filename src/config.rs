use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Input, Password};
use reqwest::Url;
use std::path::PathBuf;

use crate::http_client::parse_base_url;
use crate::models::{NetworkType, VpsCreate};

/// VPS Panel - command-line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Panel API root
    #[arg(
        short = 'u',
        long,
        env = "PANEL_API_URL",
        default_value = "http://localhost:8000/api/v1"
    )]
    pub api_url: String,

    /// Path to the SQLite file holding the saved session
    #[arg(short = 'd', long, env = "PANEL_SESSION_DB")]
    pub session_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and save the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: Option<String>,

        /// Password (prompted when omitted)
        #[arg(short, long, env = "PANEL_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// TOTP code for accounts with 2FA
        #[arg(short, long)]
        totp: Option<String>,
    },

    /// End the session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Manage virtual servers
    #[command(subcommand)]
    Vps(VpsCommand),

    /// Inspect hypervisor hosts
    #[command(subcommand)]
    Hosts(HostCommand),

    /// List OS images
    Images {
        #[arg(long, default_value = "1000")]
        limit: u32,
    },

    /// List users
    Users {
        #[arg(long, default_value = "1000")]
        limit: u32,
    },

    /// Show admin dashboard totals
    Dashboard,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum VpsCommand {
    /// List servers
    List {
        /// Only servers in this state (running, stopped, ...)
        #[arg(long)]
        status: Option<String>,

        /// Only servers owned by this user
        #[arg(long)]
        owner: Option<i64>,

        #[arg(long)]
        skip: Option<u32>,

        #[arg(long, default_value = "1000")]
        limit: u32,
    },

    /// Show one server
    Show { id: i64 },

    /// Create a server
    Create(CreateArgs),

    /// Start a server
    Start { id: i64 },

    /// Stop a server
    Stop { id: i64 },

    /// Reboot a server
    Reboot { id: i64 },

    /// Delete a server
    Delete { id: i64 },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CreateArgs {
    pub name: String,

    #[arg(long, default_value = "1")]
    pub cpu: u32,

    /// RAM in GB
    #[arg(long, default_value = "1")]
    pub ram: f64,

    /// Disk in GB
    #[arg(long, default_value = "20")]
    pub storage: u32,

    /// OS image id
    #[arg(long)]
    pub image: i64,

    /// public_ipv4 or private_only
    #[arg(long, default_value = "private_only")]
    pub network: NetworkType,

    /// Owner user id
    #[arg(long)]
    pub owner: i64,

    /// Leave the server stopped after creation
    #[arg(long)]
    pub no_start: bool,

    #[arg(long)]
    pub auto_backups: bool,

    /// File with cloud-init user data
    #[arg(long)]
    pub cloud_init: Option<PathBuf>,
}

impl CreateArgs {
    /// Build the request body, reading the cloud-init file if given
    pub fn to_request(&self) -> Result<VpsCreate> {
        let cloud_init_data = match &self.cloud_init {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read cloud-init file: {}", path.display()))?,
            ),
            None => None,
        };

        Ok(VpsCreate {
            name: self.name.clone(),
            cpu_cores: self.cpu,
            ram_gb: self.ram,
            storage_gb: self.storage,
            os_image_id: self.image,
            network_type: self.network,
            owner_id: self.owner,
            start_on_create: Some(!self.no_start),
            auto_backups: self.auto_backups.then_some(true),
            cloud_init_data,
        })
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// List hosts
    List,

    /// Show one host
    Show { id: i64 },

    /// Aggregate capacity and usage
    Stats,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub api_url: Url,

    // Session persistence
    pub session_db: PathBuf,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args)?;
        Ok((config, args.command))
    }

    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let session_db = match &args.session_db {
            Some(path) => expand_tilde(path),
            None => default_session_db().context(
                "Could not determine a data directory (use -d or set PANEL_SESSION_DB)",
            )?,
        };

        Ok(Config {
            api_url: parse_base_url(&args.api_url)?,

            session_db,

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", 10),
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", 10),
            http_request_timeout: args.http_timeout,

            log_level: args.log_level.clone(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.api_url.scheme(), "http" | "https") {
            anyhow::bail!("PANEL_API_URL must use http or https: {}", self.api_url);
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        if self.session_db.is_dir() {
            anyhow::bail!(
                "PANEL_SESSION_DB points to a directory: {}",
                self.session_db.display()
            );
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// `<data dir>/vps-panel/session.sqlite3`
fn default_session_db() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("vps-panel").join("session.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// === Interactive prompts ===

/// Credentials for a login, completed interactively where missing
pub fn prompt_login(email: Option<String>, password: Option<String>) -> Result<(String, String)> {
    let email = match email {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .context("Failed to read email")?,
    };

    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?,
    };

    if email.trim().is_empty() || password.is_empty() {
        anyhow::bail!("Email and password are required");
    }

    Ok((email.trim().to_string(), password))
}

pub fn prompt_totp() -> Result<String> {
    let code: String = Input::new()
        .with_prompt("2FA code")
        .interact_text()
        .context("Failed to read 2FA code")?;
    Ok(code.trim().to_string())
}
