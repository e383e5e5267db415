use anyhow::{Context, Result};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use vps_panel::api::{is_totp_required, PanelApi, VpsAction};
use vps_panel::auth::{credentials, AuthManager, LogoutHandler, SessionStore, TokenRefreshClient};
use vps_panel::config::{self, Command, Config, HostCommand, VpsCommand};
use vps_panel::error::{ApiError, FALLBACK_MESSAGE};
use vps_panel::http_client::PanelHttpClient;
use vps_panel::models::VpsQuery;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level; stdout is reserved for command output
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(api_url = %config.api_url, session_db = %config.session_db.display(), "Configuration loaded");

    let store = match credentials::load_session(&config.session_db) {
        Ok(Some(session)) => SessionStore::with_session(session),
        Ok(None) => SessionStore::new(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable saved session: {:#}", e);
            SessionStore::new()
        }
    };

    let logout = LogoutHandler::new(store.clone(), || {
        eprintln!("Your session has expired. Run `vps-panel login` to sign in again.");
    });
    let refresher = TokenRefreshClient::new(&config.api_url, config.http_request_timeout)?;
    let auth_manager = Arc::new(AuthManager::new(store.clone(), refresher, logout));

    let http_client = PanelHttpClient::new(
        auth_manager,
        &config.api_url,
        config.http_max_connections,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?
    .with_error_reporter(|message| eprintln!("Error: {}", message));
    let api = PanelApi::new(Arc::new(http_client));

    let result = execute(&api, command).await;

    // Persist whatever the command left behind: rotated tokens, a new login, or nothing
    if let Err(e) = credentials::save_session(&config.session_db, &store.get().await) {
        tracing::warn!("Failed to save session: {:#}", e);
    }

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            report_failure(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn execute(api: &PanelApi, command: Command) -> Result<()> {
    if !matches!(command, Command::Login { .. } | Command::Logout)
        && !api.store().get().await.is_authenticated()
    {
        anyhow::bail!("Not logged in. Run `vps-panel login` first.");
    }

    match command {
        Command::Login { email, password, totp } => {
            let (email, password) = config::prompt_login(email, password)?;

            let identity = match api.login(&email, &password, totp.as_deref()).await {
                Err(e) if totp.is_none() && is_totp_required(&e) => {
                    let code = config::prompt_totp()?;
                    api.login(&email, &password, Some(&code)).await?
                }
                other => other?,
            };

            println!("Logged in as {} ({})", identity.display_name(), identity.role);
        }

        Command::Logout => {
            api.logout().await;
            println!("Logged out");
        }

        Command::Whoami => print_json(&api.me().await?)?,

        Command::Vps(command) => match command {
            VpsCommand::List {
                status,
                owner,
                skip,
                limit,
            } => {
                let query = VpsQuery {
                    skip,
                    limit: Some(limit),
                    owner_id: owner,
                    status,
                };
                let rows = api
                    .list_vps(&query)
                    .await?
                    .into_iter()
                    .map(|vps| {
                        vec![
                            vps.id.to_string(),
                            vps.name.clone(),
                            vps.status.clone(),
                            vps.cpu_cores.to_string(),
                            format!("{} GB", vps.ram_gb),
                            format!("{} GB", vps.storage_gb),
                            vps.address().unwrap_or("-").to_string(),
                            vps.created()
                                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                                .unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect::<Vec<_>>();
                print_table(
                    &["ID", "NAME", "STATUS", "CPU", "RAM", "DISK", "ADDRESS", "CREATED"],
                    &rows,
                );
            }
            VpsCommand::Show { id } => print_json(&api.get_vps(id).await?)?,
            VpsCommand::Create(args) => {
                let request = args.to_request()?;
                print_json(&api.create_vps(&request).await?)?;
            }
            VpsCommand::Start { id } => print_json(&api.vps_action(id, VpsAction::Start).await?)?,
            VpsCommand::Stop { id } => print_json(&api.vps_action(id, VpsAction::Stop).await?)?,
            VpsCommand::Reboot { id } => print_json(&api.vps_action(id, VpsAction::Reboot).await?)?,
            VpsCommand::Delete { id } => {
                api.delete_vps(id).await?;
                println!("Deleted VPS {}", id);
            }
        },

        Command::Hosts(command) => match command {
            HostCommand::List => {
                let rows = api
                    .list_hosts()
                    .await?
                    .into_iter()
                    .map(|host| {
                        vec![
                            host.id.to_string(),
                            host.name.clone(),
                            host.status.clone(),
                            format!("{}/{}", host.used_cpu_cores.unwrap_or(0), host.total_cpu_cores),
                            format!("{:.1}/{:.1} GB", host.used_ram_gb.unwrap_or(0.0), host.total_ram_gb),
                            format!(
                                "{:.1}/{:.1} GB",
                                host.used_storage_gb.unwrap_or(0.0),
                                host.total_storage_gb
                            ),
                            host.ip_address.clone().unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect::<Vec<_>>();
                print_table(
                    &["ID", "NAME", "STATUS", "CPU", "RAM", "STORAGE", "ADDRESS"],
                    &rows,
                );
            }
            HostCommand::Show { id } => print_json(&api.get_host(id).await?)?,
            HostCommand::Stats => print_json(&api.host_stats().await?)?,
        },

        Command::Images { limit } => {
            let rows = api
                .list_images(Some(limit))
                .await?
                .into_iter()
                .map(|image| {
                    vec![
                        image.id.to_string(),
                        image.name.clone(),
                        image.os_label(),
                        image.file_format.clone(),
                        format!("{:.1} GB", image.file_size_gb),
                        if image.is_active { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            print_table(&["ID", "NAME", "OS", "FORMAT", "SIZE", "ACTIVE"], &rows);
        }

        Command::Users { limit } => {
            let rows = api
                .list_users(Some(limit))
                .await?
                .into_iter()
                .map(|user| {
                    vec![
                        user.id.to_string(),
                        user.username.clone(),
                        user.email.clone(),
                        user.role.clone(),
                        if user.is_2fa_enabled { "on" } else { "off" }.to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            print_table(&["ID", "USERNAME", "EMAIL", "ROLE", "2FA"], &rows);
        }

        Command::Dashboard => print_json(&api.admin_dashboard().await?)?,
    }

    Ok(())
}

/// Print what has not already reached the user
fn report_failure(error: &anyhow::Error) {
    match error.downcast_ref::<ApiError>() {
        // Surfaced by the error reporter when it was received
        Some(ApiError::Http {
            detail: Some(_), ..
        }) => {}
        Some(e) if matches!(e, ApiError::Transport(_)) => eprintln!("Error: {}", e),
        Some(e) => eprintln!("Error: {}", e.display_message_or(FALLBACK_MESSAGE)),
        None => eprintln!("Error: {:#}", error),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to format response")?;
    println!("{}", json);
    Ok(())
}

/// Print rows as left-aligned columns
fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("(none)");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.to_vec()));
    for row in rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}
