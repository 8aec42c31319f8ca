// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status` command implementation.
//!
//! Connects to the gateway health endpoint to display service state,
//! uptime, and subscriber count. Falls back gracefully when the service
//! is not running.

use std::io::IsTerminal;
use std::time::Duration;

use courier_config::model::CourierConfig;
use courier_core::CourierError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    subscribers: usize,
}

/// Error body returned by an unhealthy gateway.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    kind: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub subscribers: Option<usize>,
    pub server_host: String,
    pub server_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `courier status` command.
///
/// Connects to the health endpoint on the gateway and displays service state.
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &CourierConfig,
    json: bool,
    plain: bool,
) -> Result<(), CourierError> {
    let host = &config.server.host;
    let port = config.server.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to create HTTP client: {e}")))?;

    let use_color = !plain && std::io::stdout().is_terminal();

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                CourierError::Internal(format!("failed to parse health response: {e}"))
            })?;

            let uptime_human = format_uptime(health.uptime_secs);

            if json {
                let status_resp = StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime_human.clone()),
                    subscribers: Some(health.subscribers),
                    server_host: host.clone(),
                    server_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                print_status_running(&health.status, &uptime_human, health.subscribers, use_color);
            }
        }
        Ok(resp) => {
            // The service answered but is refusing traffic; the error body
            // carries the reason.
            let kind = resp
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error.kind)
                .unwrap_or_else(|_| "unhealthy".to_string());

            if json {
                let status_resp = StatusResponse {
                    running: true,
                    status: kind.clone(),
                    uptime_secs: None,
                    uptime_human: None,
                    subscribers: None,
                    server_host: host.clone(),
                    server_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                print_status_unhealthy(&kind, use_color);
            }
        }
        Err(_) => {
            if json {
                let status_resp = StatusResponse {
                    running: false,
                    status: "not running".to_string(),
                    uptime_secs: None,
                    uptime_human: None,
                    subscribers: None,
                    server_host: host.clone(),
                    server_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                print_status_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

/// Print running status with optional colors.
fn print_status_running(status: &str, uptime: &str, subscribers: usize, use_color: bool) {
    println!();
    println!("  courier status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!(
            "    State:       {} {} (uptime: {})",
            "✓".green(),
            status.green(),
            uptime
        );
    } else {
        println!("    State:       [OK] {status} (uptime: {uptime})");
    }

    println!("    Subscribers: {subscribers}");
    println!();
}

/// Print unhealthy-but-running status with optional colors.
fn print_status_unhealthy(kind: &str, use_color: bool) {
    println!();
    println!("  courier status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:       {} {}", "!".yellow(), kind.yellow());
    } else {
        println!("    State:       [WARN] {kind}");
    }

    println!();
}

/// Print offline status with optional colors.
fn print_status_offline(host: &str, port: u16, use_color: bool) {
    println!();
    println!("  courier status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:       {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:       [FAIL] not running");
    }

    println!("    Endpoint:    http://{host}:{port}/health");
    println!();
    println!("  Start with: courier serve");
    println!();
}
