// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier doctor` command implementation.
//!
//! Runs diagnostic checks against the Courier environment to identify
//! configuration issues, chat.db access problems, and bridge store damage.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use courier_config::model::CourierConfig;
use courier_core::{CourierError, HealthStatus, NativeStore};
use courier_imessage::{IMessageStore, IMessageStoreConfig};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Check status.
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    /// Duration the check took.
    pub duration: Duration,
}

/// Run the `courier doctor` command.
///
/// Runs quick diagnostic checks. With `--deep`, runs additional intensive checks.
/// With `--plain`, disables colored output.
pub async fn run_doctor(
    config: &CourierConfig,
    config_path: Option<&Path>,
    deep: bool,
    plain: bool,
) -> Result<(), CourierError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = Vec::new();

    // Quick checks (always run)
    results.push(check_config(config_path).await);
    results.push(check_bridge_store(&config.storage.database_path).await);
    results.push(check_chat_db(config).await);
    results.push(check_gateway_endpoint(config).await);

    // Deep checks (only with --deep)
    if deep {
        results.push(check_store_integrity(&config.storage.database_path).await);
        results.push(check_store_projection(&config.storage.database_path).await);
        results.push(check_memory_baseline().await);
    }

    // Print results
    println!();
    println!("  courier doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in &results {
        let duration_ms = result.duration.as_millis();
        let status_symbol;
        let line;

        match result.status {
            CheckStatus::Pass => {
                if use_color {
                    use colored::Colorize;
                    status_symbol = "✓".green().to_string();
                    line = format!(
                        "    {status_symbol} {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                } else {
                    line = format!(
                        "    [OK]   {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                }
            }
            CheckStatus::Warn => {
                warn_count += 1;
                if use_color {
                    use colored::Colorize;
                    status_symbol = "!".yellow().to_string();
                    line = format!(
                        "    {status_symbol} {:<20} {} ({duration_ms}ms)",
                        result.name,
                        result.message.yellow()
                    );
                } else {
                    line = format!(
                        "    [WARN] {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                }
            }
            CheckStatus::Fail => {
                fail_count += 1;
                if use_color {
                    use colored::Colorize;
                    status_symbol = "✗".red().to_string();
                    line = format!(
                        "    {status_symbol} {:<20} {} ({duration_ms}ms)",
                        result.name,
                        result.message.red()
                    );
                } else {
                    line = format!(
                        "    [FAIL] {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                }
            }
        }

        println!("{line}");
    }

    println!();

    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }

    println!();

    Ok(())
}

/// Check configuration loads without errors.
async fn check_config(config_path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let result = match config_path {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };

    match result {
        Ok(_) => CheckResult {
            name: "Configuration".to_string(),
            status: CheckStatus::Pass,
            message: "valid".to_string(),
            duration: start.elapsed(),
        },
        Err(errors) => CheckResult {
            name: "Configuration".to_string(),
            status: CheckStatus::Fail,
            message: format!("{} error(s)", errors.len()),
            duration: start.elapsed(),
        },
    }
}

/// Check the bridge store file exists and can be opened.
async fn check_bridge_store(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "Bridge store".to_string(),
            status: CheckStatus::Warn,
            message: format!("not found: {db_path} (will be created on first run)"),
            duration: start.elapsed(),
        };
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let query_result: Result<(), tokio_rusqlite::Error> = conn
                .call(|conn| {
                    conn.execute_batch("SELECT 1")?;
                    Ok(())
                })
                .await;

            match query_result {
                Ok(()) => CheckResult {
                    name: "Bridge store".to_string(),
                    status: CheckStatus::Pass,
                    message: "connected".to_string(),
                    duration: start.elapsed(),
                },
                Err(e) => CheckResult {
                    name: "Bridge store".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("query failed: {e}"),
                    duration: start.elapsed(),
                },
            }
        }
        Err(e) => CheckResult {
            name: "Bridge store".to_string(),
            status: CheckStatus::Fail,
            message: format!("open failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Check chat.db is reachable through the iMessage adapter.
async fn check_chat_db(config: &CourierConfig) -> CheckResult {
    let start = Instant::now();
    let adapter = IMessageStore::new(IMessageStoreConfig {
        chat_db_path: config.imessage.chat_db_path.clone(),
        send_retry_count: config.imessage.send_retry_count,
        send_retry_delay_secs: config.imessage.send_retry_delay_secs,
    });

    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult {
            name: "chat.db".to_string(),
            status: CheckStatus::Pass,
            message: format!("readable via {} v{}", adapter.name(), adapter.version()),
            duration: start.elapsed(),
        },
        Ok(HealthStatus::Degraded(reason)) => CheckResult {
            name: "chat.db".to_string(),
            status: CheckStatus::Warn,
            message: reason,
            duration: start.elapsed(),
        },
        Ok(HealthStatus::Unhealthy(reason)) => CheckResult {
            name: "chat.db".to_string(),
            status: CheckStatus::Fail,
            message: reason,
            duration: start.elapsed(),
        },
        Err(e) => CheckResult {
            name: "chat.db".to_string(),
            status: CheckStatus::Fail,
            message: format!("health check failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Check gateway health endpoint.
async fn check_gateway_endpoint(config: &CourierConfig) -> CheckResult {
    let start = Instant::now();
    let host = &config.server.host;
    let port = config.server.port;
    let url = format!("http://{host}:{port}/health");

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult {
                name: "Gateway endpoint".to_string(),
                status: CheckStatus::Fail,
                message: format!("HTTP client error: {e}"),
                duration: start.elapsed(),
            };
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => CheckResult {
            name: "Gateway endpoint".to_string(),
            status: CheckStatus::Pass,
            message: "reachable".to_string(),
            duration: start.elapsed(),
        },
        Ok(resp) => CheckResult {
            name: "Gateway endpoint".to_string(),
            status: CheckStatus::Warn,
            message: format!("status {}", resp.status()),
            duration: start.elapsed(),
        },
        Err(_) => CheckResult {
            name: "Gateway endpoint".to_string(),
            status: CheckStatus::Warn,
            message: format!("not reachable at {url} (service may not be running)"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: SQLite integrity check on the bridge store.
async fn check_store_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "Store integrity".to_string(),
            status: CheckStatus::Warn,
            message: "bridge store not found (skipped)".to_string(),
            duration: start.elapsed(),
        };
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let result: Result<Vec<String>, tokio_rusqlite::Error> = conn
                .call(|conn| {
                    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
                    let rows: Vec<String> = stmt
                        .query_map([], |row| row.get(0))?
                        .filter_map(|r| r.ok())
                        .collect();
                    Ok(rows)
                })
                .await;

            match result {
                Ok(rows) if rows.len() == 1 && rows[0] == "ok" => CheckResult {
                    name: "Store integrity".to_string(),
                    status: CheckStatus::Pass,
                    message: "ok".to_string(),
                    duration: start.elapsed(),
                },
                Ok(rows) => CheckResult {
                    name: "Store integrity".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("{} issue(s) found", rows.len()),
                    duration: start.elapsed(),
                },
                Err(e) => CheckResult {
                    name: "Store integrity".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("check failed: {e}"),
                    duration: start.elapsed(),
                },
            }
        }
        Err(e) => CheckResult {
            name: "Store integrity".to_string(),
            status: CheckStatus::Fail,
            message: format!("open failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: the conversations projection matches the message log.
///
/// Every distinct `conversation_id` in the message log must have exactly
/// one row in the conversations table.
async fn check_store_projection(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "Store projection".to_string(),
            status: CheckStatus::Warn,
            message: "bridge store not found (skipped)".to_string(),
            duration: start.elapsed(),
        };
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let result: Result<(i64, i64, i64), tokio_rusqlite::Error> = conn
                .call(|conn| {
                    let conversations: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM conversations",
                        [],
                        |row| row.get(0),
                    )?;
                    let messages: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM messages",
                        [],
                        |row| row.get(0),
                    )?;
                    let threads: i64 = conn.query_row(
                        "SELECT COUNT(DISTINCT conversation_id) FROM messages",
                        [],
                        |row| row.get(0),
                    )?;
                    Ok((conversations, messages, threads))
                })
                .await;

            match result {
                Ok((conversations, messages, threads)) if conversations == threads => {
                    CheckResult {
                        name: "Store projection".to_string(),
                        status: CheckStatus::Pass,
                        message: format!("{conversations} conversations, {messages} messages"),
                        duration: start.elapsed(),
                    }
                }
                Ok((conversations, _, threads)) => CheckResult {
                    name: "Store projection".to_string(),
                    status: CheckStatus::Fail,
                    message: format!(
                        "drift: {conversations} conversation rows, {threads} message threads"
                    ),
                    duration: start.elapsed(),
                },
                Err(e) => CheckResult {
                    name: "Store projection".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("query failed: {e}"),
                    duration: start.elapsed(),
                },
            }
        }
        Err(e) => CheckResult {
            name: "Store projection".to_string(),
            status: CheckStatus::Fail,
            message: format!("open failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: memory baseline via jemalloc.
async fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        CheckResult {
            name: "Memory baseline".to_string(),
            status: CheckStatus::Pass,
            message: format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            duration: start.elapsed(),
        }
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult {
            name: "Memory baseline".to_string(),
            status: CheckStatus::Warn,
            message: "jemalloc not available on MSVC".to_string(),
            duration: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_result_has_required_fields() {
        let result = CheckResult {
            name: "test".to_string(),
            status: CheckStatus::Pass,
            message: "ok".to_string(),
            duration: Duration::from_millis(5),
        };
        assert_eq!(result.name, "test");
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.message, "ok");
        assert_eq!(result.duration.as_millis(), 5);
    }

    #[test]
    fn check_status_equality() {
        assert_eq!(CheckStatus::Pass, CheckStatus::Pass);
        assert_eq!(CheckStatus::Warn, CheckStatus::Warn);
        assert_eq!(CheckStatus::Fail, CheckStatus::Fail);
        assert_ne!(CheckStatus::Pass, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn check_bridge_store_missing_warns() {
        let result = check_bridge_store("/tmp/nonexistent-courier-test-xyz.db").await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn check_chat_db_missing_fails() {
        let config = CourierConfig {
            imessage: courier_config::model::IMessageConfig {
                chat_db_path: "/tmp/nonexistent-courier-chat-xyz.db".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = check_chat_db(&config).await;
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn check_store_integrity_missing_warns() {
        let result = check_store_integrity("/tmp/nonexistent-courier-test-xyz.db").await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn check_store_projection_counts_real_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("doctor.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        // Create the schema, then release the handle before re-opening.
        let db = courier_store::Database::open(&db_path_str, false).await.unwrap();
        drop(db);

        let result = check_store_projection(&db_path_str).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("0 conversations"));
    }

    #[tokio::test]
    async fn check_memory_baseline_passes() {
        let result = check_memory_baseline().await;
        // On non-MSVC it should pass; on MSVC it warns.
        assert!(result.status == CheckStatus::Pass || result.status == CheckStatus::Warn);
    }
}
