// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery through Messages.app via AppleScript.
//!
//! The script is piped to `osascript -` on stdin, which sidesteps shell
//! quoting entirely; only AppleScript string escaping applies.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use courier_core::CourierError;

/// Escape a string for interpolation inside an AppleScript string literal.
pub(crate) fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Build the send script: text first, then one `send` per attachment.
pub(crate) fn build_send_script(recipient: &str, body: &str, attachments: &[String]) -> String {
    let recipient = escape_applescript(recipient);
    let mut script = format!(
        "tell application \"Messages\"\n\
         \tset targetService to 1st account whose service type = iMessage\n\
         \tset targetBuddy to participant \"{recipient}\" of targetService\n"
    );
    if !body.is_empty() {
        let body = escape_applescript(body);
        script.push_str(&format!("\tsend \"{body}\" to targetBuddy\n"));
    }
    for path in attachments {
        let path = escape_applescript(path);
        script.push_str(&format!(
            "\tsend POSIX file \"{path}\" to targetBuddy\n"
        ));
    }
    script.push_str("end tell\n");
    script
}

/// Run an AppleScript through `osascript`, retrying failed runs with
/// exponentially growing delays.
///
/// A missing or unspawnable `osascript` is an adapter problem
/// ([`CourierError::AdapterUnavailable`]); a script that keeps exiting
/// nonzero after all retries is a rejection carrying the script's stderr.
pub(crate) async fn run_osascript(
    script: &str,
    retry_count: u32,
    retry_delay: Duration,
) -> Result<(), CourierError> {
    let mut last_stderr = String::new();

    for attempt in 0..retry_count {
        debug!(attempt = attempt + 1, retry_count, "running osascript");

        let mut child = tokio::process::Command::new("osascript")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CourierError::AdapterUnavailable {
                message: format!("failed to spawn osascript: {e}"),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| CourierError::AdapterUnavailable {
                    message: format!("failed to write script to osascript: {e}"),
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CourierError::AdapterUnavailable {
                message: format!("osascript did not complete: {e}"),
            })?;

        if output.status.success() {
            info!(attempt = attempt + 1, "osascript send succeeded");
            return Ok(());
        }

        last_stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code().unwrap_or(-1);
        error!(exit_code, stderr = %last_stderr, "osascript failed");

        if attempt + 1 < retry_count {
            let delay = retry_delay * 2u32.pow(attempt);
            debug!(delay_secs = delay.as_secs_f64(), "retrying send");
            tokio::time::sleep(delay).await;
        }
    }

    Err(CourierError::SendRejected {
        message: if last_stderr.is_empty() {
            "osascript exited nonzero".to_string()
        } else {
            last_stderr
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_backslash_before_quote() {
        assert_eq!(escape_applescript(r#"a\"b"#), r#"a\\\"b"#);
    }

    #[test]
    fn escapes_newlines_and_carriage_returns() {
        assert_eq!(escape_applescript("line1\nline2\r"), "line1\\nline2\\r");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(escape_applescript("hello there"), "hello there");
    }

    #[test]
    fn script_targets_recipient_and_sends_body() {
        let script = build_send_script("+15550001111", "hi \"you\"", &[]);
        assert!(script.contains("participant \"+15550001111\" of targetService"));
        assert!(script.contains("send \"hi \\\"you\\\"\" to targetBuddy"));
        assert!(script.starts_with("tell application \"Messages\""));
        assert!(script.trim_end().ends_with("end tell"));
    }

    #[test]
    fn script_sends_each_attachment_as_posix_file() {
        let attachments = vec!["/tmp/a.png".to_string(), "/tmp/b.pdf".to_string()];
        let script = build_send_script("+15550001111", "", &attachments);
        assert!(!script.contains("send \"\""));
        assert!(script.contains("send POSIX file \"/tmp/a.png\" to targetBuddy"));
        assert!(script.contains("send POSIX file \"/tmp/b.pdf\" to targetBuddy"));
    }
}
