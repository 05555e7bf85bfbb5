//! Tunnel exposure through a supervised ngrok agent process

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::ExposureManager;
use crate::config::ExposureConfig;
use crate::error::{AppError, Result};

/// Runs `ngrok http <port>` with JSON logs on stdout and waits for the
/// `started tunnel` record to learn the public URL.
pub struct NgrokExposure {
    binary: String,
    auth_token: Option<String>,
    hostname: Option<String>,
    startup_timeout: Duration,
    child: Mutex<Option<Child>>,
}

/// What a single agent log line tells us
#[derive(Debug, PartialEq, Eq)]
enum LogEvent {
    TunnelStarted(String),
    Error(String),
    Other,
}

impl NgrokExposure {
    pub fn new(config: &ExposureConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            auth_token: config.auth_token.clone(),
            hostname: config.hostname.clone(),
            startup_timeout: config.startup_timeout(),
            child: Mutex::new(None),
        }
    }

    fn command_args(&self, port: u16) -> Vec<String> {
        let mut args = vec![
            "http".to_string(),
            port.to_string(),
            "--log".to_string(),
            "stdout".to_string(),
            "--log-format".to_string(),
            "json".to_string(),
        ];
        if let Some(hostname) = &self.hostname {
            args.push("--domain".to_string());
            args.push(hostname.clone());
        }
        args
    }
}

#[async_trait]
impl ExposureManager for NgrokExposure {
    fn name(&self) -> &str {
        "ngrok"
    }

    async fn connect(&self, port: u16) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.command_args(port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Passed through the environment so the token stays out of the process list
        if let Some(token) = &self.auth_token {
            cmd.env("NGROK_AUTHTOKEN", token);
        }

        debug!(binary = %self.binary, port = port, "Spawning ngrok agent");

        let mut child = cmd.spawn().map_err(|e| {
            AppError::Exposure(format!("Failed to spawn {}: {}", self.binary, e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Exposure("ngrok stdout was not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        let url = match timeout(self.startup_timeout, wait_for_tunnel(&mut lines)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                child.kill().await.ok();
                return Err(e);
            }
            Err(_) => {
                child.kill().await.ok();
                return Err(AppError::Exposure(format!(
                    "ngrok did not start a tunnel within {}s",
                    self.startup_timeout.as_secs()
                )));
            }
        };

        // Keep draining the pipe so the agent never blocks on a full stdout
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                if let LogEvent::Error(message) = parse_log_line(&line) {
                    warn!(error = %message, "ngrok agent error");
                } else {
                    debug!(line = %line, "ngrok");
                }
            }
        });

        *self.child.lock().await = Some(child);
        info!(url = %url, port = port, "Tunnel established");
        Ok(url)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(mut child) = self.child.lock().await.take() {
            child.kill().await?;
            info!("Tunnel disconnected");
        }
        Ok(())
    }
}

async fn wait_for_tunnel(lines: &mut Lines<BufReader<ChildStdout>>) -> Result<String> {
    let mut last_error = None;

    while let Some(line) = lines.next_line().await? {
        match parse_log_line(&line) {
            LogEvent::TunnelStarted(url) => return Ok(url),
            LogEvent::Error(message) => {
                warn!(error = %message, "ngrok agent error during startup");
                last_error = Some(message);
            }
            LogEvent::Other => {}
        }
    }

    Err(AppError::Exposure(match last_error {
        Some(message) => format!("ngrok exited before starting a tunnel: {}", message),
        None => "ngrok exited before starting a tunnel".to_string(),
    }))
}

fn parse_log_line(line: &str) -> LogEvent {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return LogEvent::Other;
    };

    let msg = value.get("msg").and_then(Value::as_str);

    if msg == Some("started tunnel") {
        if let Some(url) = value.get("url").and_then(Value::as_str) {
            return LogEvent::TunnelStarted(url.to_string());
        }
    }

    match value.get("lvl").and_then(Value::as_str) {
        Some("eror") | Some("crit") => LogEvent::Error(
            value
                .get("err")
                .and_then(Value::as_str)
                .or(msg)
                .unwrap_or(line)
                .to_string(),
        ),
        _ => LogEvent::Other,
    }
}
