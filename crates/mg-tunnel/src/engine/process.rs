//! Proxy core backed by an external Xray-compatible executable
//!
//! The cached subscription payload, the generated inbound and the generated
//! log section are passed as three `-c` config files; the core merges them.
//! Startup is confirmed by the core's `core: Xray <version> started` line on
//! stdout. Both output pipes are drained from spawn until the child is gone.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

use mg_core::config::{CoreConfig, LogSeverity};
use mg_core::error::CoreError;

use super::{CoreLog, LogSink, ProxyCore};
use crate::compile::{CompiledConfig, LogDirectives};

const INBOUND_FILE: &str = "inbound.json";
const LOG_FILE: &str = "log.json";
const ASSET_ENV: &str = "XRAY_LOCATION_ASSET";
/// How long a core that closed stdout gets to exit before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(1);
/// Stderr kept for the failure detail
const STDERR_CAPTURE: usize = 16 * 1024;

/// Runs the core as a child process
pub struct ProcessCore {
    binary: PathBuf,
    asset_dir: Option<PathBuf>,
    run_dir: PathBuf,
    startup_timeout: Duration,
    running: Mutex<Option<RunningCore>>,
}

struct RunningCore {
    child: Child,
    readers: Vec<AbortHandle>,
}

impl ProcessCore {
    /// Create a core runner writing its generated files into `run_dir`
    pub fn new(config: &CoreConfig, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: config.binary.clone(),
            asset_dir: config.asset_dir.clone(),
            run_dir: run_dir.into(),
            startup_timeout: config.startup_timeout,
            running: Mutex::new(None),
        }
    }

    /// Write the generated inbound and log fragments
    async fn write_fragments(&self, config: &CompiledConfig) -> Result<(PathBuf, PathBuf), CoreError> {
        tokio::fs::create_dir_all(&self.run_dir)
            .await
            .map_err(|e| CoreError::new(format!("create {:?}: {}", self.run_dir, e)))?;

        let inbound = json!({ "inbounds": [&config.inbound] });
        let inbound_path = self.run_dir.join(INBOUND_FILE);
        write_json(&inbound_path, &inbound).await?;

        let log_path = self.run_dir.join(LOG_FILE);
        write_json(&log_path, &log_document(&config.log)).await?;

        Ok((inbound_path, log_path))
    }
}

#[async_trait]
impl ProxyCore for ProcessCore {
    async fn start(&self, config: &CompiledConfig, logs: LogSink) -> Result<(), CoreError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(CoreError::new("core process is already running"));
        }

        let (inbound_path, log_path) = self.write_fragments(config).await?;

        let mut command = Command::new(&self.binary);
        command
            .arg("run")
            .arg("-c")
            .arg(&config.config_path)
            .arg("-c")
            .arg(&inbound_path)
            .arg("-c")
            .arg(&log_path)
            .current_dir(&self.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(asset_dir) = &self.asset_dir {
            command.env(ASSET_ENV, asset_dir);
        }

        tracing::debug!("Spawning {:?}", command);
        let mut child = command
            .spawn()
            .map_err(|e| CoreError::new(format!("failed to launch {:?}: {}", self.binary, e)))?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill().await;
                return Err(CoreError::new("core output pipes unavailable"));
            }
        };

        let mut stderr_reader = tokio::spawn(drain_stderr(stderr, logs.clone()));
        let mut stdout = BufReader::new(stdout);
        let mut seen = Vec::new();
        let confirmed = tokio::time::timeout(self.startup_timeout, async {
            let mut buf = Vec::new();
            while let Ok(Some(line)) = read_line_lossy(&mut stdout, &mut buf).await {
                let started = is_startup_line(&line);
                forward_line(&logs, &line);
                seen.push(line);
                if started {
                    return true;
                }
            }
            false
        })
        .await;

        match confirmed {
            Ok(true) => {
                let stdout_reader = tokio::spawn(forward_lines(stdout, logs));
                let readers = vec![stdout_reader.abort_handle(), stderr_reader.abort_handle()];
                *running = Some(RunningCore { child, readers });
                Ok(())
            }
            Ok(false) => {
                let status = match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                    Ok(Ok(status)) => Some(status),
                    _ => {
                        let _ = child.kill().await;
                        None
                    }
                };
                let stderr_text = captured_stderr(&mut stderr_reader).await;
                Err(CoreError::new(failure_detail(&seen, &stderr_text, status)))
            }
            Err(_) => {
                let _ = child.kill().await;
                stderr_reader.abort();
                Err(CoreError::new(format!(
                    "core did not report startup within {:?}",
                    self.startup_timeout
                )))
            }
        }
    }

    async fn stop(&self) {
        let Some(mut core) = self.running.lock().await.take() else {
            return;
        };

        if let Err(e) = core.child.kill().await {
            tracing::warn!("Failed to kill core process: {}", e);
        }
        for reader in core.readers {
            reader.abort();
        }
    }
}

async fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), CoreError> {
    let text = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::new(format!("encode {:?}: {}", path, e)))?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| CoreError::new(format!("write {:?}: {}", path, e)))
}

/// The core's native `log` section for the given directives
fn log_document(log: &LogDirectives) -> serde_json::Value {
    let level = match log.error_severity {
        LogSeverity::Silent => "none",
        severity => severity.as_str(),
    };
    json!({
        "log": {
            "access": if log.access_log { "" } else { "none" },
            "dnsLog": log.dns_log,
            "loglevel": level,
        }
    })
}

fn failure_detail(
    stdout: &[String],
    stderr: &str,
    status: Option<std::process::ExitStatus>,
) -> String {
    let mut parts: Vec<&str> = stdout.iter().map(String::as_str).collect();
    if !stderr.trim().is_empty() {
        parts.push(stderr.trim());
    }

    if parts.is_empty() {
        match status {
            Some(status) => format!("core exited with {}", status),
            None => "core exited before reporting startup".to_string(),
        }
    } else {
        parts.join("\n")
    }
}

/// Read one line, replacing invalid UTF-8; `None` at end of stream
async fn read_line_lossy<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn forward_lines<R: AsyncBufRead + Unpin>(mut reader: R, logs: LogSink) {
    let mut buf = Vec::new();
    while let Ok(Some(line)) = read_line_lossy(&mut reader, &mut buf).await {
        forward_line(&logs, &line);
    }
    tracing::debug!("Core output stream closed");
}

/// Forward stderr for the life of the child, keeping its head for errors
async fn drain_stderr<R: AsyncRead + Unpin>(reader: R, logs: LogSink) -> String {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    while let Ok(Some(line)) = read_line_lossy(&mut reader, &mut buf).await {
        if captured.len() < STDERR_CAPTURE {
            captured.push_str(&line);
            captured.push('\n');
        }
        forward_line(&logs, &line);
    }
    captured
}

async fn captured_stderr(reader: &mut JoinHandle<String>) -> String {
    match tokio::time::timeout(EXIT_GRACE, &mut *reader).await {
        Ok(Ok(text)) => text,
        _ => {
            reader.abort();
            String::new()
        }
    }
}

/// Whether a stdout line is the core's startup banner
fn is_startup_line(line: &str) -> bool {
    strip_timestamp(line.trim()).starts_with('[')
        && matches!(
            classify_line(line),
            Some(CoreLog::General { message, .. })
                if message.starts_with("core: ") && message.ends_with(" started")
        )
}

fn forward_line(logs: &LogSink, line: &str) {
    match classify_line(line) {
        Some(CoreLog::Access(message)) => logs.access(message),
        Some(CoreLog::Dns(message)) => logs.dns(message),
        Some(CoreLog::General { severity, message }) => logs.general(severity, message),
        None => {}
    }
}

/// Classify one line of core output
///
/// Lines look like `2024/01/02 15:04:05 [Warning] core: Xray 1.8.4 started`
/// for general and DNS messages and `2024/01/02 15:04:05 from 127.0.0.1:5000
/// accepted tcp:example.com:443 [socks-in -> proxy]` for access entries.
pub fn classify_line(line: &str) -> Option<CoreLog> {
    let body = strip_timestamp(line.trim());
    if body.is_empty() {
        return None;
    }

    if let Some(rest) = body.strip_prefix('[') {
        if let Some((level, message)) = rest.split_once(']') {
            let message = message.trim_start().to_string();
            if message.starts_with("app/dns:") {
                return Some(CoreLog::Dns(message));
            }
            let severity = level.parse().unwrap_or(LogSeverity::Info);
            return Some(CoreLog::General { severity, message });
        }
    }

    if body.contains(" accepted ") || body.contains(" rejected ") {
        return Some(CoreLog::Access(body.to_string()));
    }

    Some(CoreLog::General {
        severity: LogSeverity::Info,
        message: body.to_string(),
    })
}

fn strip_timestamp(line: &str) -> &str {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), Some(rest)) if is_date(date) && time.contains(':') => rest,
        _ => line,
    }
}

fn is_date(token: &str) -> bool {
    token.len() == 10 && token.chars().all(|c| c.is_ascii_digit() || c == '/')
}
