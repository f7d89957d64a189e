//! Core log channel
//!
//! Core callbacks must never block the core, so the sink uses `try_send`
//! and drops messages when the channel is full or the run is over.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mg_core::config::LogSeverity;

/// A log message emitted by the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreLog {
    Access(String),
    Dns(String),
    General {
        severity: LogSeverity,
        message: String,
    },
}

/// Receiving half of the core log channel
pub type LogReceiver = mpsc::Receiver<CoreLog>;

/// Sending half handed to the core for the lifetime of a run
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::Sender<CoreLog>,
    accepting: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded log channel
pub fn log_channel(capacity: usize) -> (LogSink, LogReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = LogSink {
        tx,
        accepting: Arc::new(AtomicBool::new(false)),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, rx)
}

impl LogSink {
    /// Access-log line
    pub fn access(&self, message: impl Into<String>) {
        self.push(CoreLog::Access(message.into()));
    }

    /// DNS-log line
    pub fn dns(&self, message: impl Into<String>) {
        self.push(CoreLog::Dns(message.into()));
    }

    /// General message; empty and `silent` messages are discarded
    pub fn general(&self, severity: LogSeverity, message: impl Into<String>) {
        let message = message.into();
        if severity == LogSeverity::Silent || message.is_empty() {
            return;
        }
        self.push(CoreLog::General { severity, message });
    }

    /// Number of messages dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Start or stop accepting messages; outside a run they are discarded
    pub(crate) fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Release);
    }

    fn push(&self, log: CoreLog) {
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(log) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Drain core logs into `tracing` until cancelled or every sink is gone
pub fn spawn_log_forwarder(mut rx: LogReceiver, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                log = rx.recv() => match log {
                    Some(log) => emit(log),
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("Core log forwarder stopped");
    })
}

fn emit(log: CoreLog) {
    match log {
        CoreLog::Access(message) => tracing::info!(target: "mango::core::access", "{}", message),
        CoreLog::Dns(message) => tracing::info!(target: "mango::core::dns", "{}", message),
        CoreLog::General { severity, message } => match severity {
            LogSeverity::Debug => tracing::debug!(target: "mango::core", "{}", message),
            LogSeverity::Info => tracing::info!(target: "mango::core", "{}", message),
            LogSeverity::Warning => tracing::warn!(target: "mango::core", "{}", message),
            LogSeverity::Error => tracing::error!(target: "mango::core", "{}", message),
            LogSeverity::Silent => {}
        },
    }
}
