//! Observability side channel.
//!
//! Components describe what they are doing with [`LogMessage`]s delivered to
//! an optional [`LogSink`]. Messages are informational only: control flow
//! never depends on them, and a missing sink changes nothing. Every message
//! is also mirrored to `tracing`.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// Severity of a [`LogMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One human-readable event for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub text: String,
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub timestamp: UtcDateTime,
}

impl LogMessage {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level,
            timestamp: UtcDateTime::now(),
        }
    }
}

/// Receiver of log messages. Implementations must not block.
pub trait LogSink: Send + Sync {
    fn emit(&self, message: LogMessage);
}

impl<F> LogSink for F
where
    F: Fn(LogMessage) + Send + Sync,
{
    fn emit(&self, message: LogMessage) {
        self(message)
    }
}

/// Bounded in-memory sink keeping the most recent messages, newest last.
#[derive(Debug)]
pub struct BufferedLogSink {
    capacity: usize,
    messages: Mutex<VecDeque<LogMessage>>,
}

impl BufferedLogSink {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages
            .lock()
            .expect("log buffer lock is not poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .expect("log buffer lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .expect("log buffer lock is not poisoned")
            .clear();
    }
}

impl Default for BufferedLogSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl LogSink for BufferedLogSink {
    fn emit(&self, message: LogMessage) {
        let mut messages = self
            .messages
            .lock()
            .expect("log buffer lock is not poisoned");
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }
}

/// Fire-and-forget front end over an optional sink.
#[derive(Clone, Default)]
pub struct LogEmitter {
    sink: Option<Arc<dyn LogSink>>,
}

impl LogEmitter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, level: LogLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            LogLevel::Info | LogLevel::Success => tracing::info!(target: "tickfresh::log", "{text}"),
            LogLevel::Warning => tracing::warn!(target: "tickfresh::log", "{text}"),
            LogLevel::Error => tracing::error!(target: "tickfresh::log", "{text}"),
        }

        if let Some(sink) = &self.sink {
            sink.emit(LogMessage::new(level, text));
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(LogLevel::Info, text);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.emit(LogLevel::Success, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.emit(LogLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(LogLevel::Error, text);
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter")
            .field("attached", &self.is_attached())
            .finish()
    }
}
