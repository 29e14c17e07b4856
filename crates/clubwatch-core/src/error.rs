//! Error types for the clubwatch pipeline
//!
//! Adapter failures ([`FetchError`]) and notifier failures ([`NotifyError`])
//! are plain values returned to the engine. The engine is the only place that
//! decides whether an error skips a source for one cycle or stops the process.

use thiserror::Error;

/// Result type alias for clubwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single source adapter invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection failure or non-2xx status
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload did not have the expected shape
    #[error("format error: {0}")]
    Format(String),

    /// Form tokens or roster table missing from the remote page
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Short class name used in log lines
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Format(_) => "format",
            Self::Protocol(_) => "protocol",
        }
    }
}

/// Failure of a notification send
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Credentials rejected. Fatal: the process must stop.
    #[error("notifier authentication failed: {0}")]
    Auth(String),

    /// Rate limited or forbidden. Retried on the next cycle.
    #[error("notifier rate limited or forbidden: {0}")]
    RateLimitOrForbidden(String),

    /// Any other send failure. Retried on the next cycle.
    #[error("notifier transient error: {0}")]
    Transient(String),
}

impl NotifyError {
    /// Whether this error must terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Short class name used in log lines
    pub fn class(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::RateLimitOrForbidden(_) => "rate_limit_or_forbidden",
            Self::Transient(_) => "transient",
        }
    }
}

/// Core error type for clubwatch
#[derive(Error, Debug)]
pub enum Error {
    /// Source adapter errors
    #[error("Source error: {0}")]
    Fetch(#[from] FetchError),

    /// Notifier errors
    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the process must stop on this error
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Notify(e) => e.is_fatal(),
            Self::Config(_) => true,
            _ => false,
        }
    }
}
