use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Structured failure classification carried by every [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The attempt exceeded its deadline.
    Timeout,
    /// Connection refused, reset or otherwise dropped.
    Connection,
    /// Host name could not be resolved.
    Dns,
    /// Other network-level failure (offline, unreachable).
    Network,
    /// The server answered with a non-success status.
    Http(u16),
    /// The operation was cancelled cooperatively.
    Cancelled,
    Other,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Connection
                | ErrorKind::Dns
                | ErrorKind::Network
        )
    }

    /// Classify a free-form failure message.
    ///
    /// Fetchers that only surface text (wrapped platform exceptions) go
    /// through here; matching is case-insensitive.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("unable to resolve host") {
            ErrorKind::Dns
        } else if lower.contains("timeout") {
            ErrorKind::Timeout
        } else if lower.contains("failed to connect")
            || lower.contains("connection")
        {
            ErrorKind::Connection
        } else if lower.contains("network") {
            ErrorKind::Network
        } else {
            ErrorKind::Other
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => f.write_str("timeout"),
            ErrorKind::Connection => f.write_str("connection"),
            ErrorKind::Dns => f.write_str("dns"),
            ErrorKind::Network => f.write_str("network"),
            ErrorKind::Http(status) => write!(f, "http {status}"),
            ErrorKind::Cancelled => f.write_str("cancelled"),
            ErrorKind::Other => f.write_str("other"),
        }
    }
}

/// Failure returned by fetchers, resolvers and asset loaders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    kind: ErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error from message text alone, classifying it by content.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::classify(&message),
            message,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("request timed out after {}ms", after.as_millis()),
        )
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn dns(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dns, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Http(status), message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled")
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let kind = match err.kind() {
            Io::TimedOut => ErrorKind::Timeout,
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::BrokenPipe => ErrorKind::Connection,
            Io::HostUnreachable | Io::NetworkUnreachable | Io::NetworkDown => {
                ErrorKind::Network
            }
            _ => ErrorKind::classify(&err.to_string()),
        };
        Self::new(kind, err.to_string())
    }
}
