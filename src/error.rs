use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    /// No session, or the remote rejected the bearer token (HTTP 401).
    Unauthorized,
    Remote { status: u16, body: String },
    Timeout,
    Decode { path: String, source: serde_json::Error },
    InvalidZone(u32),
    InvalidPreset(String),
    /// A setpoint that cannot be encoded, such as NaN or infinity.
    InvalidTemperature(f64),
    Io(std::io::Error),
}

impl Error {
    /// True when the owner has to re-authenticate before calls can succeed.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Unauthorized => write!(f, "unauthorized"),
            Error::Remote { status, body } => write!(f, "remote error {status}: {body}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Decode { path, source } => write!(f, "invalid response from {path}: {source}"),
            Error::InvalidZone(id) => write!(f, "invalid zone: {id}"),
            Error::InvalidPreset(name) => write!(f, "invalid preset: {name}"),
            Error::InvalidTemperature(t) => write!(f, "invalid temperature: {t}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Decode { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a failed coordinator refresh.
///
/// Cloneable so that callers coalesced into a running refresh all receive
/// the same outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Credentials were rejected. Automatic polling has stopped.
    AuthFailed(String),
    /// Transient failure; the previous snapshot is still served.
    UpdateFailed(String),
    Timeout(Duration),
    /// The coordinator was shut down.
    Stopped,
}

impl RefreshError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RefreshError::AuthFailed(_))
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::AuthFailed(msg) => write!(f, "authentication failed: {msg}"),
            RefreshError::UpdateFailed(msg) => write!(f, "error communicating with API: {msg}"),
            RefreshError::Timeout(d) => write!(f, "refresh timed out after {d:?}"),
            RefreshError::Stopped => write!(f, "coordinator stopped"),
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<Error> for RefreshError {
    fn from(e: Error) -> Self {
        match e {
            Error::Unauthorized => RefreshError::AuthFailed(e.to_string()),
            other => RefreshError::UpdateFailed(other.to_string()),
        }
    }
}
