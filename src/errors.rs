//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Wrong token count or a non-numeric token where a number was expected.
    Parse(String),
    /// A parsed value lies outside its declared range.
    Validation(String),
    /// Framing failure or unexpected end of stream on the OPI connection.
    Protocol(String),
    /// A bounded read on the OPI connection expired.
    Timeout(String),
    /// Socket or file-system I/O failure.
    Io(String),
}

impl AppError {
    /// Whether this error rejects client-supplied parameters rather than
    /// the transport itself.
    ///
    /// Parameter errors are reported to the client and the session keeps
    /// running; every other error ends the session.
    #[must_use]
    pub fn is_parameter_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
