//! Request-line parsing into a closed command type.

use std::fmt;

/// `OPI_GET_METRICS` command word.
pub const GET_METRICS: &str = "OPI_GET_METRICS";
/// `OPI_SET_BACKGROUND` command word.
pub const SET_BACKGROUND: &str = "OPI_SET_BACKGROUND";
/// `OPI_PRESENT` command word.
pub const PRESENT: &str = "OPI_PRESENT";
/// `OPI_CLOSE` command word.
pub const CLOSE: &str = "OPI_CLOSE";

/// One protocol request.
///
/// Parameter-carrying variants keep their raw tokens; validation happens
/// in the dispatcher so failures can be reported in protocol terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report device metrics.
    GetMetrics,
    /// Replace the background with the given 18 tokens.
    SetBackground(Vec<String>),
    /// Start a presentation with the given global tokens.
    Present(Vec<String>),
    /// Reset the background and end the session.
    Close,
    /// Any other command word.
    Unknown(String),
}

impl Command {
    /// Parse a request line; blank lines yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?;
        let params = || words.map(str::to_owned).collect::<Vec<_>>();

        Some(match name {
            GET_METRICS => Self::GetMetrics,
            SET_BACKGROUND => Self::SetBackground(params()),
            PRESENT => Self::Present(params()),
            CLOSE => Self::Close,
            other => Self::Unknown(other.to_owned()),
        })
    }

    /// Command word as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::GetMetrics => GET_METRICS,
            Self::SetBackground(_) => SET_BACKGROUND,
            Self::Present(_) => PRESENT,
            Self::Close => CLOSE,
            Self::Unknown(name) => name,
        }
    }
}

/// Formats the request line (without terminator).
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetBackground(params) | Self::Present(params) if !params.is_empty() => {
                write!(f, "{} {}", self.name(), params.join(" "))
            }
            _ => f.write_str(self.name()),
        }
    }
}
