//! OPI line protocol.
//!
//! Newline-delimited ASCII over TCP. Each request line is a command word
//! optionally followed by space-separated parameter tokens; each reply
//! field is written and flushed as its own line.
//!
//! | Command              | Reply                                          |
//! |----------------------|------------------------------------------------|
//! | `OPI_GET_METRICS`    | 9 lines of device metrics                      |
//! | `OPI_SET_BACKGROUND` | `OK` or an error line                          |
//! | `OPI_PRESENT`        | `OK` per accepted line, then error/seen/latency|
//! | `OPI_CLOSE`          | `OK`; the session ends                         |
//!
//! Unknown commands get no reply unless configured otherwise.

pub mod codec;
pub mod command;
pub mod connection;
pub mod dispatcher;
pub mod server;

/// Positive acknowledgement line.
pub const OK: &str = "OK";

/// Reply to a rejected `OPI_SET_BACKGROUND`.
pub const BACKGROUND_INVALID: &str = "OPI server: Background parameters are not valid";

/// Reply to a rejected `OPI_PRESENT` global line.
pub const GLOBAL_INVALID: &str = "OPI server: Global stimulus parameters are not valid";

/// Reply to a rejected `OPI_PRESENT` step line.
pub const STEP_INVALID: &str = "OPI server: Step parameters are not valid";

/// Reply when a step line does not arrive in time.
pub const STEP_TIMEOUT: &str = "OPI server: Timed out waiting for step parameters";

/// Prefix of the optional reply to an unknown command.
pub const UNKNOWN_COMMAND: &str = "OPI server: Unknown command";

/// Split a parameter string into tokens on runs of whitespace.
#[must_use]
pub fn tokenize(params: &str) -> Vec<&str> {
    params.split_whitespace().collect()
}
