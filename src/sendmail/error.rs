//! Error and result type for the sendmail transport.

use std::io;
use std::string::FromUtf8Error;

/// An enum of all error kinds.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Internal client error
    #[error("client error: {0}")]
    Client(String),
    /// Error parsing UTF8 in the child process's output
    #[error("utf8 error: {0}")]
    Utf8Parsing(#[from] FromUtf8Error),
    /// IO error spawning or writing to the child process
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Sendmail transport result type.
pub type SendmailResult = Result<(), Error>;
