//! Error and result type for SMTP clients

use self::Error::*;
use crate::response::{Category, Response, Severity};
use crate::types::EmailAddress;
use base64::DecodeError;
use std::io;
use std::net::AddrParseError;
use std::string::FromUtf8Error;

/// Coarse classification of an [`Error`], matching the taxonomy every
/// internally raised error is expected to carry: `code` together with the
/// originating command and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// DNS resolution failed with no usable cache.
    Dns,
    /// TCP connect failed, or an established connection closed unexpectedly.
    Connection,
    /// One of the connect/greeting/socket/DNS timeouts elapsed.
    TimedOut,
    /// `STARTTLS` handshake failure.
    Tls,
    /// Malformed response, or an unexpected status code at a given stage.
    Protocol,
    /// Authentication was refused, the mechanism is unsupported, or credentials were rejected.
    Auth,
    /// Bad address, all recipients rejected, or a size-limit violation at envelope time.
    Envelope,
    /// `DATA` was rejected, or a stream error occurred while sending it.
    Message,
    /// A content stream error occurred upstream of the wire.
    Stream,
    /// A low-level socket error.
    Socket,
    /// The server requires authentication but none was configured.
    NoAuth,
    /// A pooled resource hit its configured message limit.
    MaxLimit,
}

/// An enum of all error kinds.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Transient SMTP error, 4xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    #[error("transient: {}", if .0.message.is_empty() { "undetailed error during SMTP transaction".to_string() } else { .0.message.join("; ") })]
    Transient(Response),
    /// Permanent SMTP error, 5xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    #[error("permanent: {}", if .0.message.is_empty() { "undetailed error during SMTP transaction".to_string() } else { .0.message.join("; ") })]
    Permanent(Response),
    /// Error parsing a response
    #[error("{0}")]
    ResponseParsing(&'static str),
    /// Error parsing a base64 string in response
    #[error("challenge parsing: {0}")]
    ChallengeParsing(#[from] DecodeError),
    /// Error parsing UTF8in response
    #[error("utf8: {0}")]
    Utf8Parsing(#[from] FromUtf8Error),
    /// Internal client error
    #[error("client: {0}")]
    Client(&'static str),
    /// DNS resolution error
    #[error("could not resolve hostname")]
    Resolution,
    /// IO error
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// TLS error
    #[error("tls: {0}")]
    Tls(#[from] async_native_tls::Error),
    #[cfg(feature = "runtime-tokio")]
    /// Timeout error
    #[error("timeout: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[cfg(feature = "runtime-async-std")]
    /// Timeout error
    #[error("timeout: {0}")]
    Timeout(#[from] async_std::future::TimeoutError),
    /// Failure to parse email address.
    #[error("address parse error: {0}")]
    AddrParseError(#[from] AddrParseError),
    /// Every recipient was rejected; carries each rejected address alongside
    /// the response that rejected it.
    #[error("all {} recipient(s) were rejected", .0.len())]
    AllRecipientsRejected(Vec<(EmailAddress, Response)>),
    /// The message is larger than the server-advertised `SIZE` limit.
    #[error("message size {size} exceeds the server's maximum of {max}")]
    MessageTooLarge {
        /// The message's size, in bytes.
        size: usize,
        /// The server-advertised maximum, in bytes.
        max: usize,
    },
}

impl Error {
    /// Classifies this error per the engine's error taxonomy.
    pub fn code(&self) -> ErrorCode {
        match self {
            Transient(response) | Permanent(response) => classify_response(response),
            ResponseParsing(_) | Client(_) | Utf8Parsing(_) => ErrorCode::Protocol,
            ChallengeParsing(_) => ErrorCode::Auth,
            Resolution => ErrorCode::Dns,
            Io(_) => ErrorCode::Connection,
            Tls(_) => ErrorCode::Tls,
            Timeout(_) => ErrorCode::TimedOut,
            AddrParseError(_) => ErrorCode::Envelope,
            AllRecipientsRejected(_) => ErrorCode::Envelope,
            MessageTooLarge { .. } => ErrorCode::Message,
        }
    }
}

fn classify_response(response: &Response) -> ErrorCode {
    match response.code.category {
        Category::MailSystem => ErrorCode::Envelope,
        Category::Connections => ErrorCode::Connection,
        _ => ErrorCode::Protocol,
    }
}

impl From<Response> for Error {
    fn from(response: Response) -> Error {
        match response.code.severity {
            Severity::TransientNegativeCompletion => Transient(response),
            Severity::PermanentNegativeCompletion => Permanent(response),
            _ => Client("Unknown error code"),
        }
    }
}

impl From<&'static str> for Error {
    fn from(string: &'static str) -> Error {
        Client(string)
    }
}

/// SMTP result type
pub type SmtpResult = Result<Response, Error>;

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::{Category, Code, Detail, Response, Severity};

    #[test]
    fn test_error_response_to_string() {
        let err = Error::Permanent(Response::new(
            Code::new(
                Severity::PermanentNegativeCompletion,
                Category::Information,
                Detail::Zero,
            ),
            vec![
                "gmx.net (mxgmx117) Nemesis ESMTP Service not available".to_string(),
                "No SMTP service".to_string(),
                "IP address is block listed.".to_string(),
                "For explanation visit https://www.gmx.net/mail/senderguidelines?c=bl".to_string(),
            ],
        ));
        assert_eq!(format!("{}", err), "permanent: gmx.net (mxgmx117) Nemesis ESMTP Service not available; No SMTP service; IP address is block listed.; For explanation visit https://www.gmx.net/mail/senderguidelines?c=bl".to_string());
    }

    #[test]
    fn mail_system_reply_classifies_as_envelope() {
        let err = Error::Permanent(Response::new(
            Code::new(Severity::PermanentNegativeCompletion, Category::MailSystem, Detail::Zero),
            vec!["no such user".to_string()],
        ));
        assert_eq!(err.code(), ErrorCode::Envelope);
    }

    #[test]
    fn all_recipients_rejected_classifies_as_envelope() {
        let address = EmailAddress::new("nobody@example.com".to_string()).unwrap();
        let response = Response::new(Code::new(Severity::PermanentNegativeCompletion, Category::MailSystem, Detail::Zero), vec![]);
        let err = Error::AllRecipientsRejected(vec![(address, response)]);
        assert_eq!(err.code(), ErrorCode::Envelope);
    }

    #[test]
    fn message_too_large_classifies_as_message() {
        let err = Error::MessageTooLarge { size: 100, max: 10 };
        assert_eq!(err.code(), ErrorCode::Message);
    }

    #[test]
    fn timeout_classifies_as_timed_out() {
        assert_eq!(Error::Resolution.code(), ErrorCode::Dns);
    }
}
