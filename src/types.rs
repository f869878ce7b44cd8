use std::ffi::OsStr;
use std::fmt::{self, Display, Formatter};
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

#[cfg(feature = "runtime-async-std")]
use async_std::io::{Cursor, Read, ReadExt};
use futures::io;
use pin_project::pin_project;
#[cfg(feature = "runtime-tokio")]
use std::io::Cursor;
#[cfg(feature = "runtime-tokio")]
use tokio::io::{AsyncRead as Read, AsyncReadExt as ReadExt};

/// Error building an [`EmailAddress`] or [`Envelope`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The address contained a control character, whitespace, or `<`/`>`.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    /// An envelope was built with no recipients.
    #[error("envelope must have at least one recipient")]
    MissingRecipient,
}

/// Envelope (bare-ASCII, wire-level) email address, distinct from the
/// display-name-bearing [`crate::address::Address`] used in header values.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates new email address, checking that it does not contain invalid characters.
    pub fn new(address: String) -> Result<EmailAddress, Error> {
        // Do basic checks to avoid injection of control characters into SMTP protocol.  Actual
        // email validation should be done by the server.
        if address.chars().any(|c| {
            !c.is_ascii() || c.is_ascii_control() || c.is_ascii_whitespace() || c == '<' || c == '>'
        }) {
            return Err(Error::InvalidAddress(address));
        }

        Ok(EmailAddress(address))
    }

    /// Does this address contain any non-ASCII bytes? Used to decide whether
    /// `SMTPUTF8` must be requested for the envelope carrying it.
    pub fn is_ascii(&self) -> bool {
        self.0.is_ascii()
    }
}

impl FromStr for EmailAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailAddress::new(s.to_string())
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<OsStr> for EmailAddress {
    fn as_ref(&self) -> &OsStr {
        self.0.as_ref()
    }
}

/// Simple email envelope representation
///
/// We only accept mailboxes, and do not support source routes (as per RFC).
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipients' addresses
    ///
    /// This can not be empty.
    forward_path: Vec<EmailAddress>,
    /// The envelope sender address
    reverse_path: Option<EmailAddress>,
}

impl Envelope {
    /// Creates a new envelope, which may fail if `to` is empty.
    pub fn new(from: Option<EmailAddress>, to: Vec<EmailAddress>) -> Result<Envelope, Error> {
        if to.is_empty() {
            return Err(Error::MissingRecipient);
        }
        Ok(Envelope {
            forward_path: to,
            reverse_path: from,
        })
    }

    /// Destination addresses of the envelope
    pub fn to(&self) -> &[EmailAddress] {
        self.forward_path.as_slice()
    }

    /// Source address of the envelope
    pub fn from(&self) -> Option<&EmailAddress> {
        self.reverse_path.as_ref()
    }

    /// `true` if any envelope address (sender or a recipient) contains
    /// non-ASCII bytes, the trigger for requesting `SMTPUTF8` (spec §4.5).
    pub fn needs_smtputf8(&self) -> bool {
        self.reverse_path.as_ref().map(|a| !a.is_ascii()).unwrap_or(false)
            || self.forward_path.iter().any(|a| !a.is_ascii())
    }
}

/// Message buffer for sending.
#[pin_project(project = MessageProj)]
#[allow(missing_debug_implementations)]
pub enum Message {
    /// Message constructed from a reader.
    Reader(#[pin] Box<dyn Read + Send + Sync>),
    /// Message constructed from a byte vector.
    Bytes(#[pin] Cursor<Vec<u8>>),
}

#[cfg(feature = "runtime-tokio")]
impl Read for Message {
    #[allow(unsafe_code)]
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            MessageProj::Reader(mut rdr) => {
                // Probably safe..
                let r: Pin<&mut _> = unsafe { Pin::new_unchecked(&mut **rdr) };
                r.poll_read(cx, buf)
            }
            MessageProj::Bytes(rdr) => {
                let _: Pin<&mut _> = rdr;
                rdr.poll_read(cx, buf)
            }
        }
    }
}

#[cfg(feature = "runtime-async-std")]
impl Read for Message {
    #[allow(unsafe_code)]
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            MessageProj::Reader(mut rdr) => {
                // Probably safe..
                let r: Pin<&mut _> = unsafe { Pin::new_unchecked(&mut **rdr) };
                r.poll_read(cx, buf)
            }
            MessageProj::Bytes(rdr) => {
                let _: Pin<&mut _> = rdr;
                rdr.poll_read(cx, buf)
            }
        }
    }
}

/// A composed, ready-to-transmit email: an envelope plus its serialized MIME
/// byte stream, with the hints the SMTP/LMTP/pool layers need.
#[allow(missing_debug_implementations)]
pub struct MailMessage {
    envelope: Envelope,
    message: Message,
    /// The `Message-ID` header value of the composed message, used for LMTP
    /// aggregation bookkeeping and sink filenames.
    message_id: String,
    /// Size hint in bytes, when known up front (e.g. a buffered `Vec<u8>`),
    /// used for the pool's pre-DATA `SIZE` check.
    message_size: Option<usize>,
}

impl MailMessage {
    /// Creates a new message out of an envelope and a byte slice.
    pub fn new(envelope: Envelope, message_id: impl Into<String>, message: impl Into<Vec<u8>>) -> MailMessage {
        let message: Vec<u8> = message.into();
        let message_size = Some(message.len());
        MailMessage {
            envelope,
            message_id: message_id.into(),
            message: Message::Bytes(Cursor::new(message)),
            message_size,
        }
    }

    /// Creates a new message out of an envelope and a byte reader, with no
    /// up-front size hint.
    pub fn new_with_reader(
        envelope: Envelope,
        message_id: impl Into<String>,
        message: Box<dyn Read + Send + Sync>,
    ) -> MailMessage {
        MailMessage {
            envelope,
            message_id: message_id.into(),
            message: Message::Reader(message),
            message_size: None,
        }
    }

    /// Returns email envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// This message's `Message-ID`.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// The message size in bytes, if known without consuming the stream.
    pub fn message_size(&self) -> Option<usize> {
        self.message_size
    }

    /// Returns email message.
    pub fn message(self) -> Message {
        self.message
    }

    /// Reads the whole message body into memory, returning the envelope,
    /// message id, and bytes. A message already built from bytes
    /// ([`MailMessage::new`]) returns its buffer without copying; a message
    /// built from a reader is drained fully.
    pub async fn into_buffered(self) -> io::Result<(Envelope, String, Vec<u8>)> {
        let envelope = self.envelope;
        let message_id = self.message_id;
        match self.message {
            Message::Bytes(cursor) => Ok((envelope, message_id, cursor.into_inner())),
            mut reader => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok((envelope, message_id, buf))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_email_address() {
        assert!(EmailAddress::new("foobar@example.org".to_string()).is_ok());
        assert!(EmailAddress::new("foobar@localhost".to_string()).is_ok());
        assert!(EmailAddress::new("foo\rbar@localhost".to_string()).is_err());
        assert!(EmailAddress::new("foobar@localhost".to_string()).is_ok());
        assert!(EmailAddress::new(
            "617b5772c6d10feda41fc6e0e43b976c4cc9383d3729310d3dc9e1332f0d9acd@yggmail".to_string()
        )
        .is_ok());
        assert!(EmailAddress::new(">foobar@example.org".to_string()).is_err());
        assert!(EmailAddress::new("foo bar@example.org".to_string()).is_err());
        assert!(EmailAddress::new("foobar@exa\r\nmple.org".to_string()).is_err());
    }

    #[test]
    fn envelope_requires_recipient() {
        assert!(Envelope::new(None, vec![]).is_err());
    }

    #[test]
    fn envelope_detects_smtputf8_need() {
        let from = EmailAddress::new("a@example.com".to_string()).unwrap();
        let envelope = Envelope::new(Some(from), vec![EmailAddress::new("b@example.com".to_string()).unwrap()]).unwrap();
        assert!(!envelope.needs_smtputf8());
    }
}
