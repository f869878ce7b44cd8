//! The file transport writes each message as JSON to `<message_id>.json` in a
//! given directory: `{envelope, messageId, message}` with `message` carrying
//! the base64-encoded RFC 822 bytes. Useful for tests or for keeping an
//! audit trail of sent mail without a real SMTP relay.

pub mod error;

use std::path::PathBuf;

use serde_derive::Serialize;

use crate::file::error::{Error, FileResult};
use crate::types::{EmailAddress, MailMessage};

/// Writes each sent message as a JSON document under `path`.
#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    /// Creates a new transport writing into `path`, which must already exist.
    pub fn new(path: impl Into<PathBuf>) -> FileTransport {
        FileTransport { path: path.into() }
    }
}

#[derive(Serialize)]
struct SerializableEmail<'a> {
    envelope: SerializableEnvelope<'a>,
    #[serde(rename = "messageId")]
    message_id: &'a str,
    message: String,
}

#[derive(Serialize)]
struct SerializableEnvelope<'a> {
    from: Option<&'a str>,
    to: Vec<&'a str>,
}

impl FileTransport {
    /// Serializes `mail` to JSON and writes it to `<message_id>.json`.
    pub async fn send(&mut self, mail: MailMessage) -> FileResult {
        let (envelope, message_id, bytes) = mail.into_buffered().await?;

        let from = envelope.from().map(EmailAddress::as_ref);
        let to: Vec<&str> = envelope.to().iter().map(EmailAddress::as_ref).collect();

        let document = SerializableEmail {
            envelope: SerializableEnvelope { from, to },
            message_id: &message_id,
            message: base64::encode(&bytes),
        };

        let serialized = serde_json::to_vec(&document)?;

        let mut file = self.path.clone();
        file.push(format!("{}.json", message_id));
        crate::runtime::fs::write(&file, &serialized).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Envelope;

    #[test]
    fn serializes_envelope_and_base64_body() {
        let from = EmailAddress::new("a@example.com".to_string()).unwrap();
        let to = EmailAddress::new("b@example.com".to_string()).unwrap();
        let envelope = Envelope::new(Some(from), vec![to]).unwrap();
        let document = SerializableEmail {
            envelope: SerializableEnvelope { from: envelope.from().map(EmailAddress::as_ref), to: envelope.to().iter().map(EmailAddress::as_ref).collect() },
            message_id: "abc@example.com",
            message: base64::encode(b"From: a\r\n\r\nhi\r\n"),
        };
        let json = serde_json::to_string(&document).unwrap();
        assert!(json.contains("\"messageId\":\"abc@example.com\""));
        assert!(json.contains("\"from\":\"a@example.com\""));
    }
}
