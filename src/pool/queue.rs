//! The unit of work the pool dispatches: an envelope, its already-serialised
//! bytes, and a requeue counter.

use crate::types::{Envelope, MailMessage};

/// One message waiting for (or being retried against) a pooled connection.
///
/// The pool works off fully-serialised bytes rather than a lazy
/// [`crate::types::Message`] stream so that a connection failure mid-send can
/// requeue the same entry without having consumed an unreplayable reader.
#[derive(Debug, Clone)]
pub struct PoolQueueEntry {
    /// The message's envelope (`MAIL FROM`/`RCPT TO` addresses).
    pub envelope: Envelope,
    /// The `Message-ID` used for logging and LMTP response aggregation.
    pub message_id: String,
    /// The fully-serialised RFC 822 message bytes.
    pub message: Vec<u8>,
    /// How many times this entry has already been requeued after a
    /// connection failure.
    pub requeue_attempts: i64,
}

impl PoolQueueEntry {
    /// Creates a fresh entry with a zero requeue count.
    pub fn new(envelope: Envelope, message_id: impl Into<String>, message: Vec<u8>) -> Self {
        PoolQueueEntry {
            envelope,
            message_id: message_id.into(),
            message,
            requeue_attempts: 0,
        }
    }

    /// Builds the [`MailMessage`] a connection's `send` expects, cloning the
    /// buffered bytes so the entry itself remains requeueable.
    pub fn to_mail_message(&self) -> MailMessage {
        MailMessage::new(self.envelope.clone(), self.message_id.clone(), self.message.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::EmailAddress;

    #[test]
    fn clones_into_a_fresh_mail_message() {
        let from = EmailAddress::new("a@example.com".to_string()).unwrap();
        let to = EmailAddress::new("b@example.com".to_string()).unwrap();
        let envelope = Envelope::new(Some(from), vec![to]).unwrap();
        let entry = PoolQueueEntry::new(envelope, "abc@example.com", b"From: a\r\n\r\nhi\r\n".to_vec());
        let mail = entry.to_mail_message();
        assert_eq!(mail.message_id(), "abc@example.com");
        assert_eq!(mail.message_size(), Some(entry.message.len()));
    }
}
