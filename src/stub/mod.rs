//! The stub transport logs the message envelope, drains the body without
//! writing it anywhere, and returns a caller-configured canned response.
//! Useful for testing code that depends on a transport without speaking real
//! SMTP.

pub mod error;

use std::collections::VecDeque;

use log::info;

use crate::stub::error::{Error, StubResult};
use crate::types::MailMessage;

/// Returns a queued canned response for each send, logging the envelope.
#[derive(Debug)]
pub struct StubTransport {
    responses: VecDeque<StubResult>,
}

impl StubTransport {
    /// Creates a transport that always returns `response`.
    pub fn new(response: StubResult) -> StubTransport {
        StubTransport { responses: vec![response].into() }
    }

    /// Creates a transport that always reports success.
    pub fn new_positive() -> StubTransport {
        StubTransport { responses: vec![Ok(())].into() }
    }
}

impl StubTransport {
    /// Logs `mail`'s envelope, drains its body, and pops the next queued
    /// response.
    pub async fn send(&mut self, mail: MailMessage) -> StubResult {
        let (envelope, message_id, bytes) = mail.into_buffered().await?;
        info!(
            "{}: from=<{}> to=<{:?}> ({} bytes)",
            message_id,
            envelope.from().map(ToString::to_string).unwrap_or_default(),
            envelope.to(),
            bytes.len()
        );
        let response = self.responses.pop_front().ok_or(Error::Client("there's nothing left to say"))?;
        info!("{}: result={:?}", message_id, response);
        response
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{EmailAddress, Envelope};

    crate::async_test!(positive_stub_accepts_every_message, {
        let from = EmailAddress::new("a@example.com".to_string()).unwrap();
        let to = EmailAddress::new("b@example.com".to_string()).unwrap();
        let envelope = Envelope::new(Some(from), vec![to]).unwrap();
        let mail = MailMessage::new(envelope, "abc@example.com", b"From: a\r\n\r\nhi\r\n".to_vec());
        let mut transport = StubTransport::new_positive();
        assert!(transport.send(mail).await.is_ok());
    });

    crate::async_test!(exhausted_stub_errors, {
        let from = EmailAddress::new("a@example.com".to_string()).unwrap();
        let to = EmailAddress::new("b@example.com".to_string()).unwrap();
        let envelope = Envelope::new(Some(from), vec![to]).unwrap();
        let mail = MailMessage::new(envelope, "abc@example.com", b"From: a\r\n\r\nhi\r\n".to_vec());
        let mut transport = StubTransport { responses: VecDeque::new() };
        assert!(transport.send(mail).await.is_err());
    });
}
