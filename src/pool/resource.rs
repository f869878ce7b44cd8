//! A single pooled connection and its message counter.

use crate::error::Error;
use crate::smtp::connection::{SendOutcome, SmtpConnection};
use crate::types::MailMessage;

/// One live connection owned by a pool worker, tracking how many messages
/// have been sent over it so the worker can retire it at `max_messages`.
#[allow(missing_debug_implementations)]
pub struct PoolResource {
    connection: SmtpConnection,
    messages_sent: usize,
}

impl PoolResource {
    /// Wraps a freshly-established connection.
    pub fn new(connection: SmtpConnection) -> Self {
        PoolResource { connection, messages_sent: 0 }
    }

    /// `true` once this resource has sent `max_messages` messages and should
    /// be retired in favor of a fresh connection.
    pub fn is_exhausted(&self, max_messages: usize) -> bool {
        self.messages_sent >= max_messages
    }

    /// How many messages this resource has sent so far.
    pub fn messages_sent(&self) -> usize {
        self.messages_sent
    }

    /// Sends `mail` over this resource's connection, bumping the counter on
    /// success. A connection-level error (as opposed to a per-recipient
    /// rejection, which is reported inside `SendOutcome`) is the caller's
    /// signal that the underlying connection is no longer usable.
    pub async fn send(&mut self, mail: MailMessage) -> Result<SendOutcome, Error> {
        let outcome = self.connection.send(mail).await?;
        self.messages_sent += 1;
        Ok(outcome)
    }
}
