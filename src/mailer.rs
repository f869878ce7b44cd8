//! The orchestrator tying the composer, a typed compile/stream plugin
//! pipeline, and a transport together: `send_mail` compiles a
//! [`MailDescription`], composes it into a MIME tree, serialises it, runs any
//! stream plugins (the hook point a DKIM signer would occupy), and hands the
//! result to whichever [`Transport`] the caller configured.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::warn;

use crate::compose::{compose, MailDescription};
use crate::content::{self, ResolveOptions};
#[cfg(feature = "file-transport")]
use crate::file::error::Error as FileError;
#[cfg(feature = "file-transport")]
use crate::file::FileTransport;
use crate::mime::envelope::derive_envelope;
use crate::mime::serialize::{serialize, SerializeOptions};
#[cfg(feature = "pool")]
use crate::pool::Pool;
#[cfg(feature = "sendmail-transport")]
use crate::sendmail::error::Error as SendmailError;
#[cfg(feature = "sendmail-transport")]
use crate::sendmail::SendmailTransport;
#[cfg(feature = "smtp-transport")]
use crate::smtp::connection::{SendOutcome, SmtpConnection};
use crate::stub::error::Error as StubError;
use crate::stub::StubTransport;
use crate::types::{self, EmailAddress, Envelope, MailMessage};

/// Error raised while compiling, composing, or serialising a message, or by
/// the transport it was finally handed to.
#[derive(thiserror::Error, Debug)]
pub enum MailerError<E> {
    /// A compile-stage or stream-stage plugin rejected the message.
    #[error("plugin error: {0}")]
    Plugin(String),
    /// The envelope could not be derived from (or was invalid given) the
    /// composed headers.
    #[error("envelope error: {0}")]
    Envelope(#[from] types::Error),
    /// Resolving a leaf's content (file, URL, data URI) failed during
    /// serialisation.
    #[error("content error: {0}")]
    Content(#[from] content::Error),
    /// The underlying transport failed to deliver the message.
    #[error("transport error: {0}")]
    Transport(E),
}

/// The outcome a transport reports back to the orchestrator: which
/// recipients the server accepted or rejected, and the final status text.
/// `None` from a non-SMTP transport means "delivered, no per-recipient
/// detail available" — the orchestrator then treats every envelope
/// recipient as accepted.
#[derive(Debug, Clone)]
pub struct DeliverySummary {
    /// Recipients explicitly accepted by the transport.
    pub accepted: Vec<EmailAddress>,
    /// Recipients explicitly rejected by the transport.
    pub rejected: Vec<EmailAddress>,
    /// Human-readable rejection reasons, parallel to `rejected`.
    pub rejected_errors: Vec<String>,
    /// The transport's final status line.
    pub response: String,
}

#[cfg(feature = "smtp-transport")]
impl From<SendOutcome> for DeliverySummary {
    fn from(outcome: SendOutcome) -> Self {
        let mut rejected = Vec::with_capacity(outcome.rejected.len());
        let mut rejected_errors = Vec::with_capacity(outcome.rejected.len());
        for (address, response) in outcome.rejected {
            rejected_errors.push(response.message.join("; "));
            rejected.push(address);
        }
        DeliverySummary {
            accepted: outcome.accepted,
            rejected,
            rejected_errors,
            response: outcome.response.message.join("; "),
        }
    }
}

/// A sink this crate can hand a composed [`MailMessage`] to. Implemented for
/// [`SmtpConnection`], [`Pool`], [`FileTransport`], [`StubTransport`], and
/// [`SendmailTransport`].
#[async_trait]
pub trait Transport: Send {
    /// The transport's own failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Delivers `mail`, reporting per-recipient detail when the transport can
    /// provide it.
    async fn send(&mut self, mail: MailMessage) -> Result<Option<DeliverySummary>, Self::Error>;
}

#[cfg(feature = "smtp-transport")]
#[async_trait]
impl Transport for SmtpConnection {
    type Error = crate::error::Error;

    async fn send(&mut self, mail: MailMessage) -> Result<Option<DeliverySummary>, Self::Error> {
        SmtpConnection::send(self, mail).await.map(|outcome| Some(outcome.into()))
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl Transport for Pool {
    type Error = crate::error::Error;

    async fn send(&mut self, mail: MailMessage) -> Result<Option<DeliverySummary>, Self::Error> {
        Pool::send_mail(self, mail).await.map(|outcome| Some(outcome.into()))
    }
}

#[cfg(feature = "file-transport")]
#[async_trait]
impl Transport for FileTransport {
    type Error = FileError;

    async fn send(&mut self, mail: MailMessage) -> Result<Option<DeliverySummary>, Self::Error> {
        FileTransport::send(self, mail).await?;
        Ok(None)
    }
}

#[async_trait]
impl Transport for StubTransport {
    type Error = StubError;

    async fn send(&mut self, mail: MailMessage) -> Result<Option<DeliverySummary>, Self::Error> {
        StubTransport::send(self, mail).await?;
        Ok(None)
    }
}

#[cfg(feature = "sendmail-transport")]
#[async_trait]
impl Transport for SendmailTransport {
    type Error = SendmailError;

    async fn send(&mut self, mail: MailMessage) -> Result<Option<DeliverySummary>, Self::Error> {
        SendmailTransport::send(self, mail).await?;
        Ok(None)
    }
}

/// A compile-stage plugin: runs before composition, with full access to the
/// mail description. The built-in [`DataUriImageRewriter`] is one example.
pub trait CompilePlugin: Send + Sync {
    /// Mutates `description` in place, or rejects the message outright.
    fn compile(&self, description: &mut MailDescription) -> Result<(), String>;
}

/// A stream-stage plugin: runs on the fully-serialised message bytes. The
/// hook point a DKIM signer occupies; signing itself is not implemented here.
#[async_trait]
pub trait StreamPlugin: Send + Sync {
    /// Transforms the serialised message, or rejects it outright.
    async fn process(&self, message: Vec<u8>) -> Result<Vec<u8>, String>;
}

/// Rewrites `<img src="data:...">` inline images in the HTML body into
/// `cid:`-referenced attachments, the built-in compile plugin from spec §4.7.
/// Scans at most [`DataUriImageRewriter::MAX_REWRITES`] occurrences to avoid
/// quadratic blowup on adversarial input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUriImageRewriter;

impl DataUriImageRewriter {
    /// Upper bound on inline images rewritten per message.
    pub const MAX_REWRITES: usize = 50;
}

impl CompilePlugin for DataUriImageRewriter {
    fn compile(&self, description: &mut MailDescription) -> Result<(), String> {
        if !description.attach_data_urls {
            return Ok(());
        }
        let Some(html) = description.html.take() else { return Ok(()) };
        let (rewritten, found) = rewrite_data_uri_images(&html, &mut description.attachments);
        description.html = Some(rewritten);
        if found >= Self::MAX_REWRITES {
            warn!("data-uri image rewriter hit its scan cap ({}); some inline images were left untouched", Self::MAX_REWRITES);
        }
        Ok(())
    }
}

fn rewrite_data_uri_images(html: &str, attachments: &mut Vec<crate::compose::Part>) -> (String, usize) {
    const MARKER: &str = "src=\"data:";
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut count = 0;

    while count < DataUriImageRewriter::MAX_REWRITES {
        let Some(marker_at) = rest.find(MARKER) else { break };
        let (before, from_marker) = rest.split_at(marker_at);
        out.push_str(before);

        let after_src_equals = &from_marker[5..]; // skip `src="`, keep `data:...`
        let Some(quote_end) = after_src_equals.find('"') else {
            out.push_str(from_marker);
            rest = "";
            break;
        };
        let data_uri = &after_src_equals[..quote_end];
        let media_type = data_uri
            .strip_prefix("data:")
            .and_then(|s| s.split(|c| c == ';' || c == ',').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("application/octet-stream")
            .to_string();

        let cid = format!("mailforge-inline-{}", count);
        out.push_str("src=\"cid:");
        out.push_str(&cid);
        out.push('"');

        attachments.push(
            crate::compose::Part {
                content_type: media_type,
                content: crate::content::ContentSpec::DataUri(data_uri.to_string()),
                filename: Some(None),
                cid: Some(cid),
                disposition: Some(crate::compose::Disposition::Inline),
                transfer_encoding: None,
            },
        );

        rest = &after_src_equals[quote_end + 1..];
        count += 1;
    }
    out.push_str(rest);
    (out, count)
}

/// The default set of compile plugins (just the data-URI rewriter) plus any
/// caller-registered compile/stream plugins, and the transport messages are
/// finally handed to.
pub struct Mailer<T: Transport> {
    transport: T,
    compile_plugins: Vec<Box<dyn CompilePlugin>>,
    stream_plugins: Vec<Box<dyn StreamPlugin>>,
}

/// The result of a completed `send_mail` call, mirroring spec §4.7's
/// `{envelope, messageId, accepted, rejected, rejectedErrors?, response,
/// messageSize, messageTime, envelopeTime}`.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// The envelope the message was actually sent with.
    pub envelope: Envelope,
    /// The composed message's `Message-ID`.
    pub message_id: String,
    /// Recipients accepted by the transport.
    pub accepted: Vec<EmailAddress>,
    /// Recipients rejected by the transport.
    pub rejected: Vec<EmailAddress>,
    /// Rejection reasons, parallel to `rejected`; empty when nothing was
    /// rejected.
    pub rejected_errors: Vec<String>,
    /// The transport's final status line.
    pub response: String,
    /// The serialised message size in bytes.
    pub message_size: usize,
    /// Time spent composing and serialising the message.
    pub message_time: Duration,
    /// Time spent deriving/validating the envelope.
    pub envelope_time: Duration,
}

impl<T: Transport> Mailer<T> {
    /// Wraps `transport` with the default plugin set (just the data-URI
    /// image rewriter).
    pub fn new(transport: T) -> Self {
        Mailer {
            transport,
            compile_plugins: vec![Box::new(DataUriImageRewriter)],
            stream_plugins: Vec::new(),
        }
    }

    /// Appends a compile-stage plugin, run in registration order after the
    /// built-ins.
    pub fn with_compile_plugin(mut self, plugin: impl CompilePlugin + 'static) -> Self {
        self.compile_plugins.push(Box::new(plugin));
        self
    }

    /// Appends a stream-stage plugin (e.g. a DKIM signer), run in
    /// registration order on the fully-serialised bytes.
    pub fn with_stream_plugin(mut self, plugin: impl StreamPlugin + 'static) -> Self {
        self.stream_plugins.push(Box::new(plugin));
        self
    }

    /// Borrows the wrapped transport.
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Compiles, composes, serialises, and sends `description`.
    pub async fn send_mail(&mut self, mut description: MailDescription) -> Result<SendReceipt, MailerError<T::Error>> {
        let envelope_start = Instant::now();

        for plugin in &self.compile_plugins {
            plugin.compile(&mut description).map_err(MailerError::Plugin)?;
        }

        let tree = compose(&description);
        let root = tree.root();
        let message_id = tree.node(root).get_header("Message-ID").unwrap_or_default().to_string();

        let envelope = match description.envelope.clone() {
            Some(explicit) => explicit,
            None => derive_envelope(&tree, root)?,
        };
        let envelope_time = envelope_start.elapsed();

        let message_start = Instant::now();
        let options = SerializeOptions {
            keep_bcc: false,
            resolve: ResolveOptions { disable_file_access: description.disable_file_access },
            newline: description.newline,
        };
        let mut bytes = serialize(&tree, root, options).await?;

        for plugin in &self.stream_plugins {
            bytes = plugin.process(bytes).await.map_err(MailerError::Plugin)?;
        }
        let message_time = message_start.elapsed();

        let message_size = bytes.len();
        let mail = MailMessage::new(envelope.clone(), message_id.clone(), bytes);

        let summary = self.transport.send(mail).await.map_err(MailerError::Transport)?;

        let (accepted, rejected, rejected_errors, response) = match summary {
            Some(summary) => (summary.accepted, summary.rejected, summary.rejected_errors, summary.response),
            None => (envelope.to().to_vec(), Vec::new(), Vec::new(), "ok".to_string()),
        };

        Ok(SendReceipt {
            envelope,
            message_id,
            accepted,
            rejected,
            rejected_errors,
            response,
            message_size,
            message_time,
            envelope_time,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_uri_rewriter_leaves_plain_html_untouched() {
        let mut attachments = Vec::new();
        let (out, count) = rewrite_data_uri_images("<p>hello</p>", &mut attachments);
        assert_eq!(out, "<p>hello</p>");
        assert_eq!(count, 0);
        assert!(attachments.is_empty());
    }

    #[test]
    fn data_uri_rewriter_extracts_inline_image() {
        let html = r#"<img src="data:image/png;base64,aGVsbG8="><p>hi</p>"#;
        let mut attachments = Vec::new();
        let (out, count) = rewrite_data_uri_images(html, &mut attachments);
        assert_eq!(count, 1);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].content_type, "image/png");
        assert!(out.contains("src=\"cid:mailforge-inline-0\""));
        assert!(!out.contains("data:image/png"));
    }

    crate::async_test!(send_mail_via_stub_reports_all_recipients_accepted, {
        let description = MailDescription {
            from: Some("a@example.com".to_string()),
            to: Some("b@example.com".to_string()),
            text: Some("hello".to_string()),
            ..Default::default()
        };
        let stub = StubTransport::new(Ok(()));
        let mut mailer = Mailer::new(stub);
        let receipt = mailer.send_mail(description).await.unwrap();
        assert_eq!(receipt.accepted.len(), 1);
        assert!(receipt.rejected.is_empty());
        assert!(receipt.message_size > 0);
    });
}
