//! An async mail composition and delivery crate.
//!
//! `mailforge` builds RFC 5322/MIME messages from a declarative description,
//! resolves attachment content (bytes, files, URLs, `data:` URIs), and hands
//! the serialised result to a transport: direct SMTP/LMTP delivery (this
//! crate's own client, following [RFC 5321](https://tools.ietf.org/html/rfc5321)),
//! a connection pool with a sliding-window rate limiter, a local `sendmail`
//! pipe, or a JSON/stub sink for testing.
//!
//! The SMTP client implements:
//!
//! * 8BITMIME ([RFC 6152](https://tools.ietf.org/html/rfc6152))
//! * SMTPUTF8 ([RFC 6531](https://tools.ietf.org/html/rfc6531))
//! * DSN ([RFC 3461](https://tools.ietf.org/html/rfc3461))
//! * PIPELINING ([RFC 2920](https://tools.ietf.org/html/rfc2920))
//! * STARTTLS ([RFC 3207](https://tools.ietf.org/html/rfc3207))
//! * AUTH ([RFC 4954](https://tools.ietf.org/html/rfc4954)) with PLAIN, LOGIN, CRAM-MD5 and XOAUTH2
//! * LMTP ([RFC 2033](https://tools.ietf.org/html/rfc2033))
//!
//! Exactly one of the `runtime-tokio` / `runtime-async-std` features must be
//! enabled; `runtime-tokio` is on by default.

#![deny(
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    missing_debug_implementations,
    missing_docs,
    clippy::unwrap_used
)]

#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
compile_error!("one of 'runtime-async-std' or 'runtime-tokio' features must be enabled");

#[cfg(all(feature = "runtime-tokio", feature = "runtime-async-std"))]
compile_error!("only one of 'runtime-async-std' or 'runtime-tokio' features must be enabled");

pub mod address;
#[cfg(feature = "smtp-transport")]
pub mod authentication;
mod codec;
#[cfg(feature = "smtp-transport")]
pub mod commands;
pub mod compose;
#[cfg(feature = "smtp-transport")]
pub mod config;
pub mod content;
#[cfg(feature = "smtp-transport")]
pub mod error;
#[cfg(feature = "smtp-transport")]
pub mod extension;
#[cfg(feature = "file-transport")]
pub mod file;
pub mod mailer;
pub mod mime;
#[cfg(feature = "pool")]
pub mod pool;
pub mod response;
mod runtime;
#[cfg(feature = "sendmail-transport")]
pub mod sendmail;
#[cfg(feature = "smtp-transport")]
pub mod smtp;
#[cfg(feature = "smtp-transport")]
mod stream;
pub mod stub;
pub mod types;
#[cfg(feature = "smtp-transport")]
pub mod util;

pub use crate::compose::{compose, IcalEvent, MailDescription, Part, Priority};
pub use crate::mailer::{CompilePlugin, DeliverySummary, Mailer, MailerError, SendReceipt, StreamPlugin, Transport};
pub use crate::types::{EmailAddress, Envelope, MailMessage};

#[macro_export]
macro_rules! async_test {
    ($name:ident, $block:block) => {
        #[cfg(feature = "runtime-tokio")]
        #[tokio::test]
        async fn $name() {
            $block
        }

        #[cfg(feature = "runtime-async-std")]
        #[async_std::test]
        async fn $name() {
            $block
        }
    };
}
