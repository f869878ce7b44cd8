//! Line-oriented SMTP/LMTP wire I/O: writing commands, reading (possibly
//! multi-line) replies, and piping the DATA phase through dot-stuffing.

use std::fmt::Display;
use std::string::String;

use log::debug;

use crate::codec::dot_stuff::DotStuffer;
use crate::commands::*;
use crate::error::{Error, SmtpResult};
use crate::extension::ClientId;
use crate::response::{is_final_line, parse_reply, Response};

#[cfg(feature = "runtime-async-std")]
use async_std::io::{prelude::*, BufReader, Read, ReadExt, Write, WriteExt};
#[cfg(feature = "runtime-tokio")]
use tokio::io::{
    AsyncBufReadExt, AsyncRead as Read, AsyncReadExt, AsyncWrite as Write, AsyncWriteExt, BufReader,
};

/// SMTP/LMTP wire stream, wrapping any `Read + Write` transport (plain TCP,
/// TLS, or a mock for tests).
#[derive(Debug)]
pub struct SmtpStream<S: Read + Write + Unpin> {
    inner: BufReader<S>,
}

impl<S: Read + Write + Unpin> SmtpStream<S> {
    /// Wraps `stream` for line-oriented SMTP I/O.
    pub fn new(stream: S) -> Self {
        Self { inner: BufReader::new(stream) }
    }

    /// Unwraps the stream. Only safe with no responses left unread, since the
    /// `BufReader`'s read-ahead buffer is discarded.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    /// Sends `EHLO`/`LHLO` and returns the server's capability response.
    pub async fn ehlo(&mut self, client_id: ClientId, lmtp: bool) -> SmtpResult {
        if lmtp {
            self.command(LhloCommand::new(client_id)).await
        } else {
            self.command(EhloCommand::new(client_id)).await
        }
    }

    /// Sends `command` and awaits its response.
    pub async fn command(&mut self, command: impl Display) -> SmtpResult {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// Sends `command` without waiting for a response; used for PIPELINING.
    pub async fn send_command(&mut self, command: impl Display) -> Result<(), Error> {
        self.write(command.to_string().as_bytes()).await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner.get_mut().write_all(bytes).await?;
        self.inner.get_mut().flush().await?;
        debug!(">> {}", escape_crlf(&String::from_utf8_lossy(bytes)));
        Ok(())
    }

    /// Reads one complete (possibly multi-line) SMTP reply. Fails with the
    /// response's error variant if the reply is not `2xx`/`3xx`.
    pub async fn read_response(&mut self) -> SmtpResult {
        let response = self.read_raw_response().await?;
        if matches!(
            response.code.severity,
            crate::response::Severity::PositiveCompletion | crate::response::Severity::PositiveIntermediate
        ) {
            Ok(response)
        } else {
            Err(response.into())
        }
    }

    /// Reads one complete reply regardless of its severity, for callers (like
    /// LMTP per-recipient aggregation) that need to inspect failures without
    /// the call immediately erroring out.
    pub async fn read_raw_response(&mut self) -> Result<Response, Error> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::with_capacity(100);
            let read = self.inner.read_line(&mut line).await?;
            if read == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed").into());
            }
            debug!("<< {}", escape_crlf(&line));
            let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
            let final_line = is_final_line(&trimmed);
            lines.push(trimmed);
            if final_line {
                break;
            }
        }
        parse_reply(lines.iter().map(String::as_str))
    }

    /// Pipes `message` through dot-stuffing into the DATA phase and reads the
    /// terminating response. For LMTP, the caller should instead call
    /// [`SmtpStream::send_data`] followed by one [`SmtpStream::read_raw_response`]
    /// per accepted recipient.
    pub async fn message<T: Read + Unpin>(&mut self, message: T) -> SmtpResult {
        self.send_data(message).await?;
        self.read_response().await
    }

    /// Pipes `message` through dot-stuffing and the terminator, without
    /// reading a response — used directly by `message` for SMTP, and by LMTP
    /// callers who then read one response per accepted recipient.
    pub async fn send_data<T: Read + Unpin>(&mut self, message: T) -> Result<(), Error> {
        let mut codec = DotStuffer::new();
        let mut message_reader = BufReader::new(message);
        let mut message_bytes = Vec::new();
        message_reader.read_to_end(&mut message_bytes).await?;

        codec.encode(&message_bytes, self.inner.get_mut()).await?;
        codec.encode(b"", self.inner.get_mut()).await?;
        self.inner.get_mut().flush().await?;
        Ok(())
    }
}

fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}

#[cfg(test)]
mod test {
    use super::escape_crlf;

    #[test]
    fn test_escape_crlf() {
        assert_eq!(escape_crlf("\r\n"), "<CRLF>");
        assert_eq!(escape_crlf("EHLO my_name\r\n"), "EHLO my_name<CRLF>");
    }
}
