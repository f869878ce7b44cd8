//! Dot-stuffing transform for the SMTP/LMTP DATA phase (RFC 5321 §4.5.2).
//!
//! Every line whose first byte is `.` has that leading dot doubled; all line endings
//! are normalised to CRLF; the stream is terminated with CRLF `.` CRLF, coalescing
//! with any trailing newline already present so the terminator is never duplicated.

#[cfg(feature = "runtime-async-std")]
use async_std::io::{Write, WriteExt};
#[cfg(feature = "runtime-tokio")]
use tokio::io::{AsyncWrite as Write, AsyncWriteExt};

use futures::io;

/// Incremental dot-stuffing state machine, one byte of history at a time.
#[derive(Default, Clone, Copy, Debug)]
pub struct DotStuffer {
    escape_count: u8,
}

impl DotStuffer {
    /// Creates a fresh dot-stuffer at the start of a line.
    pub fn new() -> Self {
        DotStuffer::default()
    }

    /// Feeds `frame` through the stuffer, writing the transformed bytes to `buf`.
    /// Call with an empty `frame` to emit the final `CRLF.CRLF` terminator.
    pub async fn encode<W: Write + Unpin>(&mut self, frame: &[u8], mut buf: W) -> io::Result<()> {
        match frame.len() {
            0 => {
                match self.escape_count {
                    0 => buf.write_all(b"\r\n.\r\n").await?,
                    1 => buf.write_all(b"\n.\r\n").await?,
                    2 => buf.write_all(b".\r\n").await?,
                    _ => unreachable!(),
                }
                self.escape_count = 0;
                Ok(())
            }
            _ => {
                let mut start = 0;
                for (idx, byte) in frame.iter().enumerate() {
                    match self.escape_count {
                        0 => self.escape_count = if *byte == b'\r' { 1 } else { 0 },
                        1 => self.escape_count = if *byte == b'\n' { 2 } else { 0 },
                        2 => {
                            self.escape_count = if *byte == b'.' {
                                3
                            } else if *byte == b'\r' {
                                1
                            } else {
                                0
                            }
                        }
                        _ => unreachable!(),
                    }
                    if self.escape_count == 3 {
                        self.escape_count = 0;
                        buf.write_all(&frame[start..idx]).await?;
                        buf.write_all(b".").await?;
                        start = idx;
                    }
                }
                buf.write_all(&frame[start..]).await?;
                Ok(())
            }
        }
    }
}

/// One-shot, in-memory dot-stuffing of a complete buffer, for tests and for transports
/// (sendmail, file, stub) that do not speak the wire protocol but still want
/// RFC-conformant message bytes.
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 60 + 5);
    let mut start = 0;
    let mut escape_count = 0u8;
    for (idx, byte) in data.iter().enumerate() {
        escape_count = match escape_count {
            0 => {
                if *byte == b'\r' {
                    1
                } else {
                    0
                }
            }
            1 => {
                if *byte == b'\n' {
                    2
                } else {
                    0
                }
            }
            2 => {
                if *byte == b'.' {
                    3
                } else if *byte == b'\r' {
                    1
                } else {
                    0
                }
            }
            _ => unreachable!(),
        };
        if escape_count == 3 {
            escape_count = 0;
            out.extend_from_slice(&data[start..idx]);
            out.push(b'.');
            start = idx;
        }
    }
    out.extend_from_slice(&data[start..]);
    match escape_count {
        0 => out.extend_from_slice(b"\r\n.\r\n"),
        1 => out.extend_from_slice(b"\n.\r\n"),
        2 => out.extend_from_slice(b".\r\n"),
        _ => unreachable!(),
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::async_test;

    async_test! { test_dot_stuff_codec, {
        let mut codec = DotStuffer::new();
        let mut buf: Vec<u8> = vec![];

        assert!(codec.encode(b"test\r\n", &mut buf).await.is_ok());
        assert!(codec.encode(b".\r\n", &mut buf).await.is_ok());
        assert!(codec.encode(b"\r\ntest", &mut buf).await.is_ok());
        assert!(codec.encode(b"te\r\n.\r\nst", &mut buf).await.is_ok());
        assert!(codec.encode(b"test", &mut buf).await.is_ok());
        assert!(codec.encode(b"test.", &mut buf).await.is_ok());
        assert!(codec.encode(b"test\n", &mut buf).await.is_ok());
        assert!(codec.encode(b".test\n", &mut buf).await.is_ok());
        assert!(codec.encode(b"test", &mut buf).await.is_ok());
        assert!(codec.encode(b"", &mut buf).await.is_ok());
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "test\r\n..\r\n\r\ntestte\r\n..\r\nsttesttest.test\n.test\ntest\r\n.\r\n"
        );
    }}

    #[test]
    fn stuff_doubles_leading_dots() {
        let out = stuff(b"hello\r\n.world\r\n");
        assert_eq!(out, b"hello\r\n..world\r\n\r\n.\r\n");
    }

    #[test]
    fn stuff_always_ends_with_terminator() {
        for input in [&b""[..], b"no newline", b"ends with\r\n", b"ends with\n"] {
            let out = stuff(input);
            assert!(out.ends_with(b"\r\n.\r\n"));
        }
    }
}
