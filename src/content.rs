//! Resolving attachment/body content specifications to bytes.
//!
//! A [`ContentSpec`] is the caller-facing way to hand a leaf node its body without
//! committing to how the bytes are obtained: inline bytes, a string with a declared
//! encoding, a file path, an `http(s)://` URL, or a `data:` URI.

use std::path::PathBuf;

use crate::codec::base64::DecodeError;

/// How to obtain a leaf node's body bytes, resolved in the order documented on
/// each variant by [`ContentSpec::resolve`].
#[derive(Debug, Clone)]
pub enum ContentSpec {
    /// Already-decoded bytes.
    Bytes(Vec<u8>),
    /// Text with a declared encoding label; only `utf8`/`ascii`/`usascii` are
    /// recognised without re-encoding — anything else is treated as already
    /// being bytes in that charset and passed through as-is (no charset
    /// conversion table is bundled).
    Text { data: String, encoding: String },
    /// A local filesystem path, opened for reading at resolution time.
    Path(PathBuf),
    /// An `http://` or `https://` URL, fetched at resolution time.
    Url(String),
    /// A `data:` URI, decoded at resolution time.
    DataUri(String),
}

/// Error resolving a [`ContentSpec`] into bytes.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reading a local file failed.
    #[error("reading content file {path}: {source}")]
    File {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// File access was attempted while `disable_file_access` is set.
    #[error("file access to {0} is disabled")]
    FileAccessDisabled(PathBuf),
    /// Fetching an `http(s)://` URL failed.
    #[error("fetching {url}: {source}")]
    Http {
        /// The URL that could not be fetched.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: HttpError,
    },
    /// HTTP content fetching was requested without the `http-content` feature.
    #[error("fetching remote content requires the http-content feature")]
    HttpDisabled,
    /// A `data:` URI was malformed.
    #[error("malformed data URI")]
    MalformedDataUri,
    /// A `data:` URI's base64 payload failed to decode.
    #[error("data URI base64 payload: {0}")]
    Base64(#[from] DecodeError),
}

/// The HTTP client error type, only meaningful with the `http-content` feature.
#[cfg(feature = "http-content")]
pub type HttpError = reqwest::Error;
/// Stand-in error type when the `http-content` feature is disabled.
#[cfg(not(feature = "http-content"))]
pub type HttpError = std::convert::Infallible;

/// Options controlling content resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Forbid `ContentSpec::Path` resolution, for hosts embedding this library
    /// with untrusted input.
    pub disable_file_access: bool,
}

impl ContentSpec {
    /// Builds a spec from a local file path.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ContentSpec::Path(path.into())
    }

    /// Resolves this spec into fully-buffered bytes.
    ///
    /// This buffers the whole body in memory; the streaming path used by the
    /// MIME serialiser ([`crate::mime::serialize`]) resolves lazily instead, but
    /// shares the same case ordering and `data:`-URI decoding logic.
    pub async fn resolve(&self, options: ResolveOptions) -> Result<Vec<u8>, Error> {
        match self {
            ContentSpec::Bytes(b) => Ok(b.clone()),
            // `encoding` is only consulted for its documented UTF-8/ASCII
            // pass-through; no charset conversion table is bundled, so a
            // declared non-ASCII charset label is accepted but still emitted as
            // the string's own UTF-8 bytes rather than re-encoded into it.
            ContentSpec::Text { data, .. } => Ok(data.as_bytes().to_vec()),
            ContentSpec::Url(url) if is_http_url(url) => fetch_url(url).await,
            ContentSpec::Path(path) if is_http_url(&path.to_string_lossy()) => {
                fetch_url(&path.to_string_lossy()).await
            }
            ContentSpec::DataUri(uri) => decode_data_uri(uri),
            ContentSpec::Path(path) if path.to_string_lossy().starts_with("data:") => {
                decode_data_uri(&path.to_string_lossy())
            }
            ContentSpec::Path(path) => {
                if options.disable_file_access {
                    return Err(Error::FileAccessDisabled(path.clone()));
                }
                crate::runtime::fs::read(path).await.map_err(|source| Error::File {
                    path: path.clone(),
                    source,
                })
            }
            ContentSpec::Url(url) => {
                log::warn!("content spec URL {} has neither http nor https scheme", url);
                Err(Error::MalformedDataUri)
            }
        }
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(feature = "http-content")]
async fn fetch_url(url: &str) -> Result<Vec<u8>, Error> {
    let response = reqwest::get(url)
        .await
        .map_err(|source| Error::Http { url: url.to_string(), source })?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| Error::Http { url: url.to_string(), source })?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "http-content"))]
async fn fetch_url(_url: &str) -> Result<Vec<u8>, Error> {
    Err(Error::HttpDisabled)
}

/// Decodes a `data:[mediatype][;params][;base64],payload` URI.
///
/// Everything before the first `,` is metadata; a trailing `base64`, `utf8` or
/// `utf-8` token (one with no `=`) selects the payload encoding, any other
/// `key=value` tokens are ignored parameters, and the remainder is either
/// base64- or percent-decoded accordingly.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, Error> {
    let rest = uri.strip_prefix("data:").ok_or(Error::MalformedDataUri)?;
    let comma = rest.find(',').ok_or(Error::MalformedDataUri)?;
    let (meta, payload) = (&rest[..comma], &rest[comma + 1..]);

    let mut is_base64 = false;
    for token in meta.split(';') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !token.contains('=') {
            match token.to_ascii_lowercase().as_str() {
                "base64" => is_base64 = true,
                "utf8" | "utf-8" => is_base64 = false,
                _ => {}
            }
        }
    }

    if is_base64 {
        Ok(crate::codec::base64::decode(payload)?)
    } else {
        Ok(percent_encoding::percent_decode_str(payload).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    #[cfg(feature = "runtime-tokio")]
    async fn resolves_bytes_spec() {
        let spec = ContentSpec::Bytes(b"hello".to_vec());
        let resolved = spec.resolve(ResolveOptions::default()).await.unwrap();
        assert_eq!(resolved, b"hello");
    }

    #[tokio::test]
    #[cfg(feature = "runtime-tokio")]
    async fn text_spec_ignores_encoding_label_and_uses_utf8_bytes() {
        let spec = ContentSpec::Text { data: "héllo".to_string(), encoding: "iso-8859-1".to_string() };
        let resolved = spec.resolve(ResolveOptions::default()).await.unwrap();
        assert_eq!(resolved, "héllo".as_bytes());
    }

    #[test]
    fn decodes_base64_data_uri() {
        let uri = "data:text/plain;base64,aGVsbG8=";
        assert_eq!(decode_data_uri(uri).unwrap(), b"hello");
    }

    #[test]
    fn decodes_percent_encoded_data_uri() {
        let uri = "data:text/plain,hello%20world";
        assert_eq!(decode_data_uri(uri).unwrap(), b"hello world");
    }

    #[test]
    fn rejects_data_uri_with_no_comma() {
        assert!(decode_data_uri("data:text/plain;base64").is_err());
    }
}
