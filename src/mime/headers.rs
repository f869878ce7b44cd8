//! Per-field header-value encoding policy.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::address::{parse_address_list, Address};
use crate::codec::idna;
use crate::codec::param::encode_param;
use crate::codec::word::{encode_words, needs_encoding, WordEncoding};

/// Fields whose value is a comma-separated address list and gets the address
/// encoding policy (display-name encoded-words, IDN domains, group syntax kept).
pub const ADDRESS_FIELDS: &[&str] =
    &["From", "Sender", "To", "Cc", "Bcc", "Reply-To"];

/// Renders an address-list header value: parses `raw`, re-encodes each address
/// and rejoins with `, `. Falls back to `encode_words` on the untouched input if
/// parsing fails, so a malformed address never panics the composer.
pub fn encode_address_field(raw: &str) -> String {
    match parse_address_list(raw) {
        Ok(addresses) => {
            let rendered: Vec<String> = addresses
                .iter()
                .filter_map(|a| a.to_header_value().ok())
                .collect();
            if rendered.is_empty() {
                encode_words(raw, WordEncoding::Q, 75)
            } else {
                rendered.join(", ")
            }
        }
        Err(_) => encode_words(raw, WordEncoding::Q, 75),
    }
}

/// Wraps a `Message-ID`/`In-Reply-To`/`Content-Id` value in `< >` if missing and
/// encode-words its content when non-ASCII.
pub fn encode_id_field(raw: &str) -> String {
    let inner = raw.trim().trim_start_matches('<').trim_end_matches('>');
    let inner = if needs_encoding(inner) {
        encode_words(inner, WordEncoding::Q, 75)
    } else {
        inner.to_string()
    };
    format!("<{}>", inner)
}

/// Splits a `References` value on whitespace, `< >`-wraps each token, rejoins
/// with single spaces.
pub fn encode_references_field(raw: &str) -> String {
    raw.split_whitespace()
        .map(encode_id_field)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats a `Date` header value as RFC 5322, always in UTC with a `+0000` tail.
pub fn encode_date_field(timestamp: DateTime<Utc>) -> String {
    // `to_rfc2822` already yields "Mon, 2 Jan 2006 15:04:05 +0000" for a Utc
    // DateTime; SecondsFormat is unused here but kept for symmetry with ISO
    // timestamps elsewhere in the composer.
    let _ = SecondsFormat::Secs;
    timestamp.to_rfc2822()
}

/// One parsed `Content-Type`/`Content-Disposition` value: the bare value
/// (`text/plain`, `attachment`, ...) plus its `;`-separated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredValue {
    /// The leading value before any parameters.
    pub value: String,
    /// Parameters in declaration order.
    pub params: Vec<(String, String)>,
}

impl StructuredValue {
    /// Constructs a bare value with no parameters.
    pub fn new(value: impl Into<String>) -> Self {
        StructuredValue { value: value.into(), params: Vec::new() }
    }

    /// Appends a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Renders this value with RFC 2231 parameter continuation, adding a
    /// legacy `name=` alias alongside `filename` for older clients.
    pub fn render(&self) -> String {
        let mut out = self.value.clone();
        let mut params = self.params.clone();

        if let Some((_, filename)) = params.iter().find(|(k, _)| k == "filename").cloned() {
            if !params.iter().any(|(k, _)| k == "name") {
                params.push(("name".to_string(), filename));
            }
        }

        for (key, value) in &params {
            out.push_str("; ");
            out.push_str(&encode_param(key, value));
        }
        out
    }
}

/// Encodes an arbitrary header field not covered by a dedicated policy:
/// `encode_words` if non-ASCII, unchanged otherwise.
pub fn encode_generic_field(raw: &str) -> String {
    if needs_encoding(raw) {
        encode_words(raw, WordEncoding::Q, 75)
    } else {
        raw.to_string()
    }
}

/// Dispatches to the right encoding policy by header field name.
pub fn encode_field(name: &str, raw: &str) -> String {
    if ADDRESS_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name)) {
        encode_address_field(raw)
    } else if matches!(name.to_ascii_lowercase().as_str(), "message-id" | "in-reply-to" | "content-id") {
        encode_id_field(raw)
    } else if name.eq_ignore_ascii_case("references") {
        encode_references_field(raw)
    } else {
        encode_generic_field(raw)
    }
}

/// IDNA-encodes the domain part of a bare `local@domain` address, leaving
/// addresses with no `@` untouched.
pub fn idna_encode_address(address: &str) -> Result<String, idna::Error> {
    match address.split_once('@') {
        Some((local, domain)) => Ok(format!("{}@{}", local, idna::to_ascii(domain)?)),
        None => Ok(address.to_string()),
    }
}

/// Renders a slice of [`Address`] values the way a `From`/`To`/`Cc` header body
/// should look, joined with `, `.
pub fn render_address_list(addresses: &[Address]) -> String {
    addresses
        .iter()
        .filter_map(|a| a.to_header_value().ok())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_address_field_with_nonascii_name() {
        let out = encode_address_field("José <jose@example.com>");
        assert!(out.contains("=?UTF-8?Q?"));
    }

    #[test]
    fn wraps_message_id() {
        assert_eq!(encode_id_field("abc@example.com"), "<abc@example.com>");
        assert_eq!(encode_id_field("<abc@example.com>"), "<abc@example.com>");
    }

    #[test]
    fn references_field_wraps_each_token() {
        let out = encode_references_field("a@x b@y");
        assert_eq!(out, "<a@x> <b@y>");
    }

    #[test]
    fn structured_value_adds_legacy_name_alias() {
        let value = StructuredValue::new("attachment").with_param("filename", "report.pdf");
        let rendered = value.render();
        assert!(rendered.contains("filename=report.pdf"));
        assert!(rendered.contains("name=report.pdf"));
    }

    #[test]
    fn generic_field_untouched_when_ascii() {
        assert_eq!(encode_generic_field("plain text"), "plain text");
    }
}
