//! Content-Transfer-Encoding selection (RFC 2045 §6).

/// A `Content-Transfer-Encoding` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// Passed through unchanged; requires all-ASCII, short lines.
    SevenBit,
    /// Passed through unchanged; permits 8-bit bytes (requires 8BITMIME).
    EightBit,
    /// RFC 2045 §6.7 quoted-printable.
    QuotedPrintable,
    /// RFC 2045 §6.8 base64.
    Base64,
    /// Raw binary, no transformation (requires BINARYMIME, rarely used).
    Binary,
}

impl TransferEncoding {
    /// The header value string for this encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::Binary => "binary",
        }
    }
}

/// Selects a transfer encoding for a `text/*` leaf given its rendered bytes.
///
/// All-printable-ASCII content with no line longer than 76 bytes is sent as
/// `7bit`. Otherwise the encoder picks quoted-printable or base64 by the ratio
/// of non-Latin-1 to Latin-1 characters in the decoded text: base64 wins once
/// non-Latin-1 content dominates, since at that point QP's per-byte escape
/// overhead exceeds base64's fixed 4-for-3 expansion.
pub fn select_for_text(data: &str) -> TransferEncoding {
    if is_plain_seven_bit(data) {
        return TransferEncoding::SevenBit;
    }

    let mut latin1 = 0usize;
    let mut non_latin1 = 0usize;
    for ch in data.chars() {
        if (ch as u32) <= 0xFF {
            latin1 += 1;
        } else {
            non_latin1 += 1;
        }
    }

    if non_latin1 > latin1 {
        TransferEncoding::Base64
    } else {
        TransferEncoding::QuotedPrintable
    }
}

fn is_plain_seven_bit(data: &str) -> bool {
    if !data.is_ascii() {
        return false;
    }
    data.lines().all(|line| line.len() <= 76)
}

/// Selects a transfer encoding for a leaf whose content-type is neither
/// `text/*` nor a structural type (`multipart/*`, `message/*`): always base64
/// unless the caller pinned something else.
pub fn select_for_binary() -> TransferEncoding {
    TransferEncoding::Base64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_ascii_is_seven_bit() {
        assert_eq!(select_for_text("hello world\r\n"), TransferEncoding::SevenBit);
    }

    #[test]
    fn long_line_forces_encoding() {
        let long = "a".repeat(200);
        assert_ne!(select_for_text(&long), TransferEncoding::SevenBit);
    }

    #[test]
    fn mostly_latin_picks_quoted_printable() {
        let text = format!("café {}", "a".repeat(50));
        assert_eq!(select_for_text(&text), TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn mostly_non_latin_picks_base64() {
        let text = "日本語".repeat(20);
        assert_eq!(select_for_text(&text), TransferEncoding::Base64);
    }

    #[test]
    fn binary_leaf_defaults_to_base64() {
        assert_eq!(select_for_binary(), TransferEncoding::Base64);
    }
}
