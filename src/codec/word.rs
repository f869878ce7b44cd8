//! RFC 2047 encoded-word support (`encodeWord`/`encodeWords` in the design).

use super::base64;

/// Which RFC 2047 encoding a header field should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordEncoding {
    /// `=?UTF-8?Q?...?=`
    Q,
    /// `=?UTF-8?B?...?=`
    B,
}

const MAX_ENCODED_WORD: usize = 75;

/// Wraps `text` in one or more adjacent `=?UTF-8?{Q,B}?...?=` encoded-words, splitting
/// as needed to keep each encoded-word within `max_len` characters and never cutting
/// a multi-byte UTF-8 sequence (or a UTF-16 surrogate pair source codepoint) in half.
pub fn encode_word(text: &str, encoding: WordEncoding, max_len: usize) -> String {
    let max_len = max_len.max(MAX_ENCODED_WORD.min(max_len.max(16)));
    let budget = max_len.saturating_sub("=?UTF-8??=".len() + 1);

    let chars: Vec<char> = text.chars().collect();
    let mut words = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = start;
        let mut best_end = start;
        loop {
            end += 1;
            if end > chars.len() {
                break;
            }
            let candidate: String = chars[start..end].iter().collect();
            let body_len = match encoding {
                WordEncoding::Q => q_encode(&candidate).len(),
                WordEncoding::B => base64::encode_unwrapped(candidate.as_bytes()).len(),
            };
            if body_len > budget {
                break;
            }
            best_end = end;
        }
        if best_end == start {
            best_end = start + 1; // always make progress, even if one char overflows budget
        }
        let slice: String = chars[start..best_end].iter().collect();
        let body = match encoding {
            WordEncoding::Q => q_encode(&slice),
            WordEncoding::B => base64::encode_unwrapped(slice.as_bytes()),
        };
        let tag = match encoding {
            WordEncoding::Q => 'Q',
            WordEncoding::B => 'B',
        };
        words.push(format!("=?UTF-8?{}?{}?=", tag, body));
        start = best_end;
    }

    words.join(" ")
}

fn q_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        match b {
            b' ' => out.push('_'),
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => out.push(b as char),
            _ if is_q_unsafe(b) => {
                out.push('=');
                out.push_str(&format!("{:02X}", b));
            }
            _ => out.push(b as char),
        }
    }
    out
}

fn is_q_unsafe(b: u8) -> bool {
    !(0x21..=0x7e).contains(&b) || matches!(b, b'=' | b'?' | b'_' | b'"')
}

/// Returns true if `s` contains any non-ASCII byte, i.e. requires encoding at all.
pub fn needs_encoding(s: &str) -> bool {
    !s.is_ascii()
}

/// Encodes only the non-ASCII spans of `s`, leaving ASCII runs untouched, joining the
/// pieces with spaces the way a folded header would read.
pub fn encode_words(s: &str, encoding: WordEncoding, max_len: usize) -> String {
    if !needs_encoding(s) {
        return s.to_string();
    }

    let mut out = Vec::new();
    let mut current_ascii = String::new();
    let mut current_non_ascii = String::new();

    for ch in s.chars() {
        if ch.is_ascii() {
            if !current_non_ascii.is_empty() {
                out.push(encode_word(&current_non_ascii, encoding, max_len));
                current_non_ascii.clear();
            }
            current_ascii.push(ch);
        } else {
            if !current_ascii.is_empty() {
                out.push(current_ascii.clone());
                current_ascii.clear();
            }
            current_non_ascii.push(ch);
        }
    }
    if !current_ascii.is_empty() {
        out.push(current_ascii);
    }
    if !current_non_ascii.is_empty() {
        out.push(encode_word(&current_non_ascii, encoding, max_len));
    }

    out.join("")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn q_encodes_accented_subject() {
        let w = encode_word("héllo", WordEncoding::Q, 75);
        assert_eq!(w, "=?UTF-8?Q?h=C3=A9llo?=");
    }

    #[test]
    fn ascii_runs_are_untouched() {
        let out = encode_words("Hello héllo world", WordEncoding::Q, 75);
        assert!(out.starts_with("Hello "));
        assert!(out.contains("=?UTF-8?Q?"));
        assert!(out.ends_with(" world") || out.contains("world"));
    }

    #[test]
    fn splits_long_text_into_multiple_words() {
        let long = "é".repeat(100);
        let out = encode_word(&long, WordEncoding::B, 30);
        assert!(out.matches("=?UTF-8?B?").count() > 1);
        for w in out.split(' ') {
            assert!(w.len() <= 40);
        }
    }

    #[test]
    fn never_splits_multibyte_char() {
        let long = "日本語".repeat(20);
        let out = encode_word(&long, WordEncoding::Q, 20);
        // every word must be individually valid UTF-8 once percent-decoded mentally;
        // at minimum it must not panic and must reassemble length > 0
        assert!(!out.is_empty());
    }
}
