//! RFC 2231 header parameter continuation (`name*0*=utf-8''...; name*1*=...`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

const PARAM_VALUE_THRESHOLD: usize = 50;
const CONTINUATION_CHUNK: usize = 50;

const EXTENDED_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'"')
    .add(b';')
    .add(b',')
    .add(b'\'')
    .add(b'*')
    .add(b'(')
    .add(b')');

/// Renders a single `name=value` parameter, switching to RFC 2231 continuation
/// segments when `value` is long or non-ASCII.
pub fn encode_param(name: &str, value: &str) -> String {
    if value.is_ascii() && value.len() <= PARAM_VALUE_THRESHOLD && !needs_quoting(value) {
        return format!("{}={}", name, value);
    }
    if value.is_ascii() && value.len() <= PARAM_VALUE_THRESHOLD {
        return format!("{}=\"{}\"", name, value.replace('\\', "\\\\").replace('"', "\\\""));
    }

    let encoded: String = utf8_percent_encode(value, EXTENDED_VALUE).to_string();
    let chars: Vec<char> = encoded.chars().collect();
    let mut segments = Vec::new();
    let mut idx = 0;
    let mut ordinal = 0;
    while idx < chars.len() || segments.is_empty() {
        let end = (idx + CONTINUATION_CHUNK).min(chars.len());
        let chunk: String = chars[idx..end].iter().collect();
        if ordinal == 0 {
            segments.push(format!("{}*0*=utf-8''{}", name, chunk));
        } else {
            segments.push(format!("{}*{}*={}", name, ordinal, chunk));
        }
        ordinal += 1;
        idx = end;
        if idx >= chars.len() {
            break;
        }
    }
    segments.join("; ")
}

fn needs_quoting(value: &str) -> bool {
    value
        .bytes()
        .any(|b| b.is_ascii_whitespace() || matches!(b, b'"' | b';' | b'(' | b')' | b','))
}

/// A parsed RFC 2231 parameter, coalesced across its continuation segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedParam {
    /// Parameter name.
    pub name: String,
    /// Fully reassembled, percent-decoded value.
    pub value: String,
}

/// Parses a `Content-Type`/`Content-Disposition` parameter tail (everything after the
/// leading `;`), coalescing `name*N*=` continuation segments by ordinal.
pub fn decode_params(tail: &str) -> Vec<DecodedParam> {
    let mut raw: Vec<(String, Option<usize>, bool, String)> = Vec::new();

    for part in split_params(tail) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some(eq) = part.find('=') else { continue };
        let key = &part[..eq];
        let mut value = part[eq + 1..].trim();
        let quoted = value.starts_with('"') && value.ends_with('"') && value.len() >= 2;
        if quoted {
            value = &value[1..value.len() - 1];
        }

        let (base, ordinal, extended) = parse_key(key);
        raw.push((base, ordinal, extended, value.to_string()));
    }

    let mut grouped: Vec<(String, Vec<(usize, bool, String)>)> = Vec::new();
    for (base, ordinal, extended, value) in raw {
        let ord = ordinal.unwrap_or(0);
        if let Some(entry) = grouped.iter_mut().find(|(n, _)| *n == base) {
            entry.1.push((ord, extended, value));
        } else {
            grouped.push((base, vec![(ord, extended, value)]));
        }
    }

    grouped
        .into_iter()
        .map(|(name, mut segs)| {
            segs.sort_by_key(|(ord, _, _)| *ord);
            let mut value = String::new();
            let mut charset_stripped = false;
            for (i, (_, extended, raw_value)) in segs.iter().enumerate() {
                if *extended {
                    let mut v = raw_value.as_str();
                    if i == 0 && !charset_stripped {
                        if let Some(pos) = v.find("''") {
                            v = &v[pos + 2..];
                            charset_stripped = true;
                        }
                    }
                    let decoded = percent_decode_str(v).decode_utf8_lossy();
                    value.push_str(&decoded);
                } else {
                    value.push_str(raw_value);
                }
            }
            DecodedParam { name, value }
        })
        .collect()
}

fn parse_key(key: &str) -> (String, Option<usize>, bool) {
    let extended = key.ends_with('*');
    let key = key.trim_end_matches('*');
    if let Some(star) = key.find('*') {
        let base = key[..star].to_string();
        let ord: Option<usize> = key[star + 1..].parse().ok();
        (base, ord, extended || ord.is_some())
    } else {
        (key.to_string(), None, extended)
    }
}

fn split_params(tail: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in tail.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_ascii_value_is_plain() {
        assert_eq!(encode_param("name", "report.pdf"), "name=report.pdf");
    }

    #[test]
    fn long_or_nonascii_uses_continuation() {
        let value = "a".repeat(80);
        let encoded = encode_param("name", &value);
        assert!(encoded.contains("name*0*=utf-8''"));
        assert!(encoded.contains("name*1*="));
    }

    #[test]
    fn roundtrip_continuation() {
        let value = "résumé final — a very long attachment name.pdf";
        let encoded = encode_param("filename", value);
        let decoded = decode_params(&encoded);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "filename");
        assert_eq!(decoded[0].value, value);
    }

    #[test]
    fn decodes_simple_quoted_param() {
        let decoded = decode_params(r#"name="report.pdf""#);
        assert_eq!(decoded[0].value, "report.pdf");
    }
}
