//! Streaming base64 encoder used for binary MIME parts.
//!
//! Groups input into 3-byte units and emits 4 base64 characters per group,
//! inserting `\r\n` every 76 output characters unless wrapping is disabled.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const LINE_LEN: usize = 76;

/// Incremental base64 encoder with soft line wrapping.
///
/// Bytes may be fed in via repeated calls to [`Base64Encoder::push`]; a 1-3 byte
/// tail is buffered across calls so callers may feed arbitrarily small chunks.
#[derive(Default, Clone, Debug)]
pub struct Base64Encoder {
    tail: [u8; 2],
    tail_len: u8,
    col: usize,
    wrap: bool,
}

impl Base64Encoder {
    /// Creates a new encoder. `wrap` enables the 76-column soft wrap (RFC 2045).
    pub fn new(wrap: bool) -> Self {
        Base64Encoder {
            tail: [0; 2],
            tail_len: 0,
            col: 0,
            wrap,
        }
    }

    /// Encodes `input`, appending output (including any soft-wrap CRLFs) to `out`.
    pub fn push(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut buf = Vec::with_capacity(self.tail_len as usize + input.len());
        buf.extend_from_slice(&self.tail[..self.tail_len as usize]);
        buf.extend_from_slice(input);

        let mut chunks = buf.chunks_exact(3);
        for chunk in &mut chunks {
            self.emit_group(chunk[0], chunk[1], chunk[2], 4, out);
        }
        let rem = chunks.remainder();
        self.tail_len = rem.len() as u8;
        self.tail[..rem.len()].copy_from_slice(rem);
    }

    /// Flushes any buffered tail bytes, emitting final padding.
    pub fn finish(mut self, out: &mut Vec<u8>) {
        match self.tail_len {
            0 => {}
            1 => self.emit_group(self.tail[0], 0, 0, 2, out),
            2 => self.emit_group(self.tail[0], self.tail[1], 0, 3, out),
            _ => unreachable!(),
        }
    }

    fn emit_group(&mut self, b0: u8, b1: u8, b2: u8, valid_chars: u8, out: &mut Vec<u8>) {
        let n = (b0 as u32) << 16 | (b1 as u32) << 8 | b2 as u32;
        let chars = [
            ALPHABET[(n >> 18 & 0x3f) as usize],
            ALPHABET[(n >> 12 & 0x3f) as usize],
            if valid_chars > 2 {
                ALPHABET[(n >> 6 & 0x3f) as usize]
            } else {
                b'='
            },
            if valid_chars > 3 {
                ALPHABET[(n & 0x3f) as usize]
            } else {
                b'='
            },
        ];
        for &c in &chars {
            if self.wrap && self.col == LINE_LEN {
                out.extend_from_slice(b"\r\n");
                self.col = 0;
            }
            out.push(c);
            self.col += 1;
        }
    }
}

/// One-shot helper: base64-encodes `data` with 76-column soft wraps.
pub fn encode_wrapped(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 4 / 3 + data.len() / LINE_LEN * 2 + 8);
    let mut enc = Base64Encoder::new(true);
    enc.push(data, &mut out);
    enc.finish(&mut out);
    out
}

/// One-shot helper: base64-encodes `data` with no line wrapping.
pub fn encode_unwrapped(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len() * 4 / 3 + 4);
    let mut enc = Base64Encoder::new(false);
    enc.push(data, &mut out);
    enc.finish(&mut out);
    String::from_utf8(out).expect("base64 alphabet is ASCII")
}

/// Decodes a base64 string, ignoring interior CR/LF (as produced by soft wrapping).
pub fn decode(data: &str) -> Result<Vec<u8>, DecodeError> {
    let mut table = [255u8; 256];
    for (i, &c) in ALPHABET.iter().enumerate() {
        table[c as usize] = i as u8;
    }

    let mut acc: u32 = 0;
    let mut bits = 0u32;
    let mut out = Vec::with_capacity(data.len() * 3 / 4);

    for b in data.bytes() {
        if b == b'\r' || b == b'\n' || b == b' ' || b == b'\t' {
            continue;
        }
        if b == b'=' {
            break;
        }
        let v = table[b as usize];
        if v == 255 {
            return Err(DecodeError::InvalidByte(b));
        }
        acc = (acc << 6) | v as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }

    Ok(out)
}

/// Error decoding a base64 payload.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A byte outside of the base64 alphabet (and not padding/whitespace) was found.
    #[error("invalid base64 byte: {0:#x}")]
    InvalidByte(u8),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_various_lengths() {
        for len in 0..260 {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
            let wrapped = encode_wrapped(&data);
            for line in wrapped.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                assert!(line.len() <= 76, "line too long: {}", line.len());
            }
            let text = String::from_utf8(wrapped).unwrap();
            let decoded = decode(&text).unwrap();
            assert_eq!(decoded, data, "roundtrip failed at len={}", len);
        }
    }

    #[test]
    fn incremental_push_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog, 1234567890!!";
        let mut out = Vec::new();
        let mut enc = Base64Encoder::new(true);
        for chunk in data.chunks(5) {
            enc.push(chunk, &mut out);
        }
        enc.finish(&mut out);
        assert_eq!(out, encode_wrapped(data));
    }

    #[test]
    fn unwrapped_has_no_crlf() {
        let data = vec![0u8; 200];
        let enc = encode_unwrapped(&data);
        assert!(!enc.contains('\n'));
    }
}
