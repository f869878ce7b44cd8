//! Newline normalisers used at the end of the serialisation pipeline.

/// Converts lone `\n` and lone `\r` into `\r\n`, carrying a one-byte lookbehind
/// across chunk boundaries so a `\r` at the end of one chunk and a `\n` at the
/// start of the next are recognised as a single CRLF rather than doubled.
#[derive(Default, Clone, Copy, Debug)]
pub struct ToCrlf {
    pending_cr: bool,
}

impl ToCrlf {
    /// Creates a fresh normaliser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `input` through the normaliser, appending output to `out`.
    pub fn push(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    out.extend_from_slice(b"\r\n");
                    continue;
                }
                out.extend_from_slice(b"\r\n");
            }
            match b {
                b'\r' => self.pending_cr = true,
                b'\n' => out.extend_from_slice(b"\r\n"),
                _ => out.push(b),
            }
        }
    }

    /// Flushes a trailing lone `\r`, if any.
    pub fn finish(self, out: &mut Vec<u8>) {
        if self.pending_cr {
            out.extend_from_slice(b"\r\n");
        }
    }
}

/// One-shot helper converting all line endings in `data` to CRLF.
pub fn to_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 40);
    let mut norm = ToCrlf::new();
    norm.push(data, &mut out);
    norm.finish(&mut out);
    out
}

/// Strips `\r` from a stream, leaving lone `\n` line endings.
pub fn to_lf(data: &[u8]) -> Vec<u8> {
    data.iter().copied().filter(|&b| b != b'\r').collect()
}

/// Guarantees the output ends with a CRLF, appending one if the input is empty or
/// does not already end in CRLF.
pub fn ensure_trailing_newline(data: &[u8]) -> Vec<u8> {
    if data.ends_with(b"\r\n") {
        data.to_vec()
    } else {
        let mut out = data.to_vec();
        out.extend_from_slice(b"\r\n");
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converts_lone_lf_and_cr() {
        assert_eq!(to_crlf(b"a\nb\rc\r\nd"), b"a\r\nb\r\nc\r\nd");
    }

    #[test]
    fn lookbehind_across_chunks() {
        let mut out = Vec::new();
        let mut norm = ToCrlf::new();
        norm.push(b"a\r", &mut out);
        norm.push(b"\nb", &mut out);
        norm.finish(&mut out);
        assert_eq!(out, b"a\r\nb");
    }

    #[test]
    fn ensure_trailing_newline_is_idempotent() {
        assert_eq!(ensure_trailing_newline(b"x\r\n"), b"x\r\n");
        assert_eq!(ensure_trailing_newline(b"x"), b"x\r\n");
        assert_eq!(ensure_trailing_newline(b""), b"\r\n");
    }

    #[test]
    fn to_lf_strips_cr() {
        assert_eq!(to_lf(b"a\r\nb\rc"), b"a\nbc");
    }
}
