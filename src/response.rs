//! SMTP reply parsing (RFC 5321 §4.2): the three-digit status code and its
//! (possibly multi-line) text.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::Error;

/// The first digit of a reply code: broad category of outcome.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Severity {
    /// `2xx`: the requested action was successful.
    PositiveCompletion,
    /// `3xx`: the command was accepted, but more information is required.
    PositiveIntermediate,
    /// `4xx`: the command failed, but may succeed if retried.
    TransientNegativeCompletion,
    /// `5xx`: the command failed and should not be retried unmodified.
    PermanentNegativeCompletion,
}

impl Severity {
    fn from_digit(d: u8) -> Result<Severity, Error> {
        match d {
            2 => Ok(Severity::PositiveCompletion),
            3 => Ok(Severity::PositiveIntermediate),
            4 => Ok(Severity::TransientNegativeCompletion),
            5 => Ok(Severity::PermanentNegativeCompletion),
            _ => Err(Error::ResponseParsing("invalid severity digit")),
        }
    }

    fn digit(self) -> u8 {
        match self {
            Severity::PositiveCompletion => 2,
            Severity::PositiveIntermediate => 3,
            Severity::TransientNegativeCompletion => 4,
            Severity::PermanentNegativeCompletion => 5,
        }
    }
}

/// The second digit of a reply code: the functional category.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Category {
    /// `x0x`: syntax errors.
    Syntax,
    /// `x1x`: informational replies.
    Information,
    /// `x2x`: connection-related replies.
    Connections,
    /// `x3x` / `x4x`: unspecified as of RFC 5321.
    Unspecified3,
    /// `x4x`: unspecified as of RFC 5321.
    Unspecified4,
    /// `x5x`: mail system replies.
    MailSystem,
}

impl Category {
    fn from_digit(d: u8) -> Result<Category, Error> {
        match d {
            0 => Ok(Category::Syntax),
            1 => Ok(Category::Information),
            2 => Ok(Category::Connections),
            3 => Ok(Category::Unspecified3),
            4 => Ok(Category::Unspecified4),
            5 => Ok(Category::MailSystem),
            _ => Err(Error::ResponseParsing("invalid category digit")),
        }
    }

    fn digit(self) -> u8 {
        match self {
            Category::Syntax => 0,
            Category::Information => 1,
            Category::Connections => 2,
            Category::Unspecified3 => 3,
            Category::Unspecified4 => 4,
            Category::MailSystem => 5,
        }
    }
}

/// The third digit of a reply code.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Detail {
    /// `0`
    Zero,
    /// `1`
    One,
    /// `2`
    Two,
    /// `3`
    Three,
    /// `4`
    Four,
    /// `5`
    Five,
    /// `6`
    Six,
    /// `7`
    Seven,
    /// `8`
    Eight,
    /// `9`
    Nine,
}

impl Detail {
    fn from_digit(d: u8) -> Result<Detail, Error> {
        Ok(match d {
            0 => Detail::Zero,
            1 => Detail::One,
            2 => Detail::Two,
            3 => Detail::Three,
            4 => Detail::Four,
            5 => Detail::Five,
            6 => Detail::Six,
            7 => Detail::Seven,
            8 => Detail::Eight,
            9 => Detail::Nine,
            _ => return Err(Error::ResponseParsing("invalid detail digit")),
        })
    }

    fn digit(self) -> u8 {
        match self {
            Detail::Zero => 0,
            Detail::One => 1,
            Detail::Two => 2,
            Detail::Three => 3,
            Detail::Four => 4,
            Detail::Five => 5,
            Detail::Six => 6,
            Detail::Seven => 7,
            Detail::Eight => 8,
            Detail::Nine => 9,
        }
    }
}

/// A parsed three-digit SMTP reply code.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Code {
    /// First digit.
    pub severity: Severity,
    /// Second digit.
    pub category: Category,
    /// Third digit.
    pub detail: Detail,
}

impl Code {
    /// Builds a code from its three digits.
    pub fn new(severity: Severity, category: Category, detail: Detail) -> Code {
        Code { severity, category, detail }
    }

    /// The numeric value, e.g. `250`.
    pub fn value(self) -> u16 {
        self.severity.digit() as u16 * 100 + self.category.digit() as u16 * 10 + self.detail.digit() as u16
    }
}

impl FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Code, Error> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(Error::ResponseParsing("reply code must be exactly three digits"));
        }
        let severity = Severity::from_digit(bytes[0] - b'0')?;
        let category = Category::from_digit(bytes[1] - b'0')?;
        let detail = Detail::from_digit(bytes[2] - b'0')?;
        Ok(Code::new(severity, category, detail))
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:03}", self.value())
    }
}

/// A complete (possibly multi-line) SMTP server reply.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Response {
    /// The reply code, taken from the final line of a multi-line reply.
    pub code: Code,
    /// Each line's text (without the leading code and separator).
    pub message: Vec<String>,
}

impl Response {
    /// Builds a response from a code and its message lines.
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// `true` if this response's code equals `code`.
    pub fn has_code(&self, code: u16) -> bool {
        self.code.value() == code
    }

    /// The first whitespace-delimited word of the first message line, e.g. the
    /// server name in an EHLO greeting or the base64 challenge in a `334` reply.
    pub fn first_word(&self) -> Option<&str> {
        self.message.first().and_then(|line| line.split_whitespace().next())
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.message.is_empty() {
            return write!(f, "{}", self.code);
        }
        for (i, line) in self.message.iter().enumerate() {
            let sep = if i + 1 == self.message.len() { ' ' } else { '-' };
            writeln!(f, "{}{}{}", self.code, sep, line)?;
        }
        Ok(())
    }
}

/// Parses one complete multi-line SMTP reply (already split on CRLF by the
/// caller) into a [`Response`]. Every line must share the same code; a line is
/// "final" when its separator is a space rather than a hyphen.
pub fn parse_reply<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Response, Error> {
    let mut code = None;
    let mut message = Vec::new();

    for line in lines {
        if line.len() < 4 {
            return Err(Error::ResponseParsing("reply line too short"));
        }
        let (code_str, rest) = line.split_at(3);
        let parsed_code: Code = code_str.parse()?;
        match code {
            None => code = Some(parsed_code),
            Some(c) if c != parsed_code => {
                return Err(Error::ResponseParsing("reply code changed mid-response"))
            }
            _ => {}
        }
        message.push(rest[1..].to_string());
    }

    let code = code.ok_or(Error::ResponseParsing("empty reply"))?;
    Ok(Response::new(code, message))
}

/// Given one freshly-read line, reports whether it is the *final* line of a
/// multi-line reply (`NNN ` separator) as opposed to a continuation (`NNN-`).
pub fn is_final_line(line: &str) -> bool {
    line.as_bytes().get(3).copied() != Some(b'-')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_single_line_reply() {
        let response = parse_reply(["250 OK"]).unwrap();
        assert_eq!(response.code.value(), 250);
        assert_eq!(response.message, vec!["OK".to_string()]);
    }

    #[test]
    fn parses_multiline_reply() {
        let response = parse_reply(["250-PIPELINING", "250-SIZE 42", "250 8BITMIME"]).unwrap();
        assert_eq!(response.code.value(), 250);
        assert_eq!(response.message.len(), 3);
    }

    #[test]
    fn rejects_mismatched_codes_mid_reply() {
        assert!(parse_reply(["250-one", "251 two"]).is_err());
    }

    #[test]
    fn detects_final_vs_continuation_line() {
        assert!(!is_final_line("250-PIPELINING"));
        assert!(is_final_line("250 8BITMIME"));
    }

    #[test]
    fn first_word_extracts_challenge() {
        let response = Response::new(
            Code::new(Severity::PositiveIntermediate, Category::Unspecified3, Detail::Four),
            vec!["dGVzdA==".to_string()],
        );
        assert_eq!(response.first_word(), Some("dGVzdA=="));
        assert!(response.has_code(334));
    }
}
