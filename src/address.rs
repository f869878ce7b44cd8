//! RFC 5322 address parsing: mailbox and group address lists as they appear in
//! `From`/`To`/`Cc`/`Reply-To` header values, independent of the bare envelope
//! [`EmailAddress`](crate::types::EmailAddress) used on the wire.

use std::fmt::{self, Display, Formatter};

use crate::codec::idna;
use crate::codec::word::{encode_words, needs_encoding, WordEncoding};

/// A single display-name/address pair, or a named group of them, as found in a
/// structured address header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `"Display Name" <user@host>` or bare `user@host`.
    Mailbox {
        /// Optional display name (`phrase` in RFC 5322 grammar).
        name: Option<String>,
        /// The `local@domain` address.
        address: String,
    },
    /// `group-name: member, member;` — members may themselves be mailboxes only;
    /// nested groups are not legal per RFC 5322 and are rejected while parsing.
    Group {
        /// The group display name.
        name: String,
        /// The group's member mailboxes.
        members: Vec<Address>,
    },
}

/// Error parsing a structured address header value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input ended while a quoted string, comment or angle-address was open.
    #[error("unterminated {0} in address header")]
    Unterminated(&'static str),
    /// A group was nested inside another group, which RFC 5322 does not permit.
    #[error("nested groups are not permitted")]
    NestedGroup,
    /// An address contained no `@` and no host part could be inferred.
    #[error("address has no domain part: {0}")]
    MissingDomain(String),
}

impl Address {
    /// Builds a plain mailbox with no display name.
    pub fn mailbox(address: impl Into<String>) -> Self {
        Address::Mailbox {
            name: None,
            address: address.into(),
        }
    }

    /// Builds a mailbox with a display name.
    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Address::Mailbox {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Renders this address the way it should appear in a header value: display
    /// names are RFC 2047 encoded-word escaped when non-ASCII, and the domain part
    /// of every address is punycode-escaped when non-ASCII.
    pub fn to_header_value(&self) -> Result<String, idna::Error> {
        match self {
            Address::Mailbox { name, address } => {
                let address = ascii_address(address)?;
                match name {
                    Some(name) if needs_encoding(name) => {
                        Ok(format!("{} <{}>", encode_words(name, WordEncoding::Q, 75), address))
                    }
                    Some(name) if name_needs_quoting(name) => {
                        Ok(format!("\"{}\" <{}>", name.replace('\\', "\\\\").replace('"', "\\\""), address))
                    }
                    Some(name) => Ok(format!("{} <{}>", name, address)),
                    None => Ok(address),
                }
            }
            Address::Group { name, members } => {
                let rendered: Result<Vec<String>, idna::Error> =
                    members.iter().map(Address::to_header_value).collect();
                Ok(format!("{}: {};", name, rendered?.join(", ")))
            }
        }
    }

    /// Flattens this address (or group) into its constituent envelope addresses.
    pub fn envelope_addresses(&self) -> Vec<&str> {
        match self {
            Address::Mailbox { address, .. } => vec![address.as_str()],
            Address::Group { members, .. } => {
                members.iter().flat_map(Address::envelope_addresses).collect()
            }
        }
    }
}

fn ascii_address(address: &str) -> Result<String, idna::Error> {
    match address.split_once('@') {
        Some((local, domain)) => Ok(format!("{}@{}", local, idna::to_ascii(domain)?)),
        None => Ok(address.to_string()),
    }
}

fn name_needs_quoting(name: &str) -> bool {
    name.bytes()
        .any(|b| matches!(b, b',' | b'"' | b'<' | b'>' | b':' | b';' | b'@' | b'\\'))
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_header_value() {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("<invalid address>"),
        }
    }
}

/// Parses an RFC 5322 address list (the value of a `To`/`Cc`/`From` header, comma
/// separated) into structured [`Address`] values.
pub fn parse_address_list(input: &str) -> Result<Vec<Address>, Error> {
    let mut parser = Parser::new(input);
    parser.parse_list(false)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    _input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            chars: input.chars().collect(),
            pos: 0,
            _input: input,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), Error> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('(') => {
                    self.advance();
                    let mut depth = 1;
                    while depth > 0 {
                        match self.advance() {
                            Some('(') => depth += 1,
                            Some(')') => depth -= 1,
                            Some(_) => {}
                            None => return Err(Error::Unterminated("comment")),
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_list(&mut self, in_group: bool) -> Result<Vec<Address>, Error> {
        let mut out = Vec::new();
        loop {
            self.skip_ws_and_comments()?;
            if self.peek().is_none() {
                break;
            }
            if in_group && self.peek() == Some(';') {
                break;
            }
            out.push(self.parse_one()?);
            self.skip_ws_and_comments()?;
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(out)
    }

    /// Parses one `phrase <addr>`, bare `addr`, or `group-name: member, member;`.
    fn parse_one(&mut self) -> Result<Address, Error> {
        let start = self.pos;
        let phrase = self.parse_phrase_or_word_run()?;

        self.skip_ws_and_comments()?;
        match self.peek() {
            Some(':') => {
                // group
                self.advance();
                let members = self.parse_list(true)?;
                for m in &members {
                    if matches!(m, Address::Group { .. }) {
                        return Err(Error::NestedGroup);
                    }
                }
                self.skip_ws_and_comments()?;
                if self.peek() == Some(';') {
                    self.advance();
                }
                Ok(Address::Group {
                    name: phrase.trim().to_string(),
                    members,
                })
            }
            Some('<') => {
                self.advance();
                let addr = self.parse_until('>')?;
                if self.peek() == Some('>') {
                    self.advance();
                }
                let name = phrase.trim();
                Ok(Address::Mailbox {
                    name: if name.is_empty() { None } else { Some(name.to_string()) },
                    address: addr.trim().to_string(),
                })
            }
            _ => {
                // no angle address: the phrase we consumed IS the address
                let addr = self.chars[start..self.pos].iter().collect::<String>();
                let addr = addr.trim();
                if !addr.contains('@') {
                    return Err(Error::MissingDomain(addr.to_string()));
                }
                Ok(Address::Mailbox {
                    name: None,
                    address: addr.to_string(),
                })
            }
        }
    }

    /// Consumes a run of atoms/quoted-strings up to (but not including) `<`, `:`,
    /// `,` or `;`, honouring quoted strings so they may contain those characters.
    fn parse_phrase_or_word_run(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('\\') => {
                                if let Some(c) = self.advance() {
                                    out.push(c);
                                }
                            }
                            Some('"') => break,
                            Some(c) => out.push(c),
                            None => return Err(Error::Unterminated("quoted string")),
                        }
                    }
                }
                Some('(') => self.skip_ws_and_comments()?,
                Some(c) if matches!(c, '<' | ':' | ',' | ';') => break,
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
                None => break,
            }
        }
        Ok(out)
    }

    fn parse_until(&mut self, stop: char) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(c) if c == stop => break,
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
                None => return Err(Error::Unterminated("angle address")),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_bare_address() {
        let list = parse_address_list("user@example.com").unwrap();
        assert_eq!(list, vec![Address::mailbox("user@example.com")]);
    }

    #[test]
    fn parses_named_mailbox() {
        let list = parse_address_list("Jane Doe <jane@example.com>").unwrap();
        assert_eq!(list, vec![Address::named("Jane Doe", "jane@example.com")]);
    }

    #[test]
    fn parses_quoted_display_name_with_comma() {
        let list = parse_address_list("\"Doe, Jane\" <jane@example.com>").unwrap();
        assert_eq!(list, vec![Address::named("Doe, Jane", "jane@example.com")]);
    }

    #[test]
    fn parses_list_of_addresses() {
        let list = parse_address_list("a@example.com, Bob <b@example.com>").unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn parses_group() {
        let list = parse_address_list("Team: a@example.com, b@example.com;").unwrap();
        match &list[0] {
            Address::Group { name, members } => {
                assert_eq!(name, "Team");
                assert_eq!(members.len(), 2);
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn rejects_nested_group() {
        let err = parse_address_list("Outer: Inner: a@example.com;;").unwrap_err();
        assert_eq!(err, Error::NestedGroup);
    }

    #[test]
    fn header_value_encodes_nonascii_name_and_domain() {
        let addr = Address::named("José", "jose@jõgeva.ee");
        let rendered = addr.to_header_value().unwrap();
        assert!(rendered.contains("=?UTF-8?Q?"));
        assert!(rendered.contains("xn--jgeva-dua.ee"));
    }

    #[test]
    fn skips_comments() {
        let list = parse_address_list("user@example.com (this is a comment)").unwrap();
        assert_eq!(list, vec![Address::mailbox("user@example.com")]);
    }
}
