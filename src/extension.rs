//! ESMTP features negotiated via the EHLO response.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::result::Result;

use crate::authentication::Mechanism;
use crate::error::Error;
use crate::response::Response;
use crate::util::XText;

/// Default client id.
///
/// It passes `smtpd_helo_restrictions = reject_non_fqdn_helo_hostname` Postfix
/// check, but not `reject_unknown_helo_hostname`.
const DEFAULT_DOMAIN_CLIENT_ID: &str = "localhost.localdomain";

/// Client identifier, the parameter to `EHLO`/`HELO`/`LHLO`.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum ClientId {
    /// A fully-qualified domain name.
    Domain(String),
    /// An IPv4 address.
    Ipv4(Ipv4Addr),
    /// An IPv6 address.
    Ipv6(Ipv6Addr),
}

impl Default for ClientId {
    fn default() -> Self {
        Self::Ipv4(Ipv4Addr::new(127, 0, 0, 1))
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            ClientId::Domain(ref value) => f.write_str(value),
            ClientId::Ipv4(ref value) => write!(f, "[{}]", value),
            ClientId::Ipv6(ref value) => write!(f, "[IPv6:{}]", value),
        }
    }
}

impl ClientId {
    /// Creates a new `ClientId` from a fully qualified domain name.
    pub fn new(domain: String) -> ClientId {
        ClientId::Domain(domain)
    }

    /// Defines a `ClientId` with the current hostname, or
    /// `localhost.localdomain` if none could be found.
    pub fn hostname() -> ClientId {
        ClientId::Domain(
            hostname::get()
                .ok()
                .and_then(|s| s.into_string().ok())
                .unwrap_or_else(|| DEFAULT_DOMAIN_CLIENT_ID.to_string()),
        )
    }
}

/// Supported ESMTP keywords.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Extension {
    /// `PIPELINING` ([RFC 2920](https://tools.ietf.org/html/rfc2920)).
    Pipelining,
    /// `8BITMIME` ([RFC 6152](https://tools.ietf.org/html/rfc6152)).
    EightBitMime,
    /// `SMTPUTF8` ([RFC 6531](https://tools.ietf.org/html/rfc6531)).
    SmtpUtfEight,
    /// `STARTTLS` ([RFC 2487](https://tools.ietf.org/html/rfc2487)).
    StartTls,
    /// `DSN` ([RFC 3461](https://tools.ietf.org/html/rfc3461)).
    Dsn,
    /// `SIZE <n>` ([RFC 1870](https://tools.ietf.org/html/rfc1870)), carrying
    /// the advertised maximum message size if the server gave one.
    Size(Option<usize>),
    /// An `AUTH` mechanism advertised by the server.
    Authentication(Mechanism),
}

impl Display for Extension {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Extension::Pipelining => write!(f, "PIPELINING"),
            Extension::EightBitMime => write!(f, "8BITMIME"),
            Extension::SmtpUtfEight => write!(f, "SMTPUTF8"),
            Extension::StartTls => write!(f, "STARTTLS"),
            Extension::Dsn => write!(f, "DSN"),
            Extension::Size(Some(n)) => write!(f, "SIZE {}", n),
            Extension::Size(None) => write!(f, "SIZE"),
            Extension::Authentication(ref mechanism) => write!(f, "AUTH {}", mechanism),
        }
    }
}

/// Contains information about an SMTP server, parsed from its EHLO response.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct ServerInfo {
    /// Server name, taken from the first word of the EHLO response.
    pub name: String,
    /// ESMTP features supported by the server.
    pub features: HashSet<Extension>,
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} with {}",
            self.name,
            if self.features.is_empty() {
                "no supported features".to_string()
            } else {
                format!("{:?}", self.features)
            }
        )
    }
}

impl ServerInfo {
    /// Parses an EHLO response to build a `ServerInfo`.
    pub fn from_response(response: &Response) -> Result<ServerInfo, Error> {
        let name = match response.first_word() {
            Some(name) => name,
            None => return Err(Error::ResponseParsing("Could not read server name")),
        };

        let mut features: HashSet<Extension> = HashSet::new();

        for line in response.message.as_slice() {
            if line.is_empty() {
                continue;
            }

            let split: Vec<&str> = line.split_whitespace().collect();
            match split.first().copied() {
                Some("PIPELINING") => {
                    features.insert(Extension::Pipelining);
                }
                Some("8BITMIME") => {
                    features.insert(Extension::EightBitMime);
                }
                Some("SMTPUTF8") => {
                    features.insert(Extension::SmtpUtfEight);
                }
                Some("STARTTLS") => {
                    features.insert(Extension::StartTls);
                }
                Some("DSN") => {
                    features.insert(Extension::Dsn);
                }
                Some("SIZE") => {
                    let max = split.get(1).and_then(|s| s.parse().ok());
                    features.insert(Extension::Size(max));
                }
                Some("AUTH") => {
                    for &mechanism in &split[1..] {
                        match mechanism {
                            "PLAIN" => {
                                features.insert(Extension::Authentication(Mechanism::Plain));
                            }
                            "LOGIN" => {
                                features.insert(Extension::Authentication(Mechanism::Login));
                            }
                            "CRAM-MD5" => {
                                features.insert(Extension::Authentication(Mechanism::CramMd5));
                            }
                            "XOAUTH2" => {
                                features.insert(Extension::Authentication(Mechanism::Xoauth2));
                            }
                            _ => (),
                        }
                    }
                }
                _ => (),
            };
        }

        Ok(ServerInfo {
            name: name.to_string(),
            features,
        })
    }

    /// Checks if the server supports an ESMTP feature. Note that `Size`
    /// ignores its advertised max-size payload when matching.
    pub fn supports_feature(&self, keyword: Extension) -> bool {
        self.features.iter().any(|f| match (f, &keyword) {
            (Extension::Size(_), Extension::Size(_)) => true,
            (a, b) => a == b,
        })
    }

    /// Checks if the server supports a given `AUTH` mechanism.
    pub fn supports_auth_mechanism(&self, mechanism: Mechanism) -> bool {
        self.features.contains(&Extension::Authentication(mechanism))
    }

    /// The advertised `SIZE` limit, if any.
    pub fn max_message_size(&self) -> Option<usize> {
        self.features.iter().find_map(|f| match f {
            Extension::Size(n) => *n,
            _ => None,
        })
    }
}

/// A `MAIL FROM` extension parameter.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum MailParameter {
    /// `BODY` parameter.
    Body(MailBodyParameter),
    /// `SIZE` parameter.
    Size(usize),
    /// `SMTPUTF8` parameter.
    SmtpUtfEight,
    /// `RET` DSN parameter (`FULL` or `HDRS`).
    Ret(&'static str),
    /// `ENVID` DSN parameter, xtext-encoded on output.
    Envid(String),
    /// Custom parameter.
    Other {
        /// Parameter keyword.
        keyword: String,
        /// Parameter value.
        value: Option<String>,
    },
}

impl Display for MailParameter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            MailParameter::Body(value) => write!(f, "BODY={}", value),
            MailParameter::Size(size) => write!(f, "SIZE={}", size),
            MailParameter::SmtpUtfEight => f.write_str("SMTPUTF8"),
            MailParameter::Ret(value) => write!(f, "RET={}", value),
            MailParameter::Envid(value) => write!(f, "ENVID={}", XText(value)),
            MailParameter::Other { keyword, value: Some(value) } => {
                write!(f, "{}={}", keyword, XText(value))
            }
            MailParameter::Other { keyword, value: None } => f.write_str(keyword),
        }
    }
}

/// Values for the `BODY` parameter to `MAIL FROM`.
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum MailBodyParameter {
    /// `7BIT`.
    SevenBit,
    /// `8BITMIME`.
    EightBitMime,
}

impl Display for MailBodyParameter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            MailBodyParameter::SevenBit => f.write_str("7BIT"),
            MailBodyParameter::EightBitMime => f.write_str("8BITMIME"),
        }
    }
}

/// A `RCPT TO` extension parameter.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum RcptParameter {
    /// Custom parameter.
    Other {
        /// Parameter keyword.
        keyword: String,
        /// Parameter value.
        value: Option<String>,
    },
}

impl Display for RcptParameter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RcptParameter::Other { keyword, value: Some(value) } => {
                write!(f, "{}={}", keyword, XText(value))
            }
            RcptParameter::Other { keyword, value: None } => f.write_str(keyword),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ClientId, Extension, ServerInfo};
    use crate::authentication::Mechanism;
    use crate::response::{Category, Code, Detail, Response, Severity};
    use std::collections::HashSet;

    #[test]
    fn test_clientid_fmt() {
        assert_eq!(format!("{}", ClientId::new("test".to_string())), "test".to_string());
    }

    #[test]
    fn test_extension_fmt() {
        assert_eq!(format!("{}", Extension::Pipelining), "PIPELINING".to_string());
        assert_eq!(format!("{}", Extension::EightBitMime), "8BITMIME".to_string());
        assert_eq!(
            format!("{}", Extension::Authentication(Mechanism::Plain)),
            "AUTH PLAIN".to_string()
        );
    }

    #[test]
    fn test_serverinfo() {
        let response = Response::new(
            Code::new(Severity::PositiveCompletion, Category::Unspecified4, Detail::One),
            vec!["me".to_string(), "8BITMIME".to_string(), "SIZE 42".to_string()],
        );

        let server_info = ServerInfo::from_response(&response).unwrap();
        assert!(server_info.supports_feature(Extension::EightBitMime));
        assert!(!server_info.supports_feature(Extension::StartTls));
        assert_eq!(server_info.max_message_size(), Some(42));

        let response2 = Response::new(
            Code::new(Severity::PositiveCompletion, Category::Unspecified4, Detail::One),
            vec![
                "me".to_string(),
                "AUTH PLAIN CRAM-MD5 XOAUTH2 OTHER".to_string(),
                "8BITMIME".to_string(),
            ],
        );
        let server_info2 = ServerInfo::from_response(&response2).unwrap();
        assert!(server_info2.supports_auth_mechanism(Mechanism::Plain));
        assert!(server_info2.supports_auth_mechanism(Mechanism::CramMd5));
        assert!(!server_info2.supports_auth_mechanism(Mechanism::Login));
    }

    #[test]
    fn empty_features_formats_plainly() {
        let server_info = ServerInfo { name: "name".to_string(), features: HashSet::new() };
        assert_eq!(format!("{}", server_info), "name with no supported features");
    }
}
