//! SASL authentication mechanisms for `AUTH` (RFC 4954).

use std::fmt::{self, Display, Formatter};

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::error::Error;

/// Credentials for authenticating to an SMTP server.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates new credentials from a username and password, or (for
    /// `XOAUTH2`) a username and bearer token.
    pub fn new(username: String, password: String) -> Credentials {
        Credentials { username, password }
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password, or bearer token for `XOAUTH2`.
    pub fn password(&self) -> &str {
        &self.password
    }
}

/// A SASL mechanism usable with the `AUTH` command.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-impls", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Mechanism {
    /// `AUTH PLAIN`: `\0user\0pass`, base64-encoded.
    Plain,
    /// `AUTH LOGIN`: username and password exchanged as separate base64 challenges.
    Login,
    /// `AUTH CRAM-MD5`: HMAC-MD5 of the server challenge, keyed by the password.
    CramMd5,
    /// `AUTH XOAUTH2`: OAuth2 bearer token framed as a SASL response.
    Xoauth2,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::Xoauth2 => "XOAUTH2",
        })
    }
}

impl Mechanism {
    /// Whether this mechanism sends its first response inline with the `AUTH`
    /// command (`PLAIN`, `XOAUTH2`) rather than waiting for a `334` challenge
    /// (`LOGIN`, `CRAM-MD5`).
    pub fn supports_initial_response(self) -> bool {
        matches!(self, Mechanism::Plain | Mechanism::Xoauth2)
    }

    /// Computes this mechanism's response string for `credentials`, given the
    /// decoded server challenge so far (`None` for the initial response).
    ///
    /// For `LOGIN`, the first call (no challenge, or a `Username:` challenge)
    /// returns the username and the second (a `Password:` challenge) returns
    /// the password; since the server's exact challenge text varies, any
    /// challenge on the first round trip is treated as asking for the
    /// username, matching the de facto behaviour every mail server targets.
    pub fn response(self, credentials: &Credentials, challenge: Option<&str>) -> Result<String, Error> {
        match self {
            Mechanism::Plain => Ok(format!(
                "\u{0}{}\u{0}{}",
                credentials.username(),
                credentials.password()
            )),
            Mechanism::Login => match challenge {
                None => Ok(credentials.username().to_string()),
                Some(c) if c.to_ascii_lowercase().contains("user") => {
                    Ok(credentials.username().to_string())
                }
                Some(_) => Ok(credentials.password().to_string()),
            },
            Mechanism::CramMd5 => {
                let challenge = challenge.ok_or(Error::Client("CRAM-MD5 requires a server challenge"))?;
                let mut mac = Hmac::<Md5>::new_from_slice(credentials.password().as_bytes())
                    .map_err(|_| Error::Client("invalid CRAM-MD5 key length"))?;
                mac.update(challenge.as_bytes());
                let hmac = mac.finalize().into_bytes();
                let hex: String = hmac.iter().map(|b| format!("{:02x}", b)).collect();
                Ok(format!("{} {}", credentials.username(), hex))
            }
            Mechanism::Xoauth2 => Ok(format!(
                "user={}\u{1}auth=Bearer {}\u{1}\u{1}",
                credentials.username(),
                credentials.password()
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_response_matches_rfc4616_layout() {
        let creds = Credentials::new("user".to_string(), "pass".to_string());
        let response = Mechanism::Plain.response(&creds, None).unwrap();
        assert_eq!(response, "\u{0}user\u{0}pass");
    }

    #[test]
    fn login_alternates_username_then_password() {
        let creds = Credentials::new("user".to_string(), "pass".to_string());
        assert_eq!(Mechanism::Login.response(&creds, None).unwrap(), "user");
        assert_eq!(
            Mechanism::Login.response(&creds, Some("Password:")).unwrap(),
            "pass"
        );
    }

    #[test]
    fn cram_md5_requires_challenge() {
        let creds = Credentials::new("user".to_string(), "pass".to_string());
        assert!(Mechanism::CramMd5.response(&creds, None).is_err());
        let response = Mechanism::CramMd5.response(&creds, Some("<123@host>")).unwrap();
        assert!(response.starts_with("user "));
    }

    #[test]
    fn xoauth2_frames_bearer_token() {
        let creds = Credentials::new("user".to_string(), "token".to_string());
        let response = Mechanism::Xoauth2.response(&creds, None).unwrap();
        assert_eq!(response, "user=user\u{1}auth=Bearer token\u{1}\u{1}");
    }

    #[test]
    fn initial_response_support_matches_mechanism() {
        assert!(Mechanism::Plain.supports_initial_response());
        assert!(Mechanism::Xoauth2.supports_initial_response());
        assert!(!Mechanism::Login.supports_initial_response());
        assert!(!Mechanism::CramMd5.supports_initial_response());
    }
}
