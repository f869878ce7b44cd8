//! Internationalised domain name (punycode) encoding for header and envelope domains.

/// ASCII-encodes `domain` via IDNA/punycode if needed; ASCII domains pass through
/// unchanged. Used for both SMTP envelope addresses and header output per spec.
pub fn to_ascii(domain: &str) -> Result<String, Error> {
    if domain.is_ascii() {
        return Ok(domain.to_string());
    }
    idna::domain_to_ascii(domain).map_err(|_| Error::Idna(domain.to_string()))
}

/// Error converting a domain to its ASCII (punycode) form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The domain could not be IDNA-encoded.
    #[error("invalid internationalised domain: {0}")]
    Idna(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ascii_domain_unchanged() {
        assert_eq!(to_ascii("example.com").unwrap(), "example.com");
    }

    #[test]
    fn encodes_idn_domain() {
        assert_eq!(to_ascii("jõgeva.ee").unwrap(), "xn--jgeva-dua.ee");
    }
}
