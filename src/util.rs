//! Small helpers shared across the SMTP engine: xtext encoding (RFC 3461 §4)
//! for DSN parameters, and local hostname/FQDN discovery for the default HELO
//! name.

use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;

use crate::extension::ClientId;

/// Wraps a string for `Display` as xtext (RFC 3461 §4): printable ASCII passes
/// through; `+`, `=`, and bytes outside `0x21..0x7E` become `+HH` uppercase hex.
pub struct XText<'a>(pub &'a str);

impl Display for XText<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for &b in self.0.as_bytes() {
            if (0x21..=0x7e).contains(&b) && b != b'+' && b != b'=' {
                f.write_str(&(b as char).to_string())?;
            } else {
                write!(f, "+{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// Best-effort local FQDN, falling back to the plain hostname, and finally to
/// `localhost.localdomain` if neither can be determined.
pub fn fqdn() -> String {
    hostname::get()
        .ok()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "localhost.localdomain".to_string())
}

/// The default `ClientId` (HELO/EHLO name) for an outbound connection from
/// `local_addr`: the discovered FQDN if one resolves to more than just
/// `localhost`, otherwise the bracketed local IP address per RFC 5321 §4.1.3.
pub fn default_client_id(local_addr: Option<IpAddr>) -> ClientId {
    let name = fqdn();
    if name != "localhost" && name != "localhost.localdomain" {
        return ClientId::Domain(name);
    }
    match local_addr {
        Some(IpAddr::V4(v4)) => ClientId::Ipv4(v4),
        Some(IpAddr::V6(v6)) => ClientId::Ipv6(v6),
        None => ClientId::default(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn xtext_passes_through_printable_ascii() {
        assert_eq!(format!("{}", XText("hello")), "hello");
    }

    #[test]
    fn xtext_escapes_plus_and_equals() {
        assert_eq!(format!("{}", XText("a+b=c")), "a+2Bb+3Dc");
    }

    #[test]
    fn xtext_escapes_control_and_high_bytes() {
        assert_eq!(format!("{}", XText("a\tb")), "a+09b");
    }
}
