//! Transport-level connection establishment and the SMTP/LMTP protocol state
//! machine built on top of [`crate::stream::SmtpStream`].

pub mod connection;
pub mod net;

pub use connection::{DsnOptions, Security, SendOutcome, SmtpConnection, SmtpConnectionBuilder};
pub use net::{ClientTlsParameters, Connector, NetworkStream, ProxyResolver};
