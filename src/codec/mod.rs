//! Low-level byte- and text-encoding primitives shared by the MIME composer and the
//! SMTP/LMTP wire protocol: base64 and quoted-printable transfer encodings,
//! dot-stuffing, newline normalisation, RFC 2047 encoded-words, RFC 2231 parameter
//! continuation, IDNA domain encoding and header folding.

pub mod base64;
pub mod dot_stuff;
pub mod folding;
pub mod idna;
pub mod newline;
pub mod param;
pub mod quoted_printable;
pub mod word;

pub use dot_stuff::DotStuffer;
pub use newline::ToCrlf;
pub use word::WordEncoding;
