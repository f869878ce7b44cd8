//! The MIME message tree: nodes, header encoding policy, transfer-encoding
//! selection, envelope derivation and lazy serialisation.

pub mod envelope;
pub mod headers;
pub mod node;
pub mod serialize;
pub mod transfer_encoding;

pub use envelope::derive_envelope;
pub use node::{Content, MimeNode, MimeTree, NodeId};
pub use transfer_encoding::TransferEncoding;
