//! Envelope derivation from a MIME node's headers.

use crate::address::parse_address_list;
use crate::mime::node::{MimeNode, MimeTree};
use crate::types::{self, EmailAddress, Envelope};

/// Scans `node`'s headers for envelope information: `From` (falling back to
/// `Reply-To` then `Sender`) for the reverse path, and all `To`/`Cc`/`Bcc`
/// addresses for the forward path.
///
/// Unparseable addresses are skipped rather than failing the whole derivation,
/// since a single malformed header should not prevent sending to the
/// recipients that did parse.
pub fn derive_envelope(tree: &MimeTree, root: usize) -> Result<Envelope, types::Error> {
    let node = tree.node(root);

    let from = first_address(node, "From")
        .or_else(|| first_address(node, "Reply-To"))
        .or_else(|| first_address(node, "Sender"));

    let mut to = Vec::new();
    for field in ["To", "Cc", "Bcc"] {
        to.extend(all_addresses(node, field));
    }

    Envelope::new(from, to)
}

fn first_address(node: &MimeNode, field: &str) -> Option<EmailAddress> {
    all_addresses(node, field).into_iter().next()
}

fn all_addresses(node: &MimeNode, field: &str) -> Vec<EmailAddress> {
    let Some(raw) = node.get_header(field) else {
        return Vec::new();
    };
    let Ok(parsed) = parse_address_list(raw) else {
        return Vec::new();
    };
    parsed
        .iter()
        .flat_map(|a| a.envelope_addresses())
        .filter_map(|addr| EmailAddress::new(addr.to_string()).ok())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derives_from_and_recipients() {
        let mut tree = MimeTree::new();
        let root = tree.root();
        {
            let node = tree.node_mut(root);
            node.set_header("From", "sender@example.com");
            node.set_header("To", "a@example.com, b@example.com");
            node.set_header("Cc", "c@example.com");
        }
        let envelope = derive_envelope(&tree, root).unwrap();
        assert_eq!(envelope.from().unwrap().as_ref() as &str, "sender@example.com");
        assert_eq!(envelope.to().len(), 3);
    }

    #[test]
    fn falls_back_to_reply_to_when_no_from() {
        let mut tree = MimeTree::new();
        let root = tree.root();
        {
            let node = tree.node_mut(root);
            node.set_header("Reply-To", "reply@example.com");
            node.set_header("To", "a@example.com");
        }
        let envelope = derive_envelope(&tree, root).unwrap();
        assert_eq!(envelope.from().unwrap().as_ref() as &str, "reply@example.com");
    }
}
