//! Arena-indexed MIME node tree. Nodes hold their own index and their parent's so
//! moving a child across trees only means rewriting two integers, not walking
//! pointers.

use crate::content::ContentSpec;
use crate::mime::transfer_encoding::TransferEncoding;

/// Index of a node within a [`MimeTree`]'s arena. Stable for the node's lifetime.
pub type NodeId = usize;

/// The body of a leaf node, set via `set_content` (resolved lazily at
/// serialisation time) or `set_raw` (already-encoded bytes, emitted verbatim).
#[derive(Debug, Clone)]
pub enum Content {
    /// No body has been set yet.
    Empty,
    /// A content specification resolved into bytes at serialisation time.
    Spec(ContentSpec),
    /// Bytes that are already in their final, wire-ready transfer encoding.
    Raw(Vec<u8>),
}

/// A single node in the MIME tree: either a multipart container or a leaf part.
#[derive(Debug, Clone)]
pub struct MimeNode {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    headers: Vec<(String, String)>,
    content: Content,
    transfer_encoding: Option<TransferEncoding>,
    boundary: Option<String>,
}

impl MimeNode {
    fn new(id: NodeId, parent: Option<NodeId>) -> Self {
        MimeNode {
            id,
            parent,
            children: Vec::new(),
            headers: Vec::new(),
            content: Content::Empty,
            transfer_encoding: None,
            boundary: None,
        }
    }

    /// This node's stable index within its tree.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The parent node's index, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child node indices, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Removes any prior entries for `key` (case-insensitively) and appends a
    /// single new entry, normalising `key` to `Title-Case-With-MIME-Upper`.
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        let normalized = normalize_header_key(key);
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&normalized));
        self.headers.push((normalized, value.into()));
    }

    /// Appends a header without removing any existing entries for the same key.
    pub fn add_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.push((normalize_header_key(key), value.into()));
    }

    /// Returns the value of the first header matching `key` (case-insensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all header entries in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Removes all headers matching `key`.
    pub fn remove_header(&mut self, key: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    /// Sets this node's body to a [`ContentSpec`], resolved lazily during
    /// serialisation.
    pub fn set_content(&mut self, content: ContentSpec) {
        self.content = Content::Spec(content);
    }

    /// Sets this node's body to bytes that are already wire-ready; no further
    /// transfer encoding is applied.
    pub fn set_raw(&mut self, bytes: Vec<u8>) {
        self.content = Content::Raw(bytes);
    }

    /// This node's body, as set so far.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Explicitly pins the transfer encoding, overriding automatic selection.
    pub fn set_transfer_encoding(&mut self, encoding: TransferEncoding) {
        self.transfer_encoding = Some(encoding);
        self.set_header("Content-Transfer-Encoding", encoding.as_str());
    }

    /// The caller-pinned transfer encoding, if any.
    pub fn transfer_encoding_override(&self) -> Option<TransferEncoding> {
        self.transfer_encoding
    }

    /// Is this a `multipart/*` container (has a generated boundary)?
    pub fn is_multipart(&self) -> bool {
        self.boundary.is_some()
    }

    /// The multipart boundary, generating and caching one on first call.
    pub fn boundary(&mut self) -> &str {
        if self.boundary.is_none() {
            self.boundary = Some(generate_boundary());
        }
        self.boundary.as_deref().unwrap()
    }

    /// The already-generated boundary, if `boundary()` has been called. Used by
    /// the serialiser, which only holds a shared reference to the tree.
    pub fn boundary_str(&self) -> Option<&str> {
        self.boundary.as_deref()
    }
}

/// An arena of [`MimeNode`]s forming one message tree, rooted at index 0.
#[derive(Debug, Clone, Default)]
pub struct MimeTree {
    nodes: Vec<MimeNode>,
}

impl MimeTree {
    /// Creates a tree with a single, empty root node.
    pub fn new() -> Self {
        let mut tree = MimeTree { nodes: Vec::new() };
        tree.nodes.push(MimeNode::new(0, None));
        tree
    }

    /// The root node's index; always `0`.
    pub fn root(&self) -> NodeId {
        0
    }

    /// Borrows the node at `id`.
    pub fn node(&self, id: NodeId) -> &MimeNode {
        &self.nodes[id]
    }

    /// Mutably borrows the node at `id`.
    pub fn node_mut(&mut self, id: NodeId) -> &mut MimeNode {
        &mut self.nodes[id]
    }

    /// Creates a new child of `parent`, returning its id.
    pub fn create_child(&mut self, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(MimeNode::new(id, Some(parent)));
        self.nodes[parent].children.push(id);
        id
    }

    /// Number of nodes currently in the arena (including detached ones).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the arena holds no nodes beyond the implicit root allocation.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Normalises a header key to `Title-Case-With-MIME-Upper`: lowercase the key,
/// upper-case the first letter of each `-`-separated word, then re-upper the
/// handful of acronyms that always appear fully capitalised in mail headers.
pub fn normalize_header_key(key: &str) -> String {
    let mut words: Vec<String> = key
        .split('-')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect();

    for word in &mut words {
        let upper = word.to_ascii_uppercase();
        if matches!(upper.as_str(), "MIME" | "DKIM" | "ARC" | "BIMI" | "ID") {
            *word = upper;
        }
    }

    let joined = words.join("-");
    if joined.eq_ignore_ascii_case("Content-Features") {
        "Content-features".to_string()
    } else {
        joined
    }
}

fn generate_boundary() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 12] = rng.gen();
    let mut out = String::with_capacity(32);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    format!("----=_mailforge_{}", out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_basic_key() {
        assert_eq!(normalize_header_key("content-type"), "Content-Type");
        assert_eq!(normalize_header_key("SUBJECT"), "Subject");
    }

    #[test]
    fn preserves_known_acronyms() {
        assert_eq!(normalize_header_key("mime-version"), "MIME-Version");
        assert_eq!(normalize_header_key("dkim-signature"), "DKIM-Signature");
        assert_eq!(normalize_header_key("message-id"), "Message-ID");
    }

    #[test]
    fn maps_content_features_to_mixed_case() {
        assert_eq!(normalize_header_key("Content-Features"), "Content-features");
    }

    #[test]
    fn set_header_replaces_prior_entries() {
        let mut tree = MimeTree::new();
        let root = tree.root();
        let node = tree.node_mut(root);
        node.add_header("X-Foo", "one");
        node.add_header("X-Foo", "two");
        node.set_header("x-foo", "three");
        assert_eq!(
            node.headers().iter().filter(|(k, _)| k == "X-Foo").count(),
            1
        );
        assert_eq!(node.get_header("X-FOO"), Some("three"));
    }

    #[test]
    fn tree_create_child_links_parent() {
        let mut tree = MimeTree::new();
        let root = tree.root();
        let child = tree.create_child(root);
        assert_eq!(tree.node(child).parent(), Some(root));
        assert_eq!(tree.node(root).children(), &[child]);
    }

    #[test]
    fn boundary_is_stable_once_generated() {
        let mut tree = MimeTree::new();
        let root = tree.root();
        let first = tree.node_mut(root).boundary().to_string();
        let second = tree.node_mut(root).boundary().to_string();
        assert_eq!(first, second);
    }
}
