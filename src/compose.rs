//! The mail composer: turns a [`MailDescription`] into a [`MimeTree`].

use chrono::Utc;
use rand::Rng;

use crate::content::ContentSpec;
use crate::mime::headers::{encode_address_field, encode_date_field, encode_field, StructuredValue};
use crate::mime::node::{MimeTree, NodeId};
use crate::mime::serialize::NewlinePolicy;
use crate::mime::transfer_encoding::{select_for_binary, select_for_text, TransferEncoding};
use crate::types::Envelope;

/// `Importance`/`X-Priority` value requested via [`MailDescription::priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// `X-Priority: 1`, `Importance: high`.
    High,
    /// `X-Priority: 3`, `Importance: normal` (the default, so usually omitted).
    Normal,
    /// `X-Priority: 5`, `Importance: low`.
    Low,
}

/// One MIME alternative or attachment body, as supplied to the composer.
#[derive(Debug, Clone)]
pub struct Part {
    /// Content-Type value, e.g. `text/plain`, `image/png`.
    pub content_type: String,
    /// The body content.
    pub content: ContentSpec,
    /// Explicit filename. `None` derives one; `Some(None)` via [`Part::no_filename`]
    /// suppresses the filename parameter entirely.
    pub filename: Option<Option<String>>,
    /// Content-ID for `multipart/related` inline references (`cid:...`).
    pub cid: Option<String>,
    /// Forces `Content-Disposition: inline` or `attachment`; `None` infers it.
    pub disposition: Option<Disposition>,
    /// Caller-pinned transfer encoding; `None` selects automatically.
    pub transfer_encoding: Option<TransferEncoding>,
}

/// `Content-Disposition` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Rendered as part of the message body.
    Inline,
    /// Offered as a downloadable attachment.
    Attachment,
}

impl Part {
    /// Builds a text alternative part (no filename, no cid).
    pub fn text(content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Part {
            content_type: content_type.into(),
            content: ContentSpec::Text { data: body.into(), encoding: "utf8".to_string() },
            filename: None,
            cid: None,
            disposition: None,
            transfer_encoding: None,
        }
    }

    /// Builds an attachment from bytes with an explicit filename.
    pub fn attachment(content_type: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Part {
            content_type: content_type.into(),
            content: ContentSpec::Bytes(bytes),
            filename: Some(Some(filename.into())),
            cid: None,
            disposition: None,
            transfer_encoding: None,
        }
    }

    /// Suppresses the `filename` parameter entirely.
    pub fn no_filename(mut self) -> Self {
        self.filename = Some(None);
        self
    }

    /// Marks this part with a `cid`, making it eligible for `multipart/related`.
    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    fn is_related_candidate(&self) -> bool {
        self.cid.is_some()
    }
}

/// The full description of a message to compose, mirroring the composer's input
/// surface: distinct text/HTML/AMP/watch-HTML alternatives, an optional iCal
/// event, explicit extra alternatives, and an attachment list.
#[derive(Debug, Clone, Default)]
pub struct MailDescription {
    /// `From` header value.
    pub from: Option<String>,
    /// `To` header value.
    pub to: Option<String>,
    /// `Cc` header value.
    pub cc: Option<String>,
    /// `Bcc` header value (dropped from serialised output by default).
    pub bcc: Option<String>,
    /// `Subject` header value.
    pub subject: Option<String>,
    /// Plain-text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// `text/watch-html` alternative for smartwatch mail clients.
    pub watch_html: Option<String>,
    /// `text/x-amp-html` alternative.
    pub amp: Option<String>,
    /// An iCalendar event, emitted as both an alternative and an attachment.
    pub ical_event: Option<IcalEvent>,
    /// Additional caller-supplied alternative parts beyond text/html/amp/watch.
    pub alternatives: Vec<Part>,
    /// Attachments (including inline, cid-bearing images).
    pub attachments: Vec<Part>,
    /// Pre-built raw RFC 822 bytes; if set, every other field is ignored and the
    /// message is emitted as a single `message/rfc822` node.
    pub raw: Option<Vec<u8>>,
    /// Extra headers to set verbatim (already a string value).
    pub headers: Vec<(String, String)>,
    /// Explicit envelope override; when set, the mailer skips header-derived
    /// envelope computation entirely.
    pub envelope: Option<Envelope>,
    /// `X-Priority`/`Importance` header pair.
    pub priority: Option<Priority>,
    /// `List-*` header values, e.g. `("Unsubscribe", "<mailto:...>")`.
    pub list: Vec<(String, String)>,
    /// `X-Mailer` header value; the mailer orchestrator fills in a default
    /// when this is `None`.
    pub x_mailer: Option<String>,
    /// Forbids resolving any `ContentSpec::Path` content (local filesystem
    /// reads), for hosts embedding this library with untrusted input.
    pub disable_file_access: bool,
    /// Line-ending normalisation applied to the serialised stream.
    pub newline: NewlinePolicy,
    /// Rewrite `<img src="data:...">` inline images in the HTML body into
    /// `cid:`-referenced attachments before composing.
    pub attach_data_urls: bool,
}

/// An iCalendar event attached to a [`MailDescription`].
#[derive(Debug, Clone)]
pub struct IcalEvent {
    /// The raw iCalendar document body.
    pub content: String,
    /// The `method` parameter, e.g. `REQUEST`, `CANCEL`, `REPLY`.
    pub method: String,
}

/// Composes `description` into a [`MimeTree`], returning the tree and the id of
/// its root node.
pub fn compose(description: &MailDescription) -> MimeTree {
    let mut tree = MimeTree::new();
    let root = tree.root();

    if let Some(raw) = &description.raw {
        tree.node_mut(root).set_header("Content-Type", "message/rfc822");
        tree.node_mut(root).set_raw(raw.clone());
        set_standard_headers(&mut tree, root, description);
        return tree;
    }

    let mut alternatives = Vec::new();
    if let Some(text) = &description.text {
        alternatives.push(Part::text("text/plain", text.clone()));
    }
    if let Some(watch) = &description.watch_html {
        alternatives.push(Part::text("text/watch-html", watch.clone()));
    }
    if let Some(amp) = &description.amp {
        alternatives.push(Part::text("text/x-amp-html", amp.clone()));
    }
    if let Some(html) = &description.html {
        alternatives.push(Part::text("text/html", html.clone()));
    }
    if let Some(ical) = &description.ical_event {
        alternatives.push(
            Part::text("text/calendar", ical.content.clone()).no_filename(),
        );
        // content_type carries the method parameter out of band; applied below.
    }
    alternatives.extend(description.alternatives.iter().cloned());

    let mut attachments = description.attachments.clone();
    if let Some(ical) = &description.ical_event {
        attachments.push(
            Part::attachment("application/ics", "invite.ics", ical.content.clone().into_bytes()),
        );
    }

    let (related, attached): (Vec<Part>, Vec<Part>) =
        attachments.into_iter().partition(|p| p.is_related_candidate());

    let has_html_alt = description.html.is_some();
    let has_body = !alternatives.is_empty();
    let use_related = has_html_alt && !related.is_empty();
    let use_alternative = alternatives.len() > 1;
    let use_mixed = attached.len() > 1 || (!attached.is_empty() && !alternatives.is_empty());

    // The body (text/HTML/alternatives, plus any related inline parts) is built
    // under `body_host`: a fresh child of `root` when attachments will wrap it
    // in `multipart/mixed`, or `root` itself when nothing else wraps it. Either
    // way the body is never filled into a node that a later step re-types, so
    // it can't be overwritten the way an in-place fill on `root` would be.
    let body_host = has_body.then(|| if use_mixed { tree.create_child(root) } else { root });

    if let Some(host) = body_host {
        if use_related {
            mark_multipart(&mut tree, host, "multipart/related");
            place_body(&mut tree, description, &alternatives, use_alternative, host, false);
            for part in &related {
                let leaf = tree.create_child(host);
                fill_leaf(&mut tree, leaf, part, description);
            }
        } else {
            place_body(&mut tree, description, &alternatives, use_alternative, host, true);
        }
    }

    if use_mixed {
        mark_multipart(&mut tree, root, "multipart/mixed");
        for part in &attached {
            let leaf = tree.create_child(root);
            fill_leaf(&mut tree, leaf, part, description);
        }
    } else if let Some(single) = attached.first() {
        if alternatives.is_empty() {
            fill_leaf(&mut tree, root, single, description);
        }
    }

    set_standard_headers(&mut tree, root, description);
    tree
}

/// Places the text/HTML alternatives under `parent`: as a fresh
/// `multipart/alternative` child when there's more than one, otherwise as the
/// lone body leaf. `fill_parent_directly` selects whether that lone leaf
/// becomes `parent` itself (nothing else will claim `parent`'s type) or a
/// fresh child of it (`parent` is already spoken for, e.g. as the
/// `multipart/related` node).
fn place_body(
    tree: &mut MimeTree,
    description: &MailDescription,
    alternatives: &[Part],
    use_alternative: bool,
    parent: NodeId,
    fill_parent_directly: bool,
) {
    if use_alternative {
        let alt_node = tree.create_child(parent);
        mark_multipart(tree, alt_node, "multipart/alternative");
        for part in alternatives {
            let leaf = tree.create_child(alt_node);
            fill_leaf(tree, leaf, part, description);
        }
    } else if let Some(part) = alternatives.first() {
        if fill_parent_directly {
            fill_leaf(tree, parent, part, description);
        } else {
            let leaf = tree.create_child(parent);
            fill_leaf(tree, leaf, part, description);
        }
    }
}

fn mark_multipart(tree: &mut MimeTree, id: NodeId, kind: &str) {
    let boundary = tree.node_mut(id).boundary().to_string();
    tree.node_mut(id).set_header(
        "Content-Type",
        format!("{}; boundary=\"{}\"", kind, boundary),
    );
}

fn fill_leaf(tree: &mut MimeTree, id: NodeId, part: &Part, description: &MailDescription) {
    let node = tree.node_mut(id);

    let mut ctype = StructuredValue::new(part.content_type.clone());
    if part.content_type.starts_with("text/") {
        ctype = ctype.with_param("charset", "utf-8");
    }
    if let Some(ical) = &description.ical_event {
        if part.content_type == "text/calendar" {
            ctype = ctype.with_param("method", ical.method.clone());
        }
    }
    node.set_header("Content-Type", ctype.render());

    let filename = derive_filename(part);
    if let Some(name) = &filename {
        let disposition_kind = match part.disposition {
            Some(Disposition::Inline) => "inline",
            Some(Disposition::Attachment) => "attachment",
            None if part.cid.is_some() || part.content_type.starts_with("message/") => "inline",
            None => "attachment",
        };
        let disposition = StructuredValue::new(disposition_kind).with_param("filename", name.clone());
        node.set_header("Content-Disposition", disposition.render());
    }

    if let Some(cid) = &part.cid {
        node.set_header("Content-Id", format!("<{}>", cid));
    }

    node.set_content(part.content.clone());

    let encoding = part.transfer_encoding.unwrap_or_else(|| select_encoding(part));
    node.set_transfer_encoding(encoding);
}

fn select_encoding(part: &Part) -> TransferEncoding {
    if part.content_type.starts_with("message/") {
        return TransferEncoding::SevenBit;
    }
    if part.content_type.starts_with("text/") {
        if let ContentSpec::Text { data, .. } = &part.content {
            return select_for_text(data);
        }
    }
    select_for_binary()
}

fn derive_filename(part: &Part) -> Option<String> {
    match &part.filename {
        Some(Some(name)) => Some(name.clone()),
        Some(None) => None,
        None => {
            let path = match &part.content {
                ContentSpec::Path(p) => Some(p.to_string_lossy().to_string()),
                ContentSpec::Url(u) => Some(u.clone()),
                _ => None,
            }?;
            let base = path
                .split('?')
                .next()
                .unwrap_or(&path)
                .rsplit('/')
                .next()
                .unwrap_or(&path)
                .to_string();
            if base.contains('.') {
                Some(base)
            } else {
                let ext = mime_guess::get_mime_extensions_str(&part.content_type)
                    .and_then(|exts| exts.first())
                    .copied()
                    .unwrap_or("bin");
                Some(format!("{}.{}", base, ext))
            }
        }
    }
}

fn set_standard_headers(tree: &mut MimeTree, root: NodeId, description: &MailDescription) {
    let node = tree.node_mut(root);
    node.set_header("MIME-Version", "1.0");

    if let Some(from) = &description.from {
        node.set_header("From", encode_address_field(from));
    }
    if let Some(to) = &description.to {
        node.set_header("To", encode_address_field(to));
    }
    if let Some(cc) = &description.cc {
        node.set_header("Cc", encode_address_field(cc));
    }
    if let Some(bcc) = &description.bcc {
        node.set_header("Bcc", encode_address_field(bcc));
    }
    if let Some(subject) = &description.subject {
        node.set_header("Subject", encode_field("Subject", subject));
    }
    if node.get_header("Date").is_none() {
        node.set_header("Date", encode_date_field(Utc::now()));
    }
    for (key, value) in &description.headers {
        node.set_header(key, encode_field(key, value));
    }
    for (key, value) in &description.list {
        node.set_header(&format!("List-{}", key), value.clone());
    }
    if let Some(priority) = description.priority {
        let (x_priority, importance) = match priority {
            Priority::High => ("1", "high"),
            Priority::Normal => ("3", "normal"),
            Priority::Low => ("5", "low"),
        };
        node.set_header("X-Priority", x_priority);
        node.set_header("Importance", importance);
    }
    if let Some(x_mailer) = &description.x_mailer {
        node.set_header("X-Mailer", x_mailer.clone());
    }

    if node.get_header("Message-ID").is_none() {
        let domain = description
            .from
            .as_deref()
            .and_then(|f| f.rsplit('@').next())
            .unwrap_or("localhost");
        node.set_header("Message-ID", generate_message_id(domain));
    }
}

/// Generates a `<aaaa-bb-cc-dd-eeeeee@domain>` Message-ID: 16 random hex bytes
/// grouped `8-4-4-4-12`.
pub fn generate_message_id(domain: &str) -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "<{}-{}-{}-{}-{}@{}>",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32],
        domain
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::node::Content;

    #[test]
    fn single_text_body_is_a_leaf() {
        let description = MailDescription {
            from: Some("a@example.com".to_string()),
            to: Some("b@example.com".to_string()),
            text: Some("hello".to_string()),
            ..Default::default()
        };
        let tree = compose(&description);
        let root = tree.root();
        assert!(!tree.node(root).is_multipart());
        assert_eq!(tree.node(root).get_header("Content-Type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn text_and_html_become_alternative() {
        let description = MailDescription {
            text: Some("hello".to_string()),
            html: Some("<p>hello</p>".to_string()),
            ..Default::default()
        };
        let tree = compose(&description);
        let root = tree.root();
        assert!(tree.node(root).get_header("Content-Type").unwrap().starts_with("multipart/alternative"));
        assert_eq!(tree.node(root).children().len(), 2);
    }

    #[test]
    fn html_with_cid_attachment_uses_related() {
        let description = MailDescription {
            html: Some("<img src=cid:logo>".to_string()),
            attachments: vec![Part::attachment("image/png", "logo.png", vec![1, 2, 3]).with_cid("logo")],
            ..Default::default()
        };
        let tree = compose(&description);
        let root = tree.root();
        assert!(tree.node(root).get_header("Content-Type").unwrap().starts_with("multipart/related"));
    }

    #[test]
    fn mixed_attachment_alongside_alternatives() {
        let description = MailDescription {
            text: Some("hello".to_string()),
            html: Some("<p>hello</p>".to_string()),
            attachments: vec![Part::attachment("application/pdf", "doc.pdf", vec![1, 2, 3])],
            ..Default::default()
        };
        let tree = compose(&description);
        let root = tree.root();
        assert!(tree.node(root).get_header("Content-Type").unwrap().starts_with("multipart/mixed"));
    }

    #[test]
    fn single_body_survives_a_mixed_attachment() {
        let description = MailDescription {
            text: Some("hello".to_string()),
            attachments: vec![Part::attachment("application/pdf", "doc.pdf", vec![1, 2, 3])],
            ..Default::default()
        };
        let tree = compose(&description);
        let root = tree.root();
        assert!(tree.node(root).get_header("Content-Type").unwrap().starts_with("multipart/mixed"));
        assert_eq!(tree.node(root).children().len(), 2);

        let body = tree.node(root).children()[0];
        assert_eq!(tree.node(body).get_header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert!(matches!(tree.node(body).content(), Content::Spec(_)));

        let attachment = tree.node(root).children()[1];
        assert!(tree.node(attachment).get_header("Content-Type").unwrap().starts_with("application/pdf"));
    }

    #[test]
    fn html_with_cid_attachment_nests_the_body_leaf() {
        let description = MailDescription {
            html: Some("<img src=cid:logo>".to_string()),
            attachments: vec![Part::attachment("image/png", "logo.png", vec![1, 2, 3]).with_cid("logo")],
            ..Default::default()
        };
        let tree = compose(&description);
        let root = tree.root();
        assert_eq!(tree.node(root).children().len(), 2);

        let body = tree.node(root).children()[0];
        assert_eq!(tree.node(body).get_header("Content-Type"), Some("text/html; charset=utf-8"));
        assert!(matches!(tree.node(body).content(), Content::Spec(_)));

        let image = tree.node(root).children()[1];
        assert!(tree.node(image).get_header("Content-Type").unwrap().starts_with("image/png"));
    }

    #[test]
    fn ical_event_appears_as_alternative_and_attachment() {
        let description = MailDescription {
            text: Some("hello".to_string()),
            ical_event: Some(IcalEvent { content: "BEGIN:VCALENDAR".to_string(), method: "REQUEST".to_string() }),
            ..Default::default()
        };
        let tree = compose(&description);
        // text + ical alternative => multipart/alternative root, plus one mixed attachment (invite.ics)
        let root = tree.root();
        let ctype = tree.node(root).get_header("Content-Type").unwrap().to_string();
        assert!(ctype.starts_with("multipart/mixed") || ctype.starts_with("multipart/alternative"));
    }

    #[test]
    fn derives_filename_extension_from_content_type() {
        let part = Part::attachment("image/png", "", vec![1]);
        // explicit empty filename wins as-is; extension inference only applies
        // when filename is None and path/url based
        assert_eq!(derive_filename(&part), Some(String::new()));
    }

    #[test]
    fn generated_message_id_has_expected_shape() {
        let id = generate_message_id("example.com");
        assert!(id.starts_with('<') && id.ends_with("@example.com>"));
    }
}
