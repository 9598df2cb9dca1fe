//! Namespace-aware XML tree built on quick-xml.
//!
//! The whole document is read into an arena of elements kept in document
//! order, so a deep search is a linear scan and the descendants of an element
//! are the contiguous range that follows it. No fallback is applied here:
//! any structural problem is an [`XmlError`] and the format parsers decide
//! what to do with it.
//!
//! Input is transcoded to UTF-8 before parsing. The encoding comes from a
//! byte order mark, the UTF-16 signature of the declaration, or the
//! declaration's `encoding` pseudo-attribute, in that order.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml syntax error at byte {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("malformed document: {0}")]
    Structure(String),
    #[error("unbound namespace prefix '{0}'")]
    UnboundPrefix(String),
    #[error("invalid UTF-8 in {0}")]
    Encoding(&'static str),
    #[error("unsupported document encoding '{0}'")]
    UnsupportedEncoding(String),
    #[error("document is not valid {0}")]
    Undecodable(&'static str),
}

/// Element name pattern used by the lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch<'a> {
    /// Local name in exactly this namespace URI.
    Qualified { namespace: &'a str, local: &'a str },
    /// Local name in any namespace, or none.
    Local(&'a str),
}

impl<'a> NameMatch<'a> {
    pub fn qualified(namespace: &'a str, local: &'a str) -> Self {
        NameMatch::Qualified { namespace, local }
    }

    fn matches(&self, element: &Element) -> bool {
        match *self {
            NameMatch::Qualified { namespace, local } => {
                element.local == local && element.namespace.as_deref() == Some(namespace)
            }
            NameMatch::Local(local) => element.local == local,
        }
    }
}

#[derive(Debug)]
enum Content {
    Element(usize),
    Text(String),
}

#[derive(Debug)]
struct Element {
    namespace: Option<String>,
    local: String,
    attributes: Vec<(String, String)>,
    parent: Option<usize>,
    content: Vec<Content>,
    /// One past the index of the last descendant.
    end: usize,
}

/// A parsed XML document.
#[derive(Debug)]
pub struct XmlDocument {
    elements: Vec<Element>,
}

impl XmlDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let text = decode_document(bytes)?;
        let mut reader = NsReader::from_str(&text);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();

        loop {
            let (resolved, event) = match reader.read_resolved_event_into(&mut buf) {
                Ok(resolved) => resolved,
                Err(err) => {
                    return Err(XmlError::Syntax {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })
                }
            };
            let namespace = resolve_namespace(resolved, &event)?;

            match event {
                Event::Start(e) => {
                    let idx = push_element(&mut elements, &open, namespace, &e)?;
                    open.push(idx);
                }
                Event::Empty(e) => {
                    let idx = push_element(&mut elements, &open, namespace, &e)?;
                    elements[idx].end = idx + 1;
                }
                Event::End(_) => {
                    let idx = open
                        .pop()
                        .ok_or_else(|| XmlError::Structure("closing tag without opening tag".into()))?;
                    elements[idx].end = elements.len();
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|err| XmlError::Syntax {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })?;
                    push_text(&mut elements, &open, text.into_owned())?;
                }
                Event::CData(c) => {
                    let text = String::from_utf8(c.into_inner().into_owned())
                        .map_err(|_| XmlError::Encoding("CDATA section"))?;
                    push_text(&mut elements, &open, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !open.is_empty() {
            return Err(XmlError::Structure(format!(
                "{} element(s) left unclosed at end of input",
                open.len()
            )));
        }
        if elements.is_empty() {
            return Err(XmlError::Structure("no root element".into()));
        }

        Ok(Self { elements })
    }

    pub fn root(&self) -> Node<'_> {
        Node { doc: self, idx: 0 }
    }

    /// Every element matching `name`, anywhere in the document, in document order.
    pub fn elements_named<'d>(&'d self, name: NameMatch<'d>) -> impl Iterator<Item = Node<'d>> + 'd {
        self.scan(0, self.elements.len(), name)
    }

    pub fn first_named<'d>(&'d self, name: NameMatch<'d>) -> Option<Node<'d>> {
        self.elements_named(name).next()
    }

    fn scan<'d>(
        &'d self,
        from: usize,
        to: usize,
        name: NameMatch<'d>,
    ) -> impl Iterator<Item = Node<'d>> + 'd {
        (from..to)
            .filter(move |&idx| name.matches(&self.elements[idx]))
            .map(move |idx| Node { doc: self, idx })
    }
}

/// Borrowed handle on one element of an [`XmlDocument`].
#[derive(Clone, Copy)]
pub struct Node<'d> {
    doc: &'d XmlDocument,
    idx: usize,
}

impl<'d> Node<'d> {
    fn element(&self) -> &'d Element {
        &self.doc.elements[self.idx]
    }

    pub fn local_name(&self) -> &'d str {
        &self.element().local
    }

    pub fn namespace(&self) -> Option<&'d str> {
        self.element().namespace.as_deref()
    }

    pub fn is(&self, name: NameMatch<'_>) -> bool {
        name.matches(self.element())
    }

    pub fn parent(&self) -> Option<Node<'d>> {
        self.element().parent.map(|idx| Node { doc: self.doc, idx })
    }

    /// Attribute value by its name as written in the document.
    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.element()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = Node<'d>> + 'd {
        let doc = self.doc;
        self.element().content.iter().filter_map(move |c| match c {
            Content::Element(idx) => Some(Node { doc, idx: *idx }),
            Content::Text(_) => None,
        })
    }

    /// Matching elements strictly below this one, in document order.
    pub fn descendants_named(&self, name: NameMatch<'d>) -> impl Iterator<Item = Node<'d>> + 'd {
        self.doc.scan(self.idx + 1, self.element().end, name)
    }

    pub fn first_descendant(&self, name: NameMatch<'d>) -> Option<Node<'d>> {
        self.descendants_named(name).next()
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for c in &self.element().content {
            match c {
                Content::Text(t) => out.push_str(t),
                Content::Element(idx) => Node { doc: self.doc, idx: *idx }.collect_text(out),
            }
        }
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("namespace", &self.namespace())
            .field("local", &self.local_name())
            .finish()
    }
}

/// Transcode the raw document to UTF-8, dropping any byte order mark.
fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>, XmlError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (sniff_encoding(bytes)?, bytes),
    };

    if encoding == UTF_8 {
        return std::str::from_utf8(body)
            .map(Cow::Borrowed)
            .map_err(|_| XmlError::Undecodable(UTF_8.name()));
    }
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(XmlError::Undecodable(encoding.name()));
    }
    Ok(text)
}

fn sniff_encoding(bytes: &[u8]) -> Result<&'static Encoding, XmlError> {
    match bytes {
        [0x3C, 0x00, 0x3F, 0x00, ..] => return Ok(UTF_16LE),
        [0x00, 0x3C, 0x00, 0x3F, ..] => return Ok(UTF_16BE),
        _ => {}
    }
    let Some(label) = declared_encoding(bytes) else {
        return Ok(UTF_8);
    };
    match Encoding::for_label(label) {
        // An ASCII-readable declaration cannot be UTF-16; the bytes win.
        Some(encoding) if encoding == UTF_16LE || encoding == UTF_16BE => Ok(UTF_8),
        Some(encoding) => Ok(encoding),
        None => Err(XmlError::UnsupportedEncoding(
            String::from_utf8_lossy(label).into_owned(),
        )),
    }
}

/// Value of `encoding="..."` in a leading `<?xml ...?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<&[u8]> {
    let rest = bytes.strip_prefix(b"<?xml")?;
    let end = rest.windows(2).position(|w| w == b"?>")?;
    let decl = &rest[..end];

    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let after = skip_whitespace(&decl[at + 8..]).strip_prefix(b"=")?;
    let (&quote, value) = skip_whitespace(after).split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = value.iter().position(|&b| b == quote)?;
    Some(&value[..len])
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn resolve_namespace(resolved: ResolveResult<'_>, event: &Event<'_>) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) => std::str::from_utf8(ns.as_ref())
            .map(|s| Some(s.to_string()))
            .map_err(|_| XmlError::Encoding("namespace URI")),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => match event {
            // End tags re-resolve the prefix after the scope closes; the
            // matching start tag has already been validated.
            Event::End(_) => Ok(None),
            _ => Err(XmlError::UnboundPrefix(String::from_utf8_lossy(&prefix).into_owned())),
        },
    }
}

fn push_element(
    elements: &mut Vec<Element>,
    open: &[usize],
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<usize, XmlError> {
    let parent = open.last().copied();
    if parent.is_none() && !elements.is_empty() {
        return Err(XmlError::Structure("more than one root element".into()));
    }

    let local = std::str::from_utf8(start.local_name().as_ref())
        .map_err(|_| XmlError::Encoding("element name"))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| XmlError::Structure(err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| XmlError::Encoding("attribute name"))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Structure(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    let idx = elements.len();
    elements.push(Element {
        namespace,
        local,
        attributes,
        parent,
        content: Vec::new(),
        end: idx + 1,
    });
    if let Some(p) = parent {
        elements[p].content.push(Content::Element(idx));
    }
    Ok(idx)
}

fn push_text(elements: &mut [Element], open: &[usize], text: String) -> Result<(), XmlError> {
    match open.last() {
        Some(&idx) => {
            elements[idx].content.push(Content::Text(text));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::Structure("text outside of the root element".into())),
    }
}
