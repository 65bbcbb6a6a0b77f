//! Parsed, immutable XML document.
//!
//! Bytes are tokenized with `quick-xml` and the tree is emitted into an
//! `sxd_document` package, which is what [`XPathEvaluator`] queries. Unlike
//! `sxd_document::parser`, the tokenizer loop recovers from malformed markup
//! and applies internal DTD entities and attribute defaults. See
//! [`ParseFlags`].
//!
//! [`XPathEvaluator`]: crate::common::xml::XPathEvaluator

use crate::common::encoding::decode_xml;
use crate::common::xml::dtd::InternalSubset;
use crate::common::xml::namespace::{NamespaceScope, split_qname};
use crate::common::{Error, Result};
use bitflags::bitflags;
use parking_lot::Mutex;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use sxd_document::QName;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element};

/// Consecutive syntax errors tolerated in recovery mode before giving up.
const MAX_RECOVERED_ERRORS: usize = 32;

bitflags! {
    /// Parser behaviour switches.
    ///
    /// The bit values follow the libxml2 `XML_PARSE_*` options of the same
    /// meaning so flags stored in configuration files stay recognisable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ParseFlags: u32 {
        /// Recover from malformed markup instead of failing.
        ///
        /// Mismatched and unmatched end tags are tolerated, malformed
        /// attributes are dropped, undefined entities are kept literally and
        /// a fatal syntax error ends parsing with the tree built so far.
        const RECOVER = 0x0001;
        /// Substitute entities declared in the internal DTD subset.
        const NOENT = 0x0002;
        /// Apply default attribute values declared with `<!ATTLIST>`.
        const DTDATTR = 0x0008;
        /// `RECOVER | NOENT | DTDATTR`, the mode used for OCF metadata.
        const TOLERANT = Self::RECOVER.bits() | Self::NOENT.bits() | Self::DTDATTR.bits();
    }
}

impl Default for ParseFlags {
    fn default() -> Self {
        Self::TOLERANT
    }
}

/// The `sxd_document` storage behind an [`XmlDocument`].
struct Arena(sxd_document::Package);

// SAFETY: a `Package` owns every allocation its internal pointers refer to and
// keeps no thread-local state. DOM handles borrow the package, so none survive
// a move to another thread. Shared access is serialised by the mutex in
// `XmlDocument`.
unsafe impl Send for Arena {}

/// A parsed XML document.
///
/// The tree is never modified after parsing. It is read through
/// [`with_document`](Self::with_document), which hands out an
/// `sxd_document` view for the duration of a closure.
pub struct XmlDocument {
    arena: Mutex<Arena>,
    encoding: &'static str,
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.with_document(|doc| document_element(doc).map(qualified_name));
        f.debug_struct("XmlDocument")
            .field("root", &root)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl XmlDocument {
    /// Parse a document from a byte stream.
    ///
    /// `declared_encoding` is used when neither a byte order mark nor the XML
    /// declaration names the encoding.
    ///
    /// # Errors
    ///
    /// Fails when the stream cannot be read, or when no document element
    /// could be built even under [`ParseFlags::RECOVER`] (empty stream, not
    /// XML at all).
    pub fn parse<R: Read>(mut reader: R, declared_encoding: &str, flags: ParseFlags) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse_bytes(&bytes, declared_encoding, flags)
    }

    /// Parse a document from raw bytes.
    pub fn parse_bytes(bytes: &[u8], declared_encoding: &str, flags: ParseFlags) -> Result<Self> {
        let (text, encoding) = decode_xml(bytes, declared_encoding, flags.contains(ParseFlags::RECOVER))?;
        let mut doc = Self::parse_str(&text, flags)?;
        doc.encoding = encoding.name();
        Ok(doc)
    }

    /// Parse a document that is already UTF-8 text.
    ///
    /// # Examples
    ///
    /// ```
    /// use ocf_reader::common::xml::{ParseFlags, XmlDocument, document_element};
    ///
    /// let doc = XmlDocument::parse_str(r#"<a x="1"><b/></a>"#, ParseFlags::TOLERANT).unwrap();
    /// doc.with_document(|d| {
    ///     let root = document_element(d).unwrap();
    ///     assert_eq!(root.name().local_part(), "a");
    ///     assert_eq!(root.attribute_value("x"), Some("1"));
    /// });
    /// ```
    pub fn parse_str(xml: &str, flags: ParseFlags) -> Result<Self> {
        let package = sxd_document::Package::new();
        TreeBuilder::new(package.as_document(), flags).build(xml)?;
        Ok(Self {
            arena: Mutex::new(Arena(package)),
            encoding: "UTF-8",
        })
    }

    /// Run `f` over the document tree.
    ///
    /// Calls from different threads take turns.
    pub fn with_document<T, F>(&self, f: F) -> T
    where
        F: FnOnce(Document<'_>) -> T,
    {
        let arena = self.arena.lock();
        f(arena.0.as_document())
    }

    /// Name of the encoding the source bytes were decoded from.
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }
}

/// The document element of `doc`.
pub fn document_element(doc: Document<'_>) -> Option<Element<'_>> {
    doc.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(element) => Some(element),
        _ => None,
    })
}

/// Element children of `element` in document order.
pub fn child_elements<'d>(element: Element<'d>) -> impl Iterator<Item = Element<'d>> {
    element.children().into_iter().filter_map(|child| match child {
        ChildOfElement::Element(element) => Some(element),
        _ => None,
    })
}

/// Attribute value by local name.
///
/// An attribute without namespace is preferred; otherwise the first
/// attribute with that local name in any namespace matches.
pub fn attribute<'d>(element: Element<'d>, local_name: &str) -> Option<&'d str> {
    element.attribute_value(local_name).or_else(|| {
        element
            .attributes()
            .into_iter()
            .find(|attr| attr.name().local_part() == local_name)
            .map(|attr| attr.value())
    })
}

/// `prefix:local` as written in the source, or just `local`.
pub fn qualified_name(element: Element<'_>) -> String {
    let local = element.name().local_part();
    match element.preferred_prefix() {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

/// Raw attribute as written, before namespace resolution.
struct RawAttribute {
    qname: String,
    value: String,
}

/// An element that has been started but not yet closed.
struct OpenElement<'d> {
    element: Element<'d>,
    qname: String,
}

/// Incremental builder turning `quick-xml` events into an `sxd_document` tree.
struct TreeBuilder<'d> {
    doc: Document<'d>,
    flags: ParseFlags,
    /// Open elements, innermost last.
    open: Vec<OpenElement<'d>>,
    /// Character data not yet attached to the innermost open element.
    text: String,
    scope: NamespaceScope,
    subset: InternalSubset,
    root: Option<Element<'d>>,
}

impl<'d> TreeBuilder<'d> {
    fn new(doc: Document<'d>, flags: ParseFlags) -> Self {
        Self {
            doc,
            flags,
            open: Vec::new(),
            text: String::new(),
            scope: NamespaceScope::default(),
            subset: InternalSubset::default(),
            root: None,
        }
    }

    #[inline]
    fn recover(&self) -> bool {
        self.flags.contains(ParseFlags::RECOVER)
    }

    fn build(mut self, xml: &str) -> Result<()> {
        let recover = self.recover();
        let mut reader = Reader::from_str(xml);
        {
            let config = reader.config_mut();
            config.check_end_names = !recover;
            config.allow_unmatched_ends = recover;
        }

        let mut errors = 0usize;
        loop {
            let position = reader.buffer_position();
            let step = match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => self.handle_event(event),
                Err(e) => Err(Error::from(e)),
            };

            match step {
                Ok(Flow::Continue) => errors = 0,
                Ok(Flow::Stop) => break,
                Err(e) if recover => {
                    errors += 1;
                    tracing::debug!(error = %e, errors, "recovering from malformed XML");
                    if errors >= MAX_RECOVERED_ERRORS || reader.buffer_position() == position {
                        break;
                    }
                },
                Err(e) => return Err(e),
            }
        }

        self.finish()
    }

    fn handle_event(&mut self, event: Event<'_>) -> Result<Flow> {
        match event {
            Event::Start(e) => self.open_element(&e),
            Event::Empty(e) => {
                let flow = self.open_element(&e)?;
                if flow == Flow::Continue {
                    self.pop_element();
                }
                Ok(flow)
            },
            Event::End(e) => {
                let qname = std::str::from_utf8(e.name().as_ref())
                    .map_err(|e| Error::Xml(e.to_string()))?
                    .to_string();
                self.close_element(&qname)?;
                Ok(Flow::Continue)
            },
            Event::Text(e) => {
                let text = std::str::from_utf8(&e).map_err(|e| Error::Xml(e.to_string()))?;
                self.append_text(text);
                Ok(Flow::Continue)
            },
            Event::CData(e) => {
                let text = std::str::from_utf8(&e).map_err(|e| Error::Xml(e.to_string()))?;
                self.append_text(text);
                Ok(Flow::Continue)
            },
            Event::GeneralRef(e) => {
                let name = std::str::from_utf8(&e).map_err(|e| Error::Xml(e.to_string()))?;
                let value = self.resolve_reference(name)?;
                self.append_text(&value);
                Ok(Flow::Continue)
            },
            Event::DocType(e) => {
                if self.flags.intersects(ParseFlags::NOENT | ParseFlags::DTDATTR) {
                    let subset = InternalSubset::parse(&String::from_utf8_lossy(&e));
                    if !subset.is_empty() {
                        tracing::trace!("loaded internal DTD subset");
                    }
                    self.subset = subset;
                }
                Ok(Flow::Continue)
            },
            // Declarations, comments and processing instructions carry nothing we keep.
            _ => Ok(Flow::Continue),
        }
    }

    fn open_element(&mut self, start: &BytesStart<'_>) -> Result<Flow> {
        let recover = self.recover();
        if self.open.is_empty() && self.root.is_some() {
            if recover {
                tracing::debug!("ignoring content after the document element");
                return Ok(Flow::Stop);
            }
            return Err(Error::Xml("extra content after the document element".to_string()));
        }

        let qname = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(e.to_string()))?
            .to_string();

        let mut raw = Vec::new();
        for attr in start.attributes().with_checks(!recover) {
            let attr = match attr {
                Ok(attr) => attr,
                Err(e) if recover => {
                    tracing::debug!(element = %qname, error = %e, "dropping malformed attribute");
                    continue;
                },
                Err(e) => return Err(e.into()),
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if raw.iter().any(|a: &RawAttribute| a.qname == key) {
                continue;
            }
            let value = std::str::from_utf8(&attr.value).map_err(|e| Error::Xml(e.to_string()))?;
            let value = self.expand_attribute_value(value)?;
            raw.push(RawAttribute { qname: key, value });
        }

        if self.flags.contains(ParseFlags::DTDATTR) {
            for (name, value) in self.subset.attribute_defaults(&qname) {
                if !raw.iter().any(|a| &a.qname == name) {
                    raw.push(RawAttribute {
                        qname: name.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        let mut declarations = Vec::new();
        let mut regular = Vec::with_capacity(raw.len());
        for attr in raw {
            if attr.qname == "xmlns" {
                declarations.push((String::new(), attr.value));
            } else if let Some(prefix) = attr.qname.strip_prefix("xmlns:") {
                declarations.push((prefix.to_string(), attr.value));
            } else {
                regular.push(attr);
            }
        }
        self.scope.push(declarations);

        let (prefix, local_name) = split_qname(&qname);
        let namespace = self.resolve_prefix(prefix, &qname)?;

        self.flush_text();
        let element = self
            .doc
            .create_element(QName::with_namespace_uri(namespace.as_deref(), local_name));
        if !prefix.is_empty() {
            element.set_preferred_prefix(Some(prefix));
        }

        for attr in regular {
            let (attr_prefix, attr_local) = split_qname(&attr.qname);
            let attr_namespace = match attr_prefix {
                "" => None,
                p => self.resolve_prefix(p, &attr.qname)?,
            };
            element.set_attribute_value(QName::with_namespace_uri(attr_namespace.as_deref(), attr_local), &attr.value);
        }

        match self.open.last() {
            Some(parent) => parent.element.append_child(element),
            None => {
                self.doc.root().append_child(element);
                self.root = Some(element);
            },
        }
        self.open.push(OpenElement { element, qname });
        Ok(Flow::Continue)
    }

    fn resolve_prefix(&self, prefix: &str, qname: &str) -> Result<Option<String>> {
        match self.scope.resolve(prefix) {
            Some(uri) => Ok(Some(uri.to_string())),
            None if prefix.is_empty() => Ok(None),
            None if self.recover() => {
                tracing::debug!(name = qname, "namespace prefix is not bound");
                Ok(None)
            },
            None => Err(Error::Xml(format!("namespace prefix of '{qname}' is not bound"))),
        }
    }

    fn pop_element(&mut self) {
        self.flush_text();
        if self.open.pop().is_some() {
            self.scope.pop();
        }
    }

    fn close_element(&mut self, qname: &str) -> Result<()> {
        match self.open.iter().rposition(|open| open.qname == qname) {
            Some(depth) => {
                while self.open.len() > depth {
                    self.pop_element();
                }
                Ok(())
            },
            None if self.recover() => {
                tracing::debug!(name = qname, "ignoring unmatched end tag");
                Ok(())
            },
            None => Err(Error::Xml(format!("unexpected end tag '{qname}'"))),
        }
    }

    fn append_text(&mut self, text: &str) {
        // Text outside the document element is not part of the tree.
        if !self.open.is_empty() {
            self.text.push_str(text);
        }
    }

    /// Attach pending character data to the innermost open element.
    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        if let Some(parent) = self.open.last() {
            parent.element.append_child(self.doc.create_text(&self.text));
        }
        self.text.clear();
    }

    /// Resolve the name inside `&name;`.
    fn resolve_reference(&self, name: &str) -> Result<Cow<'static, str>> {
        if let Some(number) = name.strip_prefix('#') {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => number.parse::<u32>().ok(),
            };
            return match code.and_then(char::from_u32) {
                Some(c) => Ok(Cow::Owned(c.to_string())),
                None if self.recover() => Ok(Cow::Owned(format!("&{name};"))),
                None => Err(Error::Xml(format!("invalid character reference '&{name};'"))),
            };
        }

        if let Some(value) = quick_xml::escape::resolve_predefined_entity(name) {
            return Ok(Cow::Borrowed(value));
        }

        if let Some(value) = self.subset.entity(name) {
            if self.flags.contains(ParseFlags::NOENT) {
                let expanded = quick_xml::escape::unescape(value)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| value.to_string());
                return Ok(Cow::Owned(expanded));
            }
            return Ok(Cow::Owned(format!("&{name};")));
        }

        if self.recover() {
            tracing::debug!(entity = name, "keeping undefined entity literally");
            Ok(Cow::Owned(format!("&{name};")))
        } else {
            Err(Error::Xml(format!("undefined entity '&{name};'")))
        }
    }

    /// Normalise whitespace and expand references in an attribute value.
    fn expand_attribute_value(&self, raw: &str) -> Result<String> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(amp) = memchr::memchr(b'&', rest.as_bytes()) {
            push_normalized(&mut out, &rest[..amp]);
            let after = &rest[amp + 1..];
            match after.find(';') {
                Some(end) if end > 0 && !after[..end].contains(['&', ' ', '<']) => {
                    out.push_str(&self.resolve_reference(&after[..end])?);
                    rest = &after[end + 1..];
                },
                _ if self.recover() => {
                    out.push('&');
                    rest = after;
                },
                _ => return Err(Error::Xml(format!("unterminated reference in '{raw}'"))),
            }
        }
        push_normalized(&mut out, rest);
        Ok(out)
    }

    fn finish(mut self) -> Result<()> {
        if !self.open.is_empty() {
            if !self.recover() {
                return Err(Error::Xml("document ended inside an open element".to_string()));
            }
            while !self.open.is_empty() {
                self.pop_element();
            }
        }
        match self.root {
            Some(_) => Ok(()),
            None => Err(Error::Xml("document has no root element".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Attribute-value normalisation: literal tabs and line breaks become spaces.
#[inline]
fn push_normalized(out: &mut String, text: &str) {
    out.extend(text.chars().map(|c| match c {
        '\t' | '\n' | '\r' => ' ',
        c => c,
    }));
}
