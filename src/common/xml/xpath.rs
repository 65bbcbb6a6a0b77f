//! Namespace-aware XPath queries over an [`XmlDocument`].
//!
//! Queries are XPath 1.0, compiled and evaluated by `sxd_xpath`. Prefixes in
//! a query are resolved against the [`NamespaceBindings`] given to the
//! evaluator, never against the prefixes used inside the document. A prefix
//! missing from the bindings matches nothing, and an unprefixed element name
//! matches elements in no namespace.
//!
//! # Examples
//!
//! ```
//! use ocf_reader::common::xml::{NamespaceBindings, ParseFlags, XPathEvaluator, XmlDocument};
//!
//! let doc = XmlDocument::parse_str(
//!     r#"<c xmlns="urn:c"><r p="a"/><r p="b"/></c>"#,
//!     ParseFlags::TOLERANT,
//! ).unwrap();
//! let ns = NamespaceBindings::from([("x", "urn:c")]);
//!
//! doc.with_document(|d| {
//!     let xpath = XPathEvaluator::new(d, &ns);
//!     assert_eq!(xpath.strings("/x:c/x:r/@p"), ["a", "b"]);
//!     assert_eq!(xpath.nodes("//x:r[2]").len(), 1);
//!     assert!(xpath.nodes("/y:c").is_empty());
//! });
//! ```
//!
//! [`XmlDocument`]: crate::common::xml::XmlDocument

use crate::common::xml::namespace::NamespaceBindings;
use crate::common::{Error, Result};
use sxd_document::dom::{Document, Element};
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value, XPath};

/// Compile a query.
///
/// # Errors
///
/// [`Error::InvalidQuery`] when the expression is empty or malformed.
pub fn compile(query: &str) -> Result<XPath> {
    match Factory::new().build(query) {
        Ok(Some(xpath)) => Ok(xpath),
        Ok(None) => Err(Error::InvalidQuery(format!("empty query '{query}'"))),
        Err(e) => Err(Error::InvalidQuery(format!("'{query}': {e:?}"))),
    }
}

/// Evaluates queries against one document with fixed namespace bindings.
///
/// Query problems never surface as errors: a malformed query is logged and
/// yields nothing, as does a prefix missing from the bindings.
pub struct XPathEvaluator<'d> {
    document: Document<'d>,
    context: Context<'d>,
}

impl<'d> XPathEvaluator<'d> {
    pub fn new(document: Document<'d>, bindings: &NamespaceBindings) -> Self {
        let mut context = Context::new();
        for (prefix, uri) in bindings.iter() {
            context.set_namespace(prefix, uri);
        }
        Self { document, context }
    }

    /// Evaluate `query` with `node` as the context node.
    ///
    /// `None` when the query does not compile or fails to evaluate.
    pub fn evaluate<N>(&self, node: N, query: &str) -> Option<Value<'d>>
    where
        N: Into<Node<'d>>,
    {
        let xpath = match compile(query) {
            Ok(xpath) => xpath,
            Err(e) => {
                tracing::warn!(query, error = %e, "ignoring malformed query");
                return None;
            },
        };
        match xpath.evaluate(&self.context, node) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(query, error = ?e, "query evaluation failed");
                None
            },
        }
    }

    /// Nodes selected from the document root, in document order.
    pub fn nodes(&self, query: &str) -> Vec<Node<'d>> {
        self.nodes_from(self.document.root(), query)
    }

    /// Nodes selected from `context`, in document order.
    pub fn nodes_from<N>(&self, context: N, query: &str) -> Vec<Node<'d>>
    where
        N: Into<Node<'d>>,
    {
        match self.evaluate(context, query) {
            Some(Value::Nodeset(nodes)) => nodes.document_order(),
            _ => Vec::new(),
        }
    }

    /// Elements selected from the document root; other node kinds are dropped.
    pub fn elements(&self, query: &str) -> Vec<Element<'d>> {
        self.elements_from(self.document.root(), query)
    }

    /// Elements selected from `context`; other node kinds are dropped.
    pub fn elements_from<N>(&self, context: N, query: &str) -> Vec<Element<'d>>
    where
        N: Into<Node<'d>>,
    {
        self.nodes_from(context, query)
            .into_iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .collect()
    }

    /// String values of the selection from the document root.
    pub fn strings(&self, query: &str) -> Vec<String> {
        self.strings_from(self.document.root(), query)
    }

    /// String values of the selection from `context`.
    ///
    /// Attribute selections yield attribute values and element selections
    /// their concatenated text. A query producing a string, number or
    /// boolean yields that single value.
    pub fn strings_from<N>(&self, context: N, query: &str) -> Vec<String>
    where
        N: Into<Node<'d>>,
    {
        match self.evaluate(context, query) {
            Some(Value::Nodeset(nodes)) => nodes.document_order().iter().map(Node::string_value).collect(),
            Some(Value::String(s)) => vec![s],
            Some(Value::Number(n)) => vec![n.to_string()],
            Some(Value::Boolean(b)) => vec![b.to_string()],
            None => Vec::new(),
        }
    }
}
