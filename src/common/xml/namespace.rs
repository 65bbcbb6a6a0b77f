//! Namespace handling for the XML document tree and query evaluator.
//!
//! Two separate concerns live here:
//!
//! - [`NamespaceBindings`]: the prefix → URI map a caller hands to the query
//!   evaluator. Prefixes in query strings are resolved against it and never
//!   against the prefixes the document happens to use.
//! - [`NamespaceScope`]: the stack of `xmlns` declarations in effect while
//!   the parser walks the document.

use std::collections::HashMap;

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace of `xmlns` declarations themselves.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Caller-supplied prefix to URI bindings for query evaluation.
///
/// Keys are unique; insertion order is irrelevant.
///
/// # Examples
///
/// ```
/// use ocf_reader::common::xml::NamespaceBindings;
///
/// let ns = NamespaceBindings::from([("ocf", "urn:oasis:names:tc:opendocument:xmlns:container")]);
/// assert_eq!(ns.uri("ocf"), Some("urn:oasis:names:tc:opendocument:xmlns:container"));
/// assert_eq!(ns.uri("opf"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    map: HashMap<String, String>,
}

impl NamespaceBindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `uri`, replacing any previous binding of `prefix`.
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> &mut Self {
        self.map.insert(prefix.into(), uri.into());
        self
    }

    /// Builder-style variant of [`bind`](Self::bind).
    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.bind(prefix, uri);
        self
    }

    /// Look up the URI bound to `prefix`.
    ///
    /// The `xml` prefix is always bound.
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        match self.map.get(prefix) {
            Some(uri) => Some(uri.as_str()),
            None if prefix == "xml" => Some(XML_NS),
            None => None,
        }
    }

    /// Every explicit binding, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<P, U, const N: usize> From<[(P, U); N]> for NamespaceBindings
where
    P: Into<String>,
    U: Into<String>,
{
    fn from(pairs: [(P, U); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<P, U> FromIterator<(P, U)> for NamespaceBindings
where
    P: Into<String>,
    U: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (P, U)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(p, u)| (p.into(), u.into()))
                .collect(),
        }
    }
}

/// In-document namespace declarations, one frame per open element.
#[derive(Debug, Default)]
pub(crate) struct NamespaceScope {
    /// (prefix, uri) pairs; the empty prefix is the default namespace and an
    /// empty uri undeclares it.
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScope {
    pub(crate) fn push(&mut self, declarations: Vec<(String, String)>) {
        self.frames.push(declarations);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolve a prefix (`""` for the default namespace).
    ///
    /// Returns `None` when nothing is bound, or when the default namespace
    /// was undeclared with `xmlns=""`.
    pub(crate) fn resolve(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => return Some(XML_NS),
            "xmlns" => return Some(XMLNS_NS),
            _ => {},
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

/// Split a qualified name into `(prefix, local)`; the prefix is empty when absent.
#[inline]
pub(crate) fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadowing() {
        let mut scope = NamespaceScope::default();
        scope.push(vec![
            (String::new(), "urn:outer".to_string()),
            ("a".to_string(), "urn:a".to_string()),
        ]);
        scope.push(vec![(String::new(), "urn:inner".to_string())]);
        assert_eq!(scope.resolve(""), Some("urn:inner"));
        assert_eq!(scope.resolve("a"), Some("urn:a"));

        scope.pop();
        assert_eq!(scope.resolve(""), Some("urn:outer"));
        assert_eq!(scope.resolve("b"), None);
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let mut scope = NamespaceScope::default();
        scope.push(vec![(String::new(), "urn:outer".to_string())]);
        scope.push(vec![(String::new(), String::new())]);
        assert_eq!(scope.resolve(""), None);
    }

    #[test]
    fn test_bindings_rebind() {
        let mut ns = NamespaceBindings::new();
        ns.bind("p", "urn:one").bind("p", "urn:two");
        assert_eq!(ns.len(), 1);
        assert_eq!(ns.uri("p"), Some("urn:two"));
        assert_eq!(ns.uri("xml"), Some(XML_NS));
        assert_eq!(ns.iter().collect::<Vec<_>>(), [("p", "urn:two")]);
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("ocf:rootfile"), ("ocf", "rootfile"));
        assert_eq!(split_qname("rootfile"), ("", "rootfile"));
    }
}
