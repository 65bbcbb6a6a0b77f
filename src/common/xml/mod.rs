//! XML support: a tolerant document parser and namespace-aware queries.
//!
//! Archive members such as `META-INF/container.xml` are parsed into an
//! immutable [`XmlDocument`] and inspected with an [`XPathEvaluator`] bound
//! to an explicit set of [`NamespaceBindings`].

pub mod document;
pub(crate) mod dtd;
pub mod namespace;
pub mod xpath;

pub use document::{ParseFlags, XmlDocument, attribute, child_elements, document_element, qualified_name};
pub use namespace::NamespaceBindings;
pub use xpath::{XPathEvaluator, compile};
