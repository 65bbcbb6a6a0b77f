//! OCF member paths, namespaces and queries.
//!
//! # References
//!
//! - EPUB Open Container Format 3.x, section 3.5 (META-INF)
//! - XML Encryption Syntax and Processing
//! - EPUB font obfuscation (IDPF) and Adobe font mangling

use crate::common::xml::NamespaceBindings;

// ============================================================================
// MEMBER PATHS
// ============================================================================

/// The container manifest; every OCF container has one.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Encryption metadata; optional.
pub const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";

/// Media type member at the start of the archive.
pub const MIMETYPE_PATH: &str = "mimetype";

/// Reported when the manifest carries no `version` attribute.
pub const DEFAULT_VERSION: &str = "1.0";

// ============================================================================
// NAMESPACES
// ============================================================================

/// OCF container namespace.
pub const OCF_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";

/// XML Encryption namespace.
pub const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// XML Digital Signature namespace (key info inside `EncryptedData`).
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Media type of an EPUB package document.
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

// ============================================================================
// QUERIES
// ============================================================================
// Prefixes are resolved by the bindings below, not by the documents.

/// Every rootfile element of the container manifest.
pub const ROOTFILES_QUERY: &str = "/ocf:container/ocf:rootfiles/ocf:rootfile";

/// Full path of every rootfile.
pub const ROOTFILE_PATHS_QUERY: &str = "/ocf:container/ocf:rootfiles/ocf:rootfile/@full-path";

/// Container format version.
pub const VERSION_QUERY: &str = "/ocf:container/@version";

/// Every encryption declaration of the encryption manifest.
pub const ENCRYPTED_DATA_QUERY: &str = "/ocf:encryption/enc:EncryptedData";

/// Relative to an `EncryptedData` element.
pub const ALGORITHM_QUERY: &str = "./enc:EncryptionMethod/@Algorithm";
/// Relative to an `EncryptedData` element.
pub const CIPHER_REFERENCE_QUERY: &str = "./enc:CipherData/enc:CipherReference/@URI";
/// Relative to an `EncryptedData` element.
pub const KEY_NAME_QUERY: &str = "./ds:KeyInfo/ds:KeyName";
/// Relative to an `EncryptedData` element.
pub const RETRIEVAL_METHOD_QUERY: &str = "./ds:KeyInfo/ds:RetrievalMethod/@URI";
/// Relative to an `EncryptedData` element; the compression element is
/// unqualified or in the OCF namespace depending on the producer.
pub const COMPRESSION_QUERY: &str = "./enc:EncryptionProperties/enc:EncryptionProperty/*[@Method]";

/// Bindings for container manifest queries.
pub fn container_bindings() -> NamespaceBindings {
    NamespaceBindings::from([("ocf", OCF_NS)])
}

/// Bindings for encryption manifest queries.
pub fn encryption_bindings() -> NamespaceBindings {
    NamespaceBindings::from([("ocf", OCF_NS), ("enc", XMLENC_NS), ("ds", XMLDSIG_NS)])
}
