//! ocf-reader - A Rust library for reading Open Container Format archives
//!
//! This library opens EPUB-style OCF containers: zip archives whose
//! `META-INF/container.xml` lists the document packages they hold and whose
//! optional `META-INF/encryption.xml` declares protected members.
//!
//! # Features
//!
//! - **Container discovery**: Packages in manifest order, container version
//! - **Encryption metadata**: `EncryptedData` records, font de-obfuscation keys
//! - **Tolerant XML**: Recovery from malformed manifests, internal DTD entities
//!   and attribute defaults
//! - **Namespace-aware queries**: XPath-style paths over parsed members
//!
//! # Example - Opening a container
//!
//! ```no_run
//! use ocf_reader::Container;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let container = Container::open("book.epub")?;
//!
//! for location in container.package_locations() {
//!     println!("Package: {}", location);
//! }
//! println!("OCF version: {}", container.version());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Encrypted members
//!
//! ```no_run
//! use ocf_reader::{Container, ObfuscationKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let container = Container::open("book.epub")?;
//! let path = "OEBPS/fonts/body.otf";
//!
//! if let Some(info) = container.encryption_info_for_path(path)
//!     && info.is_font_obfuscation()
//! {
//!     let mut font = container.archive().reader_at_path(path).map(|r| r.into_bytes()).unwrap_or_default();
//!     let key = ObfuscationKey::idpf("urn:uuid:...");
//!     info.deobfuscate(&mut font, &key);
//! }
//! # Ok(())
//! # }
//! ```

/// Shared building blocks: errors, character encodings and XML
pub mod common;

/// OCF container reading
///
/// The archive accessor, the container itself, and the package and
/// encryption records it produces.
pub mod ocf;

pub use common::{Error, Result};
pub use ocf::{
    Archive, Container, ContainerOptions, EncryptionAlgorithm, EncryptionInfo, EncryptionPolicy, ObfuscationKey,
    Package,
};
