//! Open Container Format (OCF) reading.
//!
//! An OCF container is a zip archive whose `META-INF/container.xml` lists
//! the package documents ("rootfiles") inside it, and whose optional
//! `META-INF/encryption.xml` declares which members are encrypted or
//! obfuscated.

pub mod archive;
pub mod constants;
pub mod container;
pub mod encryption;
pub mod options;
pub mod package;

pub use archive::{Archive, ArchiveReader, ZipArchiveAccessor};
pub use container::Container;
pub use encryption::{Compression, EncryptionAlgorithm, EncryptionInfo, ObfuscationKey};
pub use options::{ContainerOptions, EncryptionPolicy};
pub use package::Package;
