//! Configuration for opening a container.

use crate::common::xml::ParseFlags;
use serde::{Deserialize, Serialize};

/// What to do with an `encryption.xml` that declares no `EncryptedData`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionPolicy {
    /// Treat it like a missing `encryption.xml`.
    #[default]
    Lenient,
    /// Fail with [`Error::EncryptedDataMissing`](crate::common::Error::EncryptedDataMissing).
    Strict,
}

/// Options controlling how a [`Container`](crate::ocf::Container) is read.
///
/// # Examples
///
/// ```rust
/// use ocf_reader::ocf::{ContainerOptions, EncryptionPolicy};
/// use ocf_reader::common::xml::ParseFlags;
///
/// // Create with defaults
/// let options = ContainerOptions::default();
/// assert_eq!(options.parse_flags, ParseFlags::TOLERANT);
///
/// // Or customize
/// let options = ContainerOptions::new()
///     .with_encryption_policy(EncryptionPolicy::Strict)
///     .with_declared_encoding("windows-1252");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Flags for parsing `container.xml` and `encryption.xml`
    pub parse_flags: ParseFlags,
    /// Handling of an encryption manifest without entries
    pub encryption_policy: EncryptionPolicy,
    /// Encoding assumed when a member has neither a BOM nor an XML declaration
    pub declared_encoding: String,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            parse_flags: ParseFlags::TOLERANT,
            encryption_policy: EncryptionPolicy::Lenient,
            declared_encoding: "utf-8".to_string(),
        }
    }
}

impl ContainerOptions {
    /// Create a new `ContainerOptions` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the XML parse flags.
    #[inline]
    pub fn with_parse_flags(mut self, flags: ParseFlags) -> Self {
        self.parse_flags = flags;
        self
    }

    /// Set the policy for an encryption manifest without entries.
    #[inline]
    pub fn with_encryption_policy(mut self, policy: EncryptionPolicy) -> Self {
        self.encryption_policy = policy;
        self
    }

    /// Set the fallback encoding label.
    #[inline]
    pub fn with_declared_encoding(mut self, label: impl Into<String>) -> Self {
        self.declared_encoding = label.into();
        self
    }
}
