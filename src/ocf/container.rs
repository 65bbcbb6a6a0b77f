//! The OCF container: manifest, packages and encryption metadata.
//!
//! Opening a container is eager. The archive is opened, `container.xml` is
//! parsed, one [`Package`] is created per rootfile entry and the optional
//! `encryption.xml` is loaded. Only an unreadable archive or a missing
//! manifest fails the open; problems further down are logged and skipped.

use crate::common::xml::{XPathEvaluator, XmlDocument, attribute};
use crate::common::{Error, Result};
use crate::ocf::archive::{Archive, ZipArchiveAccessor};
use crate::ocf::constants::{
    CONTAINER_PATH, DEFAULT_VERSION, ENCRYPTED_DATA_QUERY, ENCRYPTION_PATH, ROOTFILE_PATHS_QUERY, ROOTFILES_QUERY,
    VERSION_QUERY, container_bindings, encryption_bindings,
};
use crate::ocf::encryption::EncryptionInfo;
use crate::ocf::options::{ContainerOptions, EncryptionPolicy};
use crate::ocf::package::Package;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// An opened OCF container.
///
/// Immutable once constructed; it can be shared between threads.
///
/// # Examples
///
/// ```no_run
/// use ocf_reader::Container;
///
/// # fn main() -> ocf_reader::Result<()> {
/// let container = Container::open("book.epub")?;
/// println!("OCF {}", container.version());
/// for package in container.packages() {
///     println!("{} ({})", package.full_path(), package.media_type());
/// }
/// if let Some(info) = container.encryption_info_for_path("OEBPS/fonts/font.otf") {
///     println!("encrypted with {}", info.algorithm());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Container {
    archive: Arc<dyn Archive>,
    manifest: XmlDocument,
    packages: Vec<Package>,
    encryption: Vec<EncryptionInfo>,
    location: String,
    options: ContainerOptions,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("location", &self.location)
            .field("packages", &self.packages)
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Open the container at `path` with default options.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArchive`] when `path` is not a readable zip archive
    /// - [`Error::MissingContainer`] when `META-INF/container.xml` is absent
    ///   or cannot be parsed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ContainerOptions::default())
    }

    /// Open the container at `path`.
    ///
    /// Fails like [`open`](Self::open), and additionally with
    /// [`Error::EncryptedDataMissing`] under [`EncryptionPolicy::Strict`].
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ContainerOptions) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let archive = ZipArchiveAccessor::open(path).ok_or_else(|| Error::InvalidArchive {
            path: location.clone(),
        })?;
        Self::from_archive(Arc::new(archive), location, options)
    }

    /// Read a container from an already-opened archive.
    ///
    /// `location` only appears in errors and logs.
    pub fn from_archive(
        archive: Arc<dyn Archive>,
        location: impl Into<String>,
        options: ContainerOptions,
    ) -> Result<Self> {
        let location = location.into();

        let manifest = load_document(archive.as_ref(), CONTAINER_PATH, &options).ok_or_else(|| {
            Error::MissingContainer {
                path: location.clone(),
            }
        })?;
        let packages = discover_packages(&archive, &manifest);
        let encryption = load_encryption(archive.as_ref(), &location, &options)?;

        debug!(
            path = %location,
            packages = packages.len(),
            encrypted = encryption.len(),
            "opened container"
        );

        Ok(Self {
            archive,
            manifest,
            packages,
            encryption,
            location,
            options,
        })
    }

    /// Full paths of all rootfiles, in manifest order.
    ///
    /// Read straight from the manifest on every call.
    pub fn package_locations(&self) -> Vec<String> {
        let ns = container_bindings();
        self.manifest
            .with_document(|doc| XPathEvaluator::new(doc, &ns).strings(ROOTFILE_PATHS_QUERY))
    }

    /// The `version` attribute of the manifest root, `"1.0"` when absent.
    pub fn version(&self) -> String {
        let ns = container_bindings();
        self.manifest
            .with_document(|doc| XPathEvaluator::new(doc, &ns).strings(VERSION_QUERY))
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string())
    }

    /// First encryption record for exactly `path`.
    pub fn encryption_info_for_path(&self, path: &str) -> Option<&EncryptionInfo> {
        self.encryption.iter().find(|info| info.path() == path)
    }

    /// Packages in manifest order.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// The first package; reading systems render this one.
    pub fn default_package(&self) -> Option<&Package> {
        self.packages.first()
    }

    /// Encryption records in `encryption.xml` order.
    pub fn encryption_info(&self) -> &[EncryptionInfo] {
        &self.encryption
    }

    pub fn archive(&self) -> &Arc<dyn Archive> {
        &self.archive
    }

    /// Where the container was opened from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The parsed `container.xml`.
    pub fn manifest(&self) -> &XmlDocument {
        &self.manifest
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }
}

/// Parse an XML member; `None` when it is missing or unparseable.
fn load_document(archive: &dyn Archive, member: &str, options: &ContainerOptions) -> Option<XmlDocument> {
    let Some(reader) = archive.reader_at_path(member) else {
        debug!(member, "member not present");
        return None;
    };
    match XmlDocument::parse(reader, &options.declared_encoding, options.parse_flags) {
        Ok(doc) => Some(doc),
        Err(e) => {
            debug!(member, error = %e, "member is not parseable XML");
            None
        },
    }
}

fn discover_packages(archive: &Arc<dyn Archive>, manifest: &XmlDocument) -> Vec<Package> {
    let ns = container_bindings();
    manifest.with_document(|doc| {
        let xpath = XPathEvaluator::new(doc, &ns);

        let mut packages = Vec::new();
        for rootfile in xpath.elements(ROOTFILES_QUERY) {
            let Some(full_path) = attribute(rootfile, "full-path") else {
                debug!("skipping rootfile without full-path");
                continue;
            };
            let media_type = attribute(rootfile, "media-type").unwrap_or_default();
            packages.push(Package::new(Arc::clone(archive), full_path, media_type));
        }
        packages
    })
}

fn load_encryption(archive: &dyn Archive, location: &str, options: &ContainerOptions) -> Result<Vec<EncryptionInfo>> {
    let Some(doc) = load_document(archive, ENCRYPTION_PATH, options) else {
        return Ok(Vec::new());
    };

    let ns = encryption_bindings();
    let records: Vec<EncryptionInfo> = doc.with_document(|d| {
        let xpath = XPathEvaluator::new(d, &ns);
        xpath
            .elements(ENCRYPTED_DATA_QUERY)
            .into_iter()
            .map(|node| EncryptionInfo::from_node(&xpath, node))
            .collect()
    });

    if records.is_empty() {
        if options.encryption_policy == EncryptionPolicy::Strict {
            return Err(Error::EncryptedDataMissing {
                path: location.to_string(),
            });
        }
        debug!(path = %location, "encryption.xml declares no EncryptedData");
    }
    Ok(records)
}
