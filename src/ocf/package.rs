//! Document packages declared by a container.

use crate::ocf::archive::Archive;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// A document package referenced by a `rootfile` entry.
///
/// Shares the archive with the [`Container`](crate::ocf::Container) that
/// created it. The package document itself is not parsed here.
#[derive(Clone)]
pub struct Package {
    archive: Arc<dyn Archive>,
    full_path: String,
    media_type: String,
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("full_path", &self.full_path)
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}

impl Package {
    /// Create a package for the document at `full_path`; `media_type` may be empty.
    pub fn new(archive: Arc<dyn Archive>, full_path: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            archive,
            full_path: full_path.into(),
            media_type: media_type.into(),
        }
    }

    /// Archive-relative path of the package document.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Declared media type, empty when the rootfile had none.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Directory of the package document with a trailing `/`, or `""` at the
    /// archive root. Relative references inside the package resolve against it.
    pub fn base_path(&self) -> &str {
        match self.full_path.rfind('/') {
            Some(idx) => &self.full_path[..=idx],
            None => "",
        }
    }

    pub fn archive(&self) -> &Arc<dyn Archive> {
        &self.archive
    }

    /// Whether the package document is present in the archive.
    pub fn exists(&self) -> bool {
        self.archive.contains(&self.full_path)
    }

    /// Raw bytes of the package document, `None` when it is missing.
    pub fn read_raw(&self) -> Option<Vec<u8>> {
        let mut reader = self.archive.reader_at_path(&self.full_path)?;
        let mut data = Vec::with_capacity(reader.len());
        match reader.read_to_end(&mut data) {
            Ok(_) => Some(data),
            Err(e) => {
                tracing::warn!(path = %self.full_path, error = %e, "failed to read package document");
                None
            },
        }
    }
}
