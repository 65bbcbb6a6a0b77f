//! Archive access for OCF containers.
//!
//! [`Archive`] is the capability the container needs from a packaged file:
//! hand out a byte reader for a named member, or nothing when the member
//! does not exist. [`ZipArchiveAccessor`] implements it on top of the `zip`
//! crate.

use crate::common::Result;
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Read access to the members of a packaged archive.
///
/// Member names are archive-relative paths such as
/// `META-INF/container.xml`; a leading `/` is ignored.
pub trait Archive: Send + Sync {
    /// Open a reader over the member at `path`.
    ///
    /// Returns `None` when the member does not exist.
    fn reader_at_path(&self, path: &str) -> Option<ArchiveReader>;

    /// Whether a member exists at `path`.
    fn contains(&self, path: &str) -> bool;

    /// Names of all members, in archive order.
    fn member_names(&self) -> Vec<String>;
}

/// Byte reader over one archive member.
///
/// The member is decompressed eagerly, so the reader does not hold the
/// archive lock while it is consumed.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    name: String,
    inner: Cursor<Vec<u8>>,
}

impl ArchiveReader {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            inner: Cursor::new(data),
        }
    }

    /// Member name this reader was opened for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size of the member.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    /// Take the member bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl Read for ArchiveReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for ArchiveReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[inline]
fn member_name(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Zip-backed [`Archive`].
pub struct ZipArchiveAccessor<R> {
    archive: Mutex<zip::ZipArchive<R>>,
}

impl<R: Read + Seek> fmt::Debug for ZipArchiveAccessor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchiveAccessor")
            .field("members", &self.archive.lock().len())
            .finish()
    }
}

impl ZipArchiveAccessor<BufReader<File>> {
    /// Open a zip archive on disk.
    ///
    /// Returns `None` when the path cannot be read or is not a zip archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot open archive file");
                return None;
            },
        };
        match Self::from_reader(BufReader::new(file)) {
            Ok(accessor) => Some(accessor),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "not a zip archive");
                None
            },
        }
    }
}

impl ZipArchiveAccessor<Cursor<Vec<u8>>> {
    /// Use an in-memory zip archive.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ZipArchiveAccessor<R> {
    /// Read the central directory from `reader`.
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = zip::ZipArchive::new(reader)?;
        Ok(Self::from_zip_archive(archive))
    }

    /// Wrap an already-opened zip archive.
    pub fn from_zip_archive(archive: zip::ZipArchive<R>) -> Self {
        Self {
            archive: Mutex::new(archive),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.archive.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Read + Seek + Send> Archive for ZipArchiveAccessor<R> {
    fn reader_at_path(&self, path: &str) -> Option<ArchiveReader> {
        let name = member_name(path);
        let mut archive = self.archive.lock();
        let mut file = archive.by_name(name).ok()?;

        let mut data = Vec::with_capacity(file.size().min(1 << 24) as usize);
        if let Err(e) = file.read_to_end(&mut data) {
            tracing::warn!(member = name, error = %e, "failed to decompress archive member");
            return None;
        }
        Some(ArchiveReader::new(name, data))
    }

    fn contains(&self, path: &str) -> bool {
        self.archive.lock().index_for_name(member_name(path)).is_some()
    }

    fn member_names(&self) -> Vec<String> {
        self.archive.lock().file_names().map(str::to_string).collect()
    }
}
