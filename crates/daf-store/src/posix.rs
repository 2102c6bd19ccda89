use std::fs;
use std::io::{self, Write};
use std::path::Path;

use daf_types::StorageKind;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::Storage;

/// Local-filesystem storage.
///
/// Writes go to a temporary file in the destination directory which is then
/// renamed into place, so readers never observe a torn record. Missing
/// parent directories are created on write.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixStorage;

impl PosixStorage {
    pub fn new() -> Self {
        Self
    }

    fn staged(location: &str, data: &[u8]) -> StoreResult<tempfile::NamedTempFile> {
        let path = Path::new(location);
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

impl Storage for PosixStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Posix
    }

    fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(location) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, location: &str, data: &[u8]) -> StoreResult<()> {
        let tmp = Self::staged(location, data)?;
        tmp.persist(location).map_err(|e| StoreError::Io(e.error))?;
        debug!(location, bytes = data.len(), "wrote file");
        Ok(())
    }

    fn create(&self, location: &str, data: &[u8]) -> StoreResult<()> {
        let tmp = Self::staged(location, data)?;
        match tmp.persist_noclobber(location) {
            Ok(_) => {
                debug!(location, bytes = data.len(), "created file");
                Ok(())
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(location.to_string()))
            }
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    fn exists(&self, location: &str) -> StoreResult<bool> {
        Ok(Path::new(location).is_file())
    }

    fn remove(&self, location: &str) -> StoreResult<bool> {
        match fs::remove_file(location) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        let base = Path::new(dir);
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(base).follow_links(true) {
            let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(base) else {
                continue;
            };
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
        out.sort();
        Ok(out)
    }
}
