//! Header Injector - Read Fully, Then Replace
//!
//! Read source and write target are the same path. The whole file is
//! buffered and the read handle dropped before anything is written, and the
//! new content lands through a sibling temp file renamed over the target.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::pipeline::{BuildError, BuildStage};

/// Prepends a fixed attribution header to a file.
///
/// No detection of an existing header: injecting twice duplicates it.
#[derive(Debug, Clone)]
pub struct HeaderInjector {
    header: String,
}

impl HeaderInjector {
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into() }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Rewrite `path` as `header + original`. Returns the bytes written.
    pub fn inject(&self, path: &Path) -> Result<u64, BuildError> {
        let original = read_artifact(path)?;
        let permissions = fs::metadata(path).map_err(|e| io_error(path, e))?.permissions();

        let mut content = Vec::with_capacity(self.header.len() + original.len());
        content.extend_from_slice(self.header.as_bytes());
        content.extend_from_slice(&original);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut staged = NamedTempFile::new_in(&dir).map_err(|e| io_error(&dir, e))?;
        staged.write_all(&content).map_err(|e| io_error(staged.path(), e))?;
        staged.as_file().sync_all().map_err(|e| io_error(staged.path(), e))?;
        fs::set_permissions(staged.path(), permissions).map_err(|e| io_error(staged.path(), e))?;
        staged.persist(path).map_err(|e| io_error(path, e.error))?;

        debug!(path = %path.display(), bytes = content.len(), "header injected");
        Ok(content.len() as u64)
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => BuildError::OutputNotFound(path.to_path_buf()),
        _ => io_error(path, e),
    })
}

fn io_error(path: &Path, source: io::Error) -> BuildError {
    BuildError::Io { stage: BuildStage::Inject, path: path.to_path_buf(), source }
}
