//! Run-scoped scratch directory for downscaled copies.
//!
//! The directory is a [`TempDir`], so dropping the [`ScratchDir`] removes it
//! on normal completion and on every error path. A signal handler cannot
//! rely on drops, so the path is also published through a [`CleanupHandle`]:
//! whichever side takes the path first performs the removal, the other does
//! nothing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

/// Shared, take-once view of the scratch path.
#[derive(Debug, Clone, Default)]
pub struct CleanupHandle {
    path: Arc<Mutex<Option<PathBuf>>>,
}

impl CleanupHandle {
    /// Remove the scratch directory if nobody has yet. Returns whether this
    /// call did the removal.
    pub fn cleanup(&self) -> bool {
        let taken = match self.path.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match taken {
            Some(path) => {
                let _ = fs::remove_dir_all(path);
                true
            }
            None => false,
        }
    }

    /// Forget the path without touching the filesystem.
    fn disarm(&self) -> Option<PathBuf> {
        match self.path.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

pub struct ScratchDir {
    dir: TempDir,
    handle: CleanupHandle,
}

impl ScratchDir {
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("alt-scout-").tempdir()?;
        let handle = CleanupHandle {
            path: Arc::new(Mutex::new(Some(dir.path().to_path_buf()))),
        };
        Ok(Self { dir, handle })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn handle(&self) -> CleanupHandle {
        self.handle.clone()
    }

    /// A fresh file inside the scratch directory, deleted when dropped.
    ///
    /// The extension is kept so the image encoder picks the source format.
    pub fn artifact(&self, extension: &str) -> io::Result<NamedTempFile> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{extension}")
        };
        tempfile::Builder::new()
            .prefix("scaled-")
            .suffix(&suffix)
            .tempfile_in(self.dir.path())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        // The TempDir removes the directory right after this; the handle
        // only has to stop a late signal from removing it a second time.
        self.handle.disarm();
    }
}
