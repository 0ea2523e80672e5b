use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{error::Error, Result};

/// Owns the transient build directory of a single run.
///
/// The directory is created lazily by [`ensure`](Self::ensure) and removed by
/// [`purge_all`](Self::purge_all). Dropping the store purges it as well, so the
/// directory never outlives the run even when the run is cancelled or panics.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    purged: bool,
}

impl ArtifactStore {
    /// A store rooted at a fresh `run-<uuid>` directory under `base`.
    /// Concurrent runs sharing a base never see each other's artifacts.
    pub fn for_run(base: &Path) -> Self {
        let id = Uuid::new_v4();
        Self::at(base.join(format!("run-{}", id)))
    }

    /// A store rooted at exactly `root`
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            purged: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the build directory if it is absent
    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Map a logical binary name to a path directly inside the build directory.
    /// Names that could escape the directory are rejected.
    pub fn allocate(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None)
                if !name.contains(['/', '\\', '\0']) && part == name =>
            {
                Ok(self.root.join(part))
            }
            _ => Err(Error::InvalidArtifactName(name.to_string())),
        }
    }

    /// Remove every entry inside the build directory, then the directory itself.
    /// Symlinks are unlinked, never followed. Entries already removed by someone
    /// else are ignored.
    pub fn purge_all(&mut self) {
        self.purged = true;

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                error!("Failed to read build directory {:?}: {}", self.root, e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_dir = match entry.file_type() {
                Ok(kind) => kind.is_dir(),
                Err(_) => continue,
            };
            let removed = if is_dir {
                warn!("Removing unexpected directory in build root: {:?}", path);
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match removed {
                Ok(()) => debug!("Removed artifact {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => error!("Failed to remove artifact {:?}: {}", path, e),
            }
        }

        match std::fs::remove_dir(&self.root) {
            Ok(()) => debug!("Removed build directory {:?}", self.root),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!("Failed to remove build directory {:?}: {}", self.root, e),
        }
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        if !self.purged {
            self.purge_all();
        }
    }
}
