//! Artifact persistence
//!
//! A snapshot is persisted as two sibling files sharing a base name: the
//! structure JSON and the full-page image. Each file is written to a temp
//! file in the destination directory and renamed into place, so readers never
//! see a truncated artifact. If the second write fails, the first file is
//! removed again.

use crate::browser::{CaptureFormat, CapturedImage};
use crate::error::{Result, WriteError};
use crate::extraction::PageSnapshot;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Destination paths for one artifact set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Structure JSON path
    pub structure: PathBuf,
    /// Image path (structure path with the image extension)
    pub image: PathBuf,
}

impl ArtifactPaths {
    /// Paths for `base`.
    ///
    /// A base already ending in `.json` is used as-is for the structure;
    /// otherwise `.json` is appended.
    pub fn for_base(base: &Path, format: CaptureFormat) -> Self {
        let structure = if base.extension().map_or(false, |e| e == "json") {
            base.to_path_buf()
        } else {
            let mut name = base.as_os_str().to_os_string();
            name.push(".json");
            PathBuf::from(name)
        };
        let image = structure.with_extension(format.extension());
        Self { structure, image }
    }
}

/// Files written for one snapshot
#[derive(Debug, Clone)]
pub struct CaptureArtifacts {
    /// Structure JSON path
    pub structure_path: PathBuf,
    /// Image path
    pub image_path: PathBuf,
    /// Bytes written to the structure file
    pub structure_bytes: usize,
    /// Bytes written to the image file
    pub image_bytes: usize,
}

/// Writes artifact sets under a fixed output directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Writer confined to `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Output directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `base` inside the output directory.
    ///
    /// Relative bases are joined onto the root; absolute bases must already
    /// lie under it. Any `..` component is rejected outright, and so is a
    /// base that ends in a separator or `.`, since both artifacts are named
    /// after its final segment.
    pub fn resolve(&self, base: &Path) -> std::result::Result<PathBuf, WriteError> {
        if base.as_os_str().is_empty()
            || base
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(WriteError::OutsideOutputDir(base.to_path_buf()));
        }
        if !names_file(base) {
            return Err(WriteError::InvalidBase(base.to_path_buf()));
        }

        let resolved = if base.is_absolute() {
            base.to_path_buf()
        } else {
            self.root.join(base)
        };

        if !resolved.starts_with(&self.root) || resolved == self.root {
            return Err(WriteError::OutsideOutputDir(base.to_path_buf()));
        }
        Ok(resolved)
    }

    /// Paths that [`ArtifactWriter::write`] would produce for `base`
    pub fn paths_for(
        &self,
        base: &Path,
        format: CaptureFormat,
    ) -> std::result::Result<ArtifactPaths, WriteError> {
        Ok(ArtifactPaths::for_base(&self.resolve(base)?, format))
    }

    /// Persist the snapshot and its image as a pair
    #[instrument(skip(self, snapshot, image), fields(base = %base.display()))]
    pub fn write(
        &self,
        base: &Path,
        snapshot: &PageSnapshot,
        image: &CapturedImage,
    ) -> Result<CaptureArtifacts> {
        let paths = self.paths_for(base, image.format)?;
        let structure = snapshot
            .to_json_pretty()
            .map_err(|e| WriteError::Serialize(e.to_string()))?;

        if let Some(parent) = paths.structure.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        write_atomic(&paths.structure, &structure)?;
        if let Err(e) = write_atomic(&paths.image, &image.data) {
            warn!("Image write failed, removing {}", paths.structure.display());
            if let Err(rm) = std::fs::remove_file(&paths.structure) {
                warn!("Could not remove {}: {}", paths.structure.display(), rm);
            }
            return Err(e.into());
        }

        info!(
            "Wrote {} ({} bytes) and {} ({} bytes)",
            paths.structure.display(),
            structure.len(),
            paths.image.display(),
            image.data.len()
        );

        Ok(CaptureArtifacts {
            structure_path: paths.structure,
            image_path: paths.image,
            structure_bytes: structure.len(),
            image_bytes: image.data.len(),
        })
    }
}

/// Whether the last written segment of `base` is its file name
fn names_file(base: &Path) -> bool {
    let raw = base.as_os_str().to_string_lossy();
    let last = raw.rsplit(std::path::is_separator).next().unwrap_or_default();
    matches!(base.file_name(), Some(name) if name.to_string_lossy() == last)
}

/// Write `bytes` to `path` via a temp file in the same directory and rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::result::Result<(), WriteError> {
    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Persisted {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
