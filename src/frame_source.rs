//! Ordered frame locators for the active dataset.
//!
//! A `FrameSource` is immutable once built. Replacing it on a session
//! invalidates every cached bitmap and every decode that is still in flight.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"];

/// Check if a filename has a supported image extension.
pub fn is_image_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Position of a frame within the active sequence.
pub type FrameIndex = usize;

/// Errors that can occur while building a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// I/O error while listing the folder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The given path is not a directory
    #[error("Not a directory: {path:?}")]
    NotADirectory {
        /// Offending path
        path: PathBuf,
    },

    /// The folder contains no image frames
    #[error("No image frames found in {path:?}")]
    Empty {
        /// Folder that was listed
        path: PathBuf,
    },
}

/// An ordered, immutable list of frame locators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSource {
    name: String,
    locators: Vec<String>,
}

impl FrameSource {
    /// Create a frame source from a name and an ordered list of locators.
    pub fn new(name: impl Into<String>, locators: Vec<String>) -> Self {
        Self {
            name: name.into(),
            locators,
        }
    }

    /// An empty source; sessions start out bound to this.
    pub fn empty() -> Self {
        Self::default()
    }

    /// List the image files of a folder, sorted by filename.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_folder(folder: &Path) -> Result<Self, SourceError> {
        if !folder.is_dir() {
            return Err(SourceError::NotADirectory {
                path: folder.to_path_buf(),
            });
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(is_image_file)
            })
            .collect();

        if paths.is_empty() {
            return Err(SourceError::Empty {
                path: folder.to_path_buf(),
            });
        }

        paths.sort();

        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let locators = paths
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        Ok(Self::new(name, locators))
    }

    /// Dataset name (folder name for folder sources).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    /// Check if the source has no frames.
    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// Locator of the frame at `index`, if in range.
    pub fn locator(&self, index: FrameIndex) -> Option<&str> {
        self.locators.get(index).map(String::as_str)
    }

    /// Index of the last frame, if any.
    pub fn last_index(&self) -> Option<FrameIndex> {
        self.locators.len().checked_sub(1)
    }
}
