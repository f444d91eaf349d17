//! Resolution of opaque asset ids to playable files.

use crate::error::{VoiceError, VoiceResult};
use std::path::{Path, PathBuf};

/// Directory of audio clips. Asset ids are paths relative to `root`;
/// absolute ids are taken as-is.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
}

impl AssetLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `asset` to an existing file.
    pub fn resolve(&self, asset: &str) -> VoiceResult<PathBuf> {
        let asset = asset.trim();
        if asset.is_empty() {
            return Err(VoiceError::AssetNotFound("<empty>".to_string()));
        }
        let candidate = Path::new(asset);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        if path.is_file() {
            Ok(path)
        } else {
            Err(VoiceError::AssetNotFound(path.display().to_string()))
        }
    }
}
