//! Configuration for a patch run

use crate::{PatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How replacement payloads are placed in a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Write past the current end of file; stale bytes are never reclaimed
    #[default]
    Append,
    /// Overwrite at the original offset, shifting the tail by the size change
    InPlace,
}

/// Configuration for a patch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Payload placement strategy
    pub placement: PlacementStrategy,

    /// Compress replacement textures through the codec
    pub compress_textures: bool,

    /// Patch containers on parallel threads
    pub multithreading: bool,

    /// Emit duplicate-skip and other low-value lines
    pub verbose: bool,

    /// Shared library providing the native codec
    pub codec_library: Option<PathBuf>,

    /// Scratch buffer size for tail shifts (one filesystem cluster)
    pub copy_chunk_size: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            placement: PlacementStrategy::Append,
            compress_textures: false,
            multithreading: true,
            verbose: false,
            codec_library: None,
            copy_chunk_size: 4096,
        }
    }
}

impl PatchConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| PatchError::Config(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the patcher cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.copy_chunk_size == 0 {
            return Err(PatchError::Config("copy_chunk_size must be non-zero".into()));
        }
        Ok(())
    }

    /// Set the placement strategy
    #[must_use]
    pub const fn with_placement(mut self, placement: PlacementStrategy) -> Self {
        self.placement = placement;
        self
    }

    /// Enable or disable texture compression
    #[must_use]
    pub const fn with_texture_compression(mut self, enable: bool) -> Self {
        self.compress_textures = enable;
        self
    }

    /// Enable or disable parallel workers
    #[must_use]
    pub const fn with_multithreading(mut self, enable: bool) -> Self {
        self.multithreading = enable;
        self
    }

    /// Enable or disable verbose lines
    #[must_use]
    pub const fn with_verbose(mut self, enable: bool) -> Self {
        self.verbose = enable;
        self
    }

    /// Set the native codec library path
    #[must_use]
    pub fn with_codec_library<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.codec_library = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the tail-shift scratch buffer size
    #[must_use]
    pub const fn with_copy_chunk_size(mut self, size: usize) -> Self {
        self.copy_chunk_size = size;
        self
    }
}
