//! The init script injected into every invocation

use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

const CONTENT: &str = include_str!("../scripts/init.gradle");

/// The bundled init script.
///
/// It reads the cancel marker path from the `shafu.core.cancelFile` system
/// property and aborts before the next task once that file is gone.
pub struct InitScript {
    path: TempPath,
}

impl InitScript {
    pub fn content() -> &'static str {
        CONTENT
    }

    /// Writes a private copy of the script into the system temp directory.
    pub fn install() -> Result<Self> {
        Self::install_in(std::env::temp_dir())
    }

    /// Writes a private copy of the script into `directory`.
    ///
    /// Every call creates a new file under an unpredictable name, readable
    /// only by the current user. An existing file is never opened, so a
    /// planted file or symlink cannot receive the content. The copy is
    /// removed when the returned value is dropped.
    pub fn install_in(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;
        let mut file = tempfile::Builder::new()
            .prefix("shafu-init")
            .suffix(".gradle")
            .tempfile_in(directory)?;
        file.write_all(CONTENT.as_bytes())?;
        file.flush()?;
        let path = file.into_temp_path();
        debug!("Installed init script {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }
}
