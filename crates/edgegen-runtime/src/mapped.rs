//! Memory-mapped model file.
//!
//! The model is mapped read-only into the process address space and stays
//! mapped for as long as the port that owns it is alive.

use std::fs::File;
use std::path::Path;

use edgegen_engine::{EngineError, Result};
use memmap2::Mmap;

/// A memory-mapped file handle. Dropping it unmaps the file.
pub struct MappedFile {
    mmap: Mmap,
    size: usize,
}

impl MappedFile {
    /// Map a file into memory.
    ///
    /// Missing, unreadable and empty files are `ModelLoad` errors.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            EngineError::ModelLoad(format!("failed to open {}: {e}", path.display()))
        })?;

        let metadata = file.metadata().map_err(|e| {
            EngineError::ModelLoad(format!("failed to read metadata for {}: {e}", path.display()))
        })?;

        let size = metadata.len() as usize;
        if size == 0 {
            return Err(EngineError::ModelLoad(format!(
                "model file {} is empty",
                path.display()
            )));
        }

        // Safety: the model file is treated as read-only and is not modified
        // while mapped.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| {
                EngineError::ModelLoad(format!("failed to mmap {}: {e}", path.display()))
            })?
        };

        Ok(MappedFile { mmap, size })
    }

    /// Get the full mapped data as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Total file size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}
