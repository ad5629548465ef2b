// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface used for completion probing and episode
/// discovery.
///
/// Every probe is fallible; callers decide whether an error means "absent"
/// (completion detection) or is reported (discovery).
pub trait FileSystem: Send + Sync + Debug {
    /// Whether `path` exists. Unlike `Path::exists`, permission problems and
    /// other IO failures surface as `Err`.
    fn try_exists(&self, path: &Path) -> Result<bool>;

    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn try_exists(&self, path: &Path) -> Result<bool> {
        fs::exists(path).with_context(|| format!("probing {:?}", path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}
