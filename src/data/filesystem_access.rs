//! File/code adapted from https://github.com/jamjamjon/usls
//!
//! Well-known directories used for pipeline output.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub enum FsAccess {
    Home,
    Cache,
    Config,
    Current,
}

impl FsAccess {
    /// Default root for annotated output: `<cwd>/bvr-out`.
    pub fn output_root() -> anyhow::Result<PathBuf> {
        Self::Current.path_with_subs(&["bvr-out"])
    }

    fn base_path(&self) -> anyhow::Result<PathBuf> {
        let base_path = match self {
            FsAccess::Home => dirs::home_dir(),
            FsAccess::Cache => dirs::cache_dir(),
            FsAccess::Config => dirs::config_dir(),
            FsAccess::Current => std::env::current_dir().ok(),
        };

        base_path.ok_or_else(|| anyhow::anyhow!("Could not resolve the {:?} directory on this system", self))
    }

    /// This location with the given subdirectories appended, created if missing.
    ///
    /// Examples:
    /// `FsAccess::Cache.path_with_subs(&["bvr"])` gives `~/.cache/bvr`.
    pub fn path_with_subs(&self, subs: &[&str]) -> anyhow::Result<PathBuf> {
        let mut d = self.base_path()?;
        for sub in subs {
            d.push(sub);
        }
        create_directory(&d)?;
        Ok(d)
    }
}

pub(crate) fn create_directory(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
