use std::{
    fs, io,
    path::{Path, PathBuf},
};

use cookiepress_api_types::ARCHIVE_FILENAME;
use tempfile::TempDir;

const PREFIX: &str = "w_";
const DOWNLOAD_FILE: &str = "template.zip";
const TEMPLATE_DIR: &str = "template";
const OUTPUT_DIR: &str = "output";

/// Scratch directory owned by a single generation.
///
/// Removed when dropped, whichever way the generation ends.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir_in(root)?;
        fs::create_dir(dir.path().join(TEMPLATE_DIR))?;
        fs::create_dir(dir.path().join(OUTPUT_DIR))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn download_path(&self) -> PathBuf {
        self.path().join(DOWNLOAD_FILE)
    }

    pub fn template_dir(&self) -> PathBuf {
        self.path().join(TEMPLATE_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join(OUTPUT_DIR)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.path().join(ARCHIVE_FILENAME)
    }

    /// Remove the workspace now, reporting failures instead of ignoring them.
    pub fn cleanup(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Entries directly under `dir`, sorted for stable error reporting.
pub(crate) fn top_level_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}
