use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;
use url::Url;
use zip::{ZipArchive, result::ZipError};

use super::workspace::top_level_entries;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Downloaded template from {url} is not a valid zip archive")]
    Corrupt {
        url: Url,
        #[source]
        source: ZipError,
    },
    #[error("Bad template: ZIP is empty")]
    Empty,
    #[error("expected exactly one top-level entry in the template archive, found {found}")]
    Ambiguous { found: usize },
    #[error("expected the template archive to contain a directory, found file `{name}`")]
    NotADirectory { name: String },
    #[error("Bad template: `{name}` is a symbolic link")]
    Symlink { name: String },
    #[error("failed to extract template at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Unpack `archive` into `destination` and return the template root.
///
/// Entry names that would escape `destination` make the archive invalid, and
/// symbolic links are refused outright.
pub fn extract(archive: &Path, destination: &Path, url: &Url) -> Result<PathBuf, ExtractError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ExtractError::Io { path, source }
    };
    let zip_error = |source: ZipError| match source {
        ZipError::Io(source) => ExtractError::Io {
            path: destination.to_path_buf(),
            source,
        },
        source => ExtractError::Corrupt {
            url: url.clone(),
            source,
        },
    };

    let file = File::open(archive).map_err(io_error(archive))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(zip_error)?;
    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(zip_error)?;
        if entry.unix_mode().is_some_and(is_symlink_mode) {
            return Err(ExtractError::Symlink {
                name: entry.name().to_string(),
            });
        }
    }
    zip.extract(destination).map_err(zip_error)?;

    let entries = top_level_entries(destination).map_err(io_error(destination))?;
    match entries.as_slice() {
        [] => Err(ExtractError::Empty),
        [root] if root.is_dir() => Ok(root.clone()),
        [root] => Err(ExtractError::NotADirectory {
            name: root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }),
        many => Err(ExtractError::Ambiguous { found: many.len() }),
    }
}

fn is_symlink_mode(mode: u32) -> bool {
    mode & 0o170000 == 0o120000
}
