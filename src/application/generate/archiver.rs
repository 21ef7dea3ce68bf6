use std::{
    fs::{self, File, Metadata},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::SimpleFileOptions};

use super::workspace::top_level_entries;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Rendering produced no files")]
    Empty,
    #[error("expected exactly one top-level entry in the rendered output, found {found}")]
    Ambiguous { found: usize },
    #[error("failed to walk the rendered project")]
    Walk(#[from] walkdir::Error),
    #[error("failed to write the project archive")]
    Zip(#[from] ZipError),
    #[error("filesystem error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
}

/// Zip the single project under `output_root` into `destination`.
///
/// Member names are relative to `output_root`, so the project folder is the
/// archive's only root entry.
pub fn archive(output_root: &Path, destination: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let roots = top_level_entries(output_root).map_err(io_error(output_root))?;
    let project = match roots.as_slice() {
        [] => return Err(ArchiveError::Empty),
        [project] => project,
        many => return Err(ArchiveError::Ambiguous { found: many.len() }),
    };

    let file = File::create(destination).map_err(io_error(destination))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let mut entries = 0;

    for entry in WalkDir::new(project).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let name = member_name(output_root, path);
        let metadata = entry.metadata()?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(mode(&metadata));

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_symlink() {
            let target = fs::read_link(path).map_err(io_error(path))?;
            writer.add_symlink(name, target.to_string_lossy().into_owned(), options)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = File::open(path).map_err(io_error(path))?;
            io::copy(&mut source, &mut writer).map_err(io_error(path))?;
        }
        entries += 1;
    }

    let mut inner = writer.finish()?;
    inner.flush().map_err(io_error(destination))?;
    drop(inner);

    Ok(ArchiveSummary {
        path: destination.to_path_buf(),
        entries,
    })
}

fn member_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode(metadata: &Metadata) -> u32 {
    if metadata.is_dir() { 0o755 } else { 0o644 }
}
