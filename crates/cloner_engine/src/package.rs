use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::workspace::{PersistError, Workspace};

pub const MANIFEST_FILENAME: &str = "info.json";

/// Summary of one run, stored as `info.json` at the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub cloned_from: String,
    pub timestamp_utc: String,
    pub total_files_downloaded: usize,
    pub downloaded_bytes: u64,
    pub zip_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub archive_path: PathBuf,
    pub entries: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("path {0} is not inside the workspace")]
    OutsideWorkspace(String),
}

pub fn write_manifest(workspace: &Workspace, manifest: &Manifest) -> Result<PathBuf, PersistError> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|err| PersistError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    workspace.write_file(MANIFEST_FILENAME, json.as_bytes())
}

/// Zip every file below `workspace_root` into `archive_path`, entry names
/// relative to the root with `/` separators.
///
/// A partially written archive is removed on failure.
pub fn package(workspace_root: &Path, archive_path: &Path) -> Result<PackageSummary, PackageError> {
    match write_archive(workspace_root, archive_path) {
        Ok(entries) => Ok(PackageSummary {
            archive_path: archive_path.to_path_buf(),
            entries,
        }),
        Err(err) => {
            let _ = fs::remove_file(archive_path);
            Err(err)
        }
    }
}

fn write_archive(workspace_root: &Path, archive_path: &Path) -> Result<Vec<String>, PackageError> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::new();
    for entry in WalkDir::new(workspace_root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(workspace_root, entry.path())?;
        writer.start_file(name.as_str(), options)?;
        let mut file = File::open(entry.path())?;
        io::copy(&mut file, &mut writer)?;
        entries.push(name);
    }
    writer.finish()?;
    Ok(entries)
}

fn entry_name(root: &Path, path: &Path) -> Result<String, PackageError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PackageError::OutsideWorkspace(path.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
