use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use thiserror::Error;

/// File name of the rewritten root page inside the workspace.
pub const PAGE_FILENAME: &str = "index.html";

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("refusing to write outside the workspace: {0}")]
    UnsafePath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Identity of one run: `clone_<yyyymmddHHMMSS>_<pid>_<seq>`.
///
/// The process id and a process-wide sequence keep runs started within the
/// same second apart.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "clone_{}_{}_{}",
        now.format("%Y%m%d%H%M%S"),
        std::process::id(),
        seq
    )
}

/// Atomically write content to `{dir}/{relative}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, relative: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let relative_path = checked_relative(relative)?;
        let target = self.dir.join(relative_path);
        let parent = target.parent().unwrap_or(&self.dir).to_path_buf();
        ensure_output_dir(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(content)?;
        tmp.flush()?;

        // Replace existing file if present to keep determinism.
        if target.is_file() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Exclusively owned output directory of one clone run.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    id: String,
}

impl Workspace {
    /// Create `{output_root}/{id}` from scratch, removing any stale directory
    /// with the same identity first.
    pub fn create(output_root: &Path, id: impl Into<String>) -> Result<Self, PersistError> {
        let id = id.into();
        checked_relative(&id)?;
        ensure_output_dir(output_root)?;
        let root = output_root.join(&id);
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root, id })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_path(&self) -> PathBuf {
        self.root.join(PAGE_FILENAME)
    }

    /// Write `content` at a workspace-relative, `/`-separated path, creating
    /// parent directories as needed.
    pub fn write_file(&self, relative: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        AtomicFileWriter::new(self.root.clone()).write(relative, content)
    }
}

fn checked_relative(relative: &str) -> Result<&Path, PersistError> {
    let path = Path::new(relative);
    let all_normal = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if relative.is_empty() || !all_normal {
        return Err(PersistError::UnsafePath(relative.to_string()));
    }
    Ok(path)
}
