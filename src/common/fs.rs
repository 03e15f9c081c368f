use std::{fs::File, io::Write, path::{Path, PathBuf}, time::{Duration, SystemTime}};

use anyhow::{Context, Result, bail};
use tempfile::NamedTempFile;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Age of a file, measured from its last modification time.
/// Returns `None` if the file does not exist or its mtime is unavailable.
pub(crate) fn file_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    // A clock that moved backwards makes the file look brand new.
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// Write-then-rename wrapper so readers never observe a partially written file.
pub(crate) struct PendingWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl PendingWrite {
    /// Open a temp file next to `target`, creating the parent directory if needed.
    pub(crate) fn open(target: &Path) -> Result<Self> {
        let parent = target.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        ensure_dir_exists(parent)?;

        let tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;

        Ok(Self { target: target.to_path_buf(), tmp })
    }

    /// Flush, fsync (best effort) and atomically move the temp file into place.
    pub(crate) fn finalize(mut self) -> Result<()> {
        self.tmp.flush()
            .with_context(|| format!("flush {}", self.target.display()))?;
        self.tmp.as_file().sync_all().ok();
        self.tmp.persist(&self.target)
            .with_context(|| format!("rename to {}", self.target.display()))?;
        if let Some(dir) = self.target.parent() {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.tmp.flush()
    }
}

/// Atomically replace `path` with `bytes`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut sink = PendingWrite::open(path)?;
    sink.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    sink.finalize()
}
