use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FileError, FileResult};

/// Mode of every committed store file: owner read/write only.
pub const FILE_MODE: u32 = 0o600;

/// Whole-file replacement over one path.
///
/// A write goes to a temporary file in the same directory, is fsynced, and is
/// then renamed over the target. Readers see either the previous content or
/// the new content, never a mixture. If anything fails before the rename the
/// temporary file is removed and the target is left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the whole file. Returns `Ok(None)` if it does not exist.
    pub fn read_fully(&self) -> FileResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FileError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Atomically replace the file content with `data`.
    pub fn write(&self, data: &[u8]) -> FileResult<()> {
        self.write_with(|file| file.write_all(data))
    }

    /// Atomically replace the file content with whatever `fill` writes.
    ///
    /// `fill` receives the temporary file. An error from `fill` aborts the
    /// replace and leaves the committed content as it was.
    pub fn write_with<F>(&self, fill: F) -> FileResult<()>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        let write_err = |source: io::Error| FileError::Write {
            path: self.path.clone(),
            source,
        };
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| FileError::InvalidPath(self.path.clone()))?
            .to_string_lossy()
            .into_owned();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;

        set_owner_only(tmp.as_file()).map_err(write_err)?;
        fill(tmp.as_file_mut()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        // The rename is done; a failed directory sync only weakens durability.
        if let Err(e) = sync_dir(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to sync store directory");
        }
        debug!(path = %self.path.display(), "atomic replace committed");
        Ok(())
    }
}

#[cfg(unix)]
fn set_owner_only(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
fn set_owner_only(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn absent_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = AtomicFile::new(dir.path().join("missing.xml"));
        assert!(!file.exists());
        assert_eq!(file.read_fully().unwrap(), None);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = AtomicFile::new(dir.path().join("store.xml"));
        file.write(b"first").unwrap();
        assert!(file.exists());
        assert_eq!(file.read_fully().unwrap().unwrap(), b"first");

        file.write(b"second, longer content").unwrap();
        assert_eq!(file.read_fully().unwrap().unwrap(), b"second, longer content");
        assert_eq!(entries(dir.path()), vec!["store.xml".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn committed_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = AtomicFile::new(dir.path().join("store.xml"));
        file.write(b"data").unwrap();
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, FILE_MODE);
    }

    #[test]
    fn failed_fill_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = AtomicFile::new(dir.path().join("store.xml"));
        file.write(b"committed").unwrap();

        let err = file
            .write_with(|f| {
                f.write_all(b"half of the new")?;
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            })
            .unwrap_err();
        assert!(matches!(err, FileError::Write { .. }));
        assert_eq!(file.read_fully().unwrap().unwrap(), b"committed");
        assert_eq!(entries(dir.path()), vec!["store.xml".to_string()]);
    }

    #[test]
    fn missing_directory_fails_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = AtomicFile::new(dir.path().join("no").join("such").join("store.xml"));
        assert!(matches!(file.write(b"x").unwrap_err(), FileError::Write { .. }));
        assert!(!file.exists());
    }

    #[test]
    fn read_error_other_than_absence_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let file = AtomicFile::new(dir.path());
        assert!(matches!(file.read_fully().unwrap_err(), FileError::Read { .. }));
    }
}
