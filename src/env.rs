//! Operating-system abstraction for the directory-level work the engine does:
//! creating and listing the database directory, removing and renaming files,
//! and taking the exclusive LOCK.
//!
//! Table and log contents are read and written directly through `std::fs`.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::error::{Error, Result};

pub trait Env: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    /// File names (not paths) in `dir`.
    fn children(&self, dir: &Path) -> Result<Vec<String>>;

    fn create_dir_all(&self, dir: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn remove_dir(&self, dir: &Path) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Take the lock at `path`, creating the file if needed. Fails if the
    /// lock is already held in this process. Released when the returned
    /// guard drops.
    fn lock_file(&self, path: &Path) -> Result<FileLock>;
}

/// Paths locked by this process.
static LOCKED_FILES: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Guard for a held LOCK file.
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        LOCKED_FILES.lock().remove(&self.path);
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock").field("path", &self.path).finish()
    }
}

/// `Env` backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEnv;

impl Env for DefaultEnv {
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn children(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn remove_dir(&self, dir: &Path) -> Result<()> {
        fs::remove_dir(dir)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)?;
        Ok(())
    }

    fn lock_file(&self, path: &Path) -> Result<FileLock> {
        let key = std::path::absolute(path)?;
        let mut locked = LOCKED_FILES.lock();
        if locked.contains(&key) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("lock {}: already held by process", path.display()),
            )));
        }
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        locked.insert(key.clone());
        Ok(FileLock { path: key })
    }
}

/// Shared handle to the default environment.
pub fn default_env() -> Arc<dyn Env> {
    Arc::new(DefaultEnv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LOCK");
        let env = DefaultEnv;

        let guard = env.lock_file(&path).unwrap();
        assert!(env.lock_file(&path).is_err());
        drop(guard);
        assert!(env.lock_file(&path).is_ok());
    }

    #[test]
    fn children_lists_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), b"x").unwrap();
        fs::write(dir.path().join("b.sst"), b"y").unwrap();
        let mut names = DefaultEnv.children(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.log".to_string(), "b.sst".to_string()]);
    }
}
