//! File-system primitives shared by the registry and bundle engine.
//!
//! The load-bearing piece is the lock-file write protocol: content is written
//! to `<name>.lock` and published with a rename, so readers observe either
//! the previous complete file or the new complete file, never a torn write.
//! Several lock files may be staged before any of them is committed, which is
//! how the bundle-list publication keeps its three artifacts coherent.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const LOCK_FILE_MODE: u32 = 0o600;

// ---------------------------------------------------------------------------
// Lock files
// ---------------------------------------------------------------------------

/// A staged write, parked at `<target>.lock` until committed.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
}

impl LockFile {
    /// Publish the staged content by renaming the lock file over the target.
    pub fn commit(self) -> Result<()> {
        fs::rename(&self.lock_path, &self.target).map_err(|e| Error::io(&self.target, e))
    }

    /// Discard the staged content.
    pub fn rollback(self) {
        // The lock file may already be gone; nothing useful to do about a
        // failure while abandoning a write.
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// Stage a write of `target` through its `.lock` file.
///
/// Parent directories are created first. If `write` fails, the lock file is
/// removed and the error propagated; otherwise the returned [`LockFile`]
/// holds the staged content until `commit` or `rollback`.
pub fn write_lock_file<F>(target: &Path, write: F) -> Result<LockFile>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    create_leading_dirs(target)?;

    let lock_path = lock_path_for(target);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(LOCK_FILE_MODE);

    let mut file = options
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let lock = LockFile {
        target: target.to_path_buf(),
        lock_path: lock_path.clone(),
    };

    if let Err(e) = write(&mut file).and_then(|()| file.flush()) {
        drop(file);
        lock.rollback();
        return Err(Error::io(&lock_path, e));
    }

    Ok(lock)
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Plain file helpers
// ---------------------------------------------------------------------------

fn create_leading_dirs(filename: &Path) -> Result<()> {
    if let Some(parent) = filename.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

pub fn file_exists(filename: &Path) -> Result<bool> {
    match fs::metadata(filename) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(filename, e)),
    }
}

/// Write `content` to `filename`, creating parent directories as needed.
pub fn write_file(filename: &Path, content: &[u8]) -> Result<()> {
    create_leading_dirs(filename)?;
    fs::write(filename, content).map_err(|e| Error::io(filename, e))
}

/// Delete a file, reporting whether it existed. A missing file is not an
/// error.
pub fn delete_file(filename: &Path) -> Result<bool> {
    match fs::remove_file(filename) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(filename, e)),
    }
}

/// Read a file as lines. A missing file yields an empty list.
pub fn read_file_lines(filename: &Path) -> Result<Vec<String>> {
    let file = match File::open(filename) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(filename, e)),
    };

    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io(filename, e))
}

// ---------------------------------------------------------------------------
// Recursive directory enumeration
// ---------------------------------------------------------------------------

/// A single entry produced by [`read_dir_recursive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Recurse into `path` up to `depth` levels deep.
///
/// With `strict_depth`, only entries at *exactly* the requested depth are
/// returned (shallower leaves are pruned). Without it, files and empty
/// directories encountered above the target depth are included as well.
///
/// A `depth` of zero or less, or a missing directory, yields an empty list.
pub fn read_dir_recursive(path: &Path, depth: i32, strict_depth: bool) -> Result<Vec<DirEntry>> {
    if depth <= 0 {
        return Ok(Vec::new());
    }

    let reader = match fs::read_dir(path) {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(path, e)),
    };

    let mut entries = Vec::new();
    for item in reader {
        let item = item.map_err(|e| Error::io(path, e))?;
        let file_type = item.file_type().map_err(|e| Error::io(item.path(), e))?;
        entries.push(DirEntry {
            path: item.path(),
            is_dir: file_type.is_dir(),
        });
    }

    if depth == 1 {
        return Ok(entries);
    }

    let mut out = Vec::new();
    for entry in entries {
        if !entry.is_dir {
            if !strict_depth {
                out.push(entry);
            }
            continue;
        }

        let sub_entries = read_dir_recursive(&entry.path, depth - 1, strict_depth)?;
        if !strict_depth && sub_entries.is_empty() {
            out.push(entry);
            continue;
        }
        out.extend(sub_entries);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn commit_publishes_full_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");
        fs::write(&target, b"old").unwrap();

        let lock = write_lock_file(&target, |w| w.write_all(b"new content")).unwrap();

        // Not yet visible.
        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert!(dir.path().join("state.lock").exists());

        lock.commit().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new content");
        assert!(!dir.path().join("state.lock").exists());
    }

    #[test]
    fn rollback_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");
        fs::write(&target, b"old").unwrap();

        let lock = write_lock_file(&target, |w| w.write_all(b"doomed")).unwrap();
        lock.rollback();

        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert!(!dir.path().join("state.lock").exists());
    }

    #[test]
    fn failed_writer_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");

        let result = write_lock_file(&target, |_| {
            Err(std::io::Error::other("writer exploded"))
        });

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(!dir.path().join("state.lock").exists());
    }

    #[test]
    fn lock_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c/state");

        let lock = write_lock_file(&target, |w| w.write_all(b"deep")).unwrap();
        lock.commit().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"deep");
    }

    #[test]
    fn delete_file_missing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        assert!(!delete_file(&path).unwrap());

        fs::write(&path, b"x").unwrap();
        assert!(delete_file(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn read_file_lines_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_file_lines(&dir.path().join("nope")).unwrap().is_empty());

        let path = dir.path().join("lines");
        fs::write(&path, "one\n\ntwo\n").unwrap();
        assert_eq!(
            read_file_lines(&path).unwrap(),
            vec!["one".to_string(), String::new(), "two".to_string()]
        );
    }

    #[test]
    fn read_dir_recursive_depth_zero_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("file"));
        assert!(read_dir_recursive(dir.path(), 0, false).unwrap().is_empty());
    }

    #[test]
    fn read_dir_recursive_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(read_dir_recursive(&missing, 2, true).unwrap().is_empty());
    }

    #[test]
    fn read_dir_recursive_strict_prunes_shallow_entries() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("owner/repo/HEAD"));
        touch(&dir.path().join("stray-file"));
        fs::create_dir_all(dir.path().join("empty-owner")).unwrap();

        let entries = read_dir_recursive(dir.path(), 2, true).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();

        assert_eq!(paths, vec![dir.path().join("owner/repo")]);
    }

    #[test]
    fn read_dir_recursive_lenient_keeps_shallow_entries() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("owner/repo/HEAD"));
        touch(&dir.path().join("stray-file"));
        fs::create_dir_all(dir.path().join("empty-owner")).unwrap();

        let entries = read_dir_recursive(dir.path(), 2, false).unwrap();
        let mut paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        paths.sort();

        let mut expected = vec![
            dir.path().join("empty-owner"),
            dir.path().join("owner/repo"),
            dir.path().join("stray-file"),
        ];
        expected.sort();
        assert_eq!(paths, expected);
    }
}
