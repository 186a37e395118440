//! File-change tracking and rollback.
//!
//! Grounded on `safe_shell.py`'s `FileTracker`.

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

struct Snapshot {
    existed: bool,
    content: Option<Vec<u8>>,
    hash: Option<String>,
    mode: Option<u32>,
}

#[derive(Default)]
pub struct FileTracker {
    snapshots: HashMap<PathBuf, Snapshot>,
}

fn hash_of(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

impl FileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_file(&mut self, path: &Path) {
        let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let snapshot = match fs::read(&abs) {
            Ok(content) => {
                let mode = fs::metadata(&abs).ok().map(|m| m.permissions().mode());
                Snapshot {
                    existed: true,
                    hash: Some(hash_of(&content)),
                    content: Some(content),
                    mode,
                }
            }
            Err(_) => Snapshot { existed: false, content: None, hash: None, mode: None },
        };
        self.snapshots.insert(abs, snapshot);
    }

    /// Snapshots every regular file under `dir`, recursively.
    pub fn snapshot_directory(&mut self, dir: &Path) {
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let Ok(entries) = fs::read_dir(&current) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.is_file() {
                    self.snapshot_file(&path);
                }
            }
        }
    }

    /// Paths created, modified, or deleted since the last snapshot.
    pub fn get_modified_files(&self) -> Vec<String> {
        let mut modified = Vec::new();
        for (path, snapshot) in &self.snapshots {
            if snapshot.existed {
                match fs::read(path) {
                    Ok(current) => {
                        if Some(hash_of(&current)) != snapshot.hash {
                            modified.push(path.display().to_string());
                        }
                    }
                    Err(_) => modified.push(path.display().to_string()),
                }
            } else if path.exists() {
                modified.push(path.display().to_string());
            }
        }
        modified
    }

    /// Restores every tracked file to its snapshot state.
    pub fn rollback(&self) -> Vec<String> {
        let mut rolled_back = Vec::new();
        for (path, snapshot) in &self.snapshots {
            let result = if snapshot.existed {
                snapshot
                    .content
                    .as_ref()
                    .map(|content| fs::write(path, content))
                    .unwrap_or(Ok(()))
                    .and_then(|_| match snapshot.mode {
                        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
                        None => Ok(()),
                    })
            } else if path.exists() {
                fs::remove_file(path)
            } else {
                Ok(())
            };
            if result.is_ok() {
                rolled_back.push(path.display().to_string());
            }
        }
        rolled_back
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmodified_file_is_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        let mut tracker = FileTracker::new();
        tracker.snapshot_file(&file);
        assert!(tracker.get_modified_files().is_empty());
    }

    #[test]
    fn modified_file_is_reported_and_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        let mut tracker = FileTracker::new();
        tracker.snapshot_file(&file);
        fs::write(&file, b"changed").unwrap();

        assert_eq!(tracker.get_modified_files().len(), 1);
        tracker.rollback();
        assert_eq!(fs::read(&file).unwrap(), b"hello");
    }

    #[test]
    fn created_file_rolled_back_by_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.txt");

        let mut tracker = FileTracker::new();
        tracker.snapshot_file(&file);
        fs::write(&file, b"surprise").unwrap();

        assert_eq!(tracker.get_modified_files().len(), 1);
        tracker.rollback();
        assert!(!file.exists());
    }

    #[test]
    fn rollback_restores_file_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.sh");
        fs::write(&file, b"hello").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let mut tracker = FileTracker::new();
        tracker.snapshot_file(&file);
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();

        tracker.rollback();
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn snapshot_directory_covers_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.txt"), b"nested").unwrap();

        let mut tracker = FileTracker::new();
        tracker.snapshot_directory(dir.path());
        fs::write(nested.join("b.txt"), b"changed").unwrap();

        assert_eq!(tracker.get_modified_files().len(), 1);
    }
}
