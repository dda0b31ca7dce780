//! File helpers for JSON storages.

use super::{JsonStorage, StorageError, StorageResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn temp_path_for(path: &Path) -> StorageResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| StorageError::Io(format!("Invalid file name: {}", path.display())))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(name);
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

/// Write `contents` to `path` through a sibling temporary file and a rename.
///
/// On failure the target is either untouched or absent, never half-written.
pub fn write_file_atomic(path: &Path, contents: &str) -> StorageResult<()> {
    let temp = temp_path_for(path)?;
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    result.map_err(|e| {
        remove_file_quietly(&temp);
        StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Read and parse a JSON storage file.
pub fn read_json_file(path: &Path) -> StorageResult<JsonStorage> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    let text = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    JsonStorage::from_json(&text)
}

pub fn remove_file_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn test_atomic_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.vg");

        let mut s = JsonStorage::new();
        s.write_int("answer", 42);
        write_file_atomic(&path, &s.to_json(true).unwrap()).unwrap();

        let mut r = read_json_file(&path).unwrap();
        assert_eq!(r.read_int("answer", 0), 42);
        assert!(!temp_path_for(&path).unwrap().exists());
    }

    #[test]
    fn test_write_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("doc.vg");
        assert!(matches!(
            write_file_atomic(&path, "{}"),
            Err(StorageError::Io(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_json_file(&dir.path().join("absent.vg")),
            Err(StorageError::NotFound(_))
        ));
    }
}
