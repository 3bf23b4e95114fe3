//! Directory-backed blob store: one file per blob, file name is the key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::StoreError;

use super::BlobStore;

/// [`BlobStore`] persisting each blob as a file under one directory.
///
/// Keys must be valid file names; the keys the durable store generates are.
/// Files written by other subsystems into the same directory simply show up
/// as foreign blobs, which the durable store tolerates.
#[derive(Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        fs::write(self.path_for(key), bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        store.put("unit-1", b"payload").unwrap();
        assert_eq!(
            store.get("unit-1").unwrap().as_deref(),
            Some(&b"payload"[..])
        );

        // A second store over the same directory sees the blob.
        let reopened = FileBlobStore::new(dir.path()).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["unit-1".to_string()]);

        reopened.remove("unit-1").unwrap();
        assert!(store.get("unit-1").unwrap().is_none());
        reopened.remove("unit-1").unwrap();
    }

    #[test]
    fn test_missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        assert!(store.get("absent").unwrap().is_none());
        assert!(store.keys().unwrap().is_empty());
    }
}
