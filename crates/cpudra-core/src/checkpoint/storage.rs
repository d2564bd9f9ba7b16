use std::path::{Path, PathBuf};

use crate::common::fsutils::write_atomic;

/// Key-addressed blob storage backing the checkpoint.
///
/// `write` has to replace the blob atomically: a reader never observes a blob
/// that mixes two different writes.
pub trait CheckpointStorage: Send {
    fn read(&self, key: &str) -> std::io::Result<Vec<u8>>;
    fn write(&self, key: &str, data: &[u8]) -> std::io::Result<()>;
    fn list_keys(&self) -> std::io::Result<Vec<String>>;
}

/// Stores every key as a file inside a single directory.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    pub fn open(directory: &Path) -> std::io::Result<Self> {
        if !directory.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", directory.display()),
            ));
        }
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

impl CheckpointStorage for FileStorage {
    fn read(&self, key: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        write_atomic(&self.path(key), data)
    }

    fn list_keys(&self) -> std::io::Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(name.to_string());
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}
