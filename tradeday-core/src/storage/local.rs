//! Local directory store.
//!
//! Writes are atomic per file: write to `.tmp`, then rename into place.

use super::{DayStore, StoreError, StoredObject};
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalStore {
    dir: PathBuf,
    prefix: String,
}

impl LocalStore {
    /// Open an existing directory. Nothing is created.
    pub fn open(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dir.into();
        Self::check_dir(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
        })
    }

    /// `InvalidLocalPath` unless `dir` is an existing directory.
    pub fn check_dir(dir: &Path) -> Result<(), StoreError> {
        if dir.is_dir() {
            Ok(())
        } else {
            Err(StoreError::InvalidLocalPath {
                path: dir.to_path_buf(),
            })
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl DayStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(Self::io_err(&self.dir))?;

        let mut objects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Self::io_err(&self.dir))?;
            let metadata = entry.metadata().map_err(Self::io_err(&entry.path()))?;
            // Only regular files; subdirectories are never records.
            if !metadata.is_file() {
                continue;
            }
            objects.push(StoredObject {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: Some(metadata.len()),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn put_object(
        &self,
        name: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StoreError> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));

        fs::write(&tmp_path, bytes).map_err(Self::io_err(&tmp_path))?;

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io {
                path: path.clone(),
                source,
            }
        })?;

        Ok(path.display().to_string())
    }
}
