use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::debug;

use crate::error::MarkerError;
use crate::fs_util;
use crate::retry::RetryPolicy;

pub trait RemoteStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, MarkerError>;
    fn get(&self, key: &str, destination: &Path) -> Result<(), MarkerError>;
    fn put(&self, source: &Path, key: &str) -> Result<(), MarkerError>;
    /// Deletes `key`; deleting an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), MarkerError>;

    /// Publishes the object that marks an item as complete. Readers never
    /// observe a partially written marker.
    fn commit(&self, source: &Path, key: &str) -> Result<(), MarkerError> {
        self.put(source, key)
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: Utf8PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> Result<Utf8PathBuf, MarkerError> {
        let relative = Utf8Path::new(key);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|part| matches!(part, camino::Utf8Component::ParentDir));
        if key.is_empty() || escapes {
            return Err(MarkerError::Filesystem(format!("invalid store key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    fn copy_file_atomic(source: &Path, dest: &Utf8Path) -> Result<(), MarkerError> {
        let parent = dest
            .parent()
            .ok_or_else(|| MarkerError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path()).map_err(|err| remote_io("put", dest, err))?;
        let temp = Builder::new()
            .prefix(".marker-genes-put")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| remote_io("put", dest, err))?;
        fs::copy(source, temp.path()).map_err(|err| remote_io("put", dest, err))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| remote_io("put", dest, err.error))?;
        Ok(())
    }
}

impl RemoteStore for LocalStore {
    fn exists(&self, key: &str) -> Result<bool, MarkerError> {
        let path = self.path_for(key)?;
        match fs::metadata(path.as_std_path()) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(remote_io("exists", &path, err)),
        }
    }

    fn get(&self, key: &str, destination: &Path) -> Result<(), MarkerError> {
        let path = self.path_for(key)?;
        match fs::copy(path.as_std_path(), destination) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(MarkerError::RemoteNotFound(key.to_string()))
            }
            Err(err) => Err(remote_io("get", &path, err)),
        }
    }

    fn put(&self, source: &Path, key: &str) -> Result<(), MarkerError> {
        let path = self.path_for(key)?;
        Self::copy_file_atomic(source, &path)
    }

    fn remove(&self, key: &str) -> Result<(), MarkerError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(remote_io("remove", &path, err)),
        }
    }
}

fn remote_io(op: &'static str, path: &Utf8Path, err: io::Error) -> MarkerError {
    MarkerError::Remote {
        op,
        key: path.to_string(),
        message: err.to_string(),
    }
}

pub fn download(
    store: &dyn RemoteStore,
    retry: &RetryPolicy,
    key: &str,
    dir: &Utf8Path,
) -> Result<Utf8PathBuf, MarkerError> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let raw_path = dir.join(file_name);
    retry.run(&format!("download {key}"), || {
        store.get(key, raw_path.as_std_path())
    })?;

    let Some(plain_name) = file_name.strip_suffix(".gz") else {
        debug!(key, path = %raw_path, "downloaded");
        return Ok(raw_path);
    };
    let plain_path = dir.join(plain_name);
    fs_util::gunzip_file(raw_path.as_std_path(), plain_path.as_std_path())?;
    fs::remove_file(raw_path.as_std_path())
        .map_err(|err| MarkerError::Filesystem(err.to_string()))?;
    debug!(key, path = %plain_path, "downloaded and decompressed");
    Ok(plain_path)
}

pub fn upload(
    store: &dyn RemoteStore,
    retry: &RetryPolicy,
    source: &Utf8Path,
    key: &str,
    commit: bool,
) -> Result<(), MarkerError> {
    let staged;
    let payload: &Path = if key.ends_with(".gz") {
        let parent = source.parent().unwrap_or(Utf8Path::new("."));
        staged = Builder::new()
            .prefix(".marker-genes-gz")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| MarkerError::Filesystem(err.to_string()))?;
        fs_util::gzip_file(source.as_std_path(), staged.path())?;
        staged.path()
    } else {
        source.as_std_path()
    };

    retry.run(&format!("upload {key}"), || {
        if commit {
            store.commit(payload, key)
        } else {
            store.put(payload, key)
        }
    })?;
    debug!(key, source = %source, commit, "uploaded");
    Ok(())
}
