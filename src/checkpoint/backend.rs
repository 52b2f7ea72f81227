//! Key-value storage backends for checkpoints
//!
//! Keys are `/`-separated relative paths such as `stage-1/best.json`.
//! A `write` is atomic: concurrent readers observe either the previous value
//! or the new one, never a partial write.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::{Error, Result};

const TEMP_SUFFIX: &str = ".tmp";

/// Trait for checkpoint storage backends
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Atomically store `bytes` under `key`, replacing any previous value
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the value under `key`; `None` when absent
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Backend type name
    fn backend_type(&self) -> &'static str;
}

fn storage_error(key: &str, source: io::Error) -> Error {
    Error::Storage {
        key: key.to_string(),
        source,
    }
}

fn lock_error(key: &str, e: impl std::fmt::Display) -> Error {
    storage_error(key, io::Error::other(format!("lock poisoned: {e}")))
}

/// Local filesystem backend
///
/// Uses write-to-temp + rename for atomicity.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    temp_seq: AtomicU64,
}

impl FsBackend {
    /// Create a backend rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| storage_error(&root.display().to_string(), e))?;
        Ok(Self {
            root,
            temp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn collect_keys(&self, dir: &Path, prefix: &str, keys: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            if entry.file_type()?.is_dir() {
                self.collect_keys(&entry.path(), &key, keys)?;
            } else if !name.ends_with(TEMP_SUFFIX) {
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error(key, e))?;
        }

        // Unique temp name so concurrent writers never share a temp file
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path =
            path.with_file_name(format!(".{file_name}.{}.{seq}{TEMP_SUFFIX}", std::process::id()));

        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(storage_error(key, e));
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.key_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(key, e)),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(key, e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, "", &mut keys)
            .map_err(|e| storage_error(prefix, e))?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn backend_type(&self) -> &'static str {
        "fs"
    }
}

/// In-memory backend for testing
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.data
            .write()
            .map_err(|e| lock_error(key, e))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .read()
            .map_err(|e| lock_error(key, e))?
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.write().map_err(|e| lock_error(key, e))?.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .data
            .read()
            .map_err(|e| lock_error(prefix, e))?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(backend: &dyn StorageBackend) {
        assert_eq!(backend.read("stage-1/best.json").unwrap(), None);

        backend.write("stage-1/best.json", b"one").unwrap();
        backend.write("stage-1/ckpt-a.bin", b"payload").unwrap();
        backend.write("stage-2/best.json", b"two").unwrap();
        backend.write("latest.json", b"{}").unwrap();

        assert_eq!(backend.read("stage-1/best.json").unwrap(), Some(b"one".to_vec()));

        backend.write("stage-1/best.json", b"uno").unwrap();
        assert_eq!(backend.read("stage-1/best.json").unwrap(), Some(b"uno".to_vec()));

        assert_eq!(
            backend.list("stage-1/").unwrap(),
            vec!["stage-1/best.json".to_string(), "stage-1/ckpt-a.bin".to_string()]
        );
        assert_eq!(backend.list("").unwrap().len(), 4);

        backend.remove("stage-1/ckpt-a.bin").unwrap();
        backend.remove("stage-1/ckpt-a.bin").unwrap();
        assert_eq!(backend.read("stage-1/ckpt-a.bin").unwrap(), None);
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        exercise(&backend);
        assert_eq!(backend.backend_type(), "memory");
    }

    #[test]
    fn test_fs_backend() {
        let tmp = TempDir::new().unwrap();
        let backend = FsBackend::new(tmp.path().join("ckpt")).unwrap();
        exercise(&backend);
        assert_eq!(backend.backend_type(), "fs");
        assert!(backend.root().join("stage-2").join("best.json").exists());
    }

    #[test]
    fn test_fs_backend_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let backend = FsBackend::new(tmp.path()).unwrap();
        for i in 0..5 {
            backend.write("stage-0/best.json", format!("{i}").as_bytes()).unwrap();
        }
        let names: Vec<_> = fs::read_dir(tmp.path().join("stage-0"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["best.json".to_string()]);
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_writes() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(FsBackend::new(tmp.path()).unwrap());
        let a = vec![b'a'; 64 * 1024];
        let b = vec![b'b'; 64 * 1024];
        backend.write("stage-0/payload.bin", &a).unwrap();

        let writer = {
            let backend = Arc::clone(&backend);
            let (a, b) = (a.clone(), b.clone());
            std::thread::spawn(move || {
                for i in 0..50 {
                    let bytes = if i % 2 == 0 { &b } else { &a };
                    backend.write("stage-0/payload.bin", bytes).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let read = backend.read("stage-0/payload.bin").unwrap().unwrap();
            assert!(read == a || read == b, "partial read of {} bytes", read.len());
        }
        writer.join().unwrap();
    }
}
