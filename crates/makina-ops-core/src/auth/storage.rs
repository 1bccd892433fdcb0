//! Durable storage backends for the persisted session snapshot.
//!
//! A backend holds a single serialized value under one key. Callers treat
//! every operation as best-effort; errors are reported so they can be logged
//! but the session store never propagates them.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

/// Service name used for OS keychain entries
const KEYRING_SERVICE: &str = "makina-ops";

pub trait SessionStorage: Send + Sync {
    /// Read the stored value, `None` if nothing is stored
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored value
    fn write(&self, contents: &str) -> Result<()>;

    /// Remove the stored value. Removing a missing value is not an error.
    fn remove(&self) -> Result<()>;
}

/// Session snapshot kept as a JSON file on disk
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        Ok(Some(contents))
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create session directory")?;
        }
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Session snapshot kept in the OS keychain
pub struct KeyringStorage {
    key: String,
}

impl KeyringStorage {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, &self.key).context("Failed to create keyring entry")
    }
}

impl SessionStorage for KeyringStorage {
    fn read(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(contents) => Ok(Some(contents)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        self.entry()?
            .set_password(contents)
            .context("Failed to store session in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}

/// Process-local storage. Nothing survives a restart; used for one-off
/// invocations and tests.
#[derive(Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw value
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        *self.slot() = Some(contents.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

impl<S: SessionStorage + ?Sized> SessionStorage for Box<S> {
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> Result<()> {
        (**self).write(contents)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }
}

impl<S: SessionStorage + ?Sized> SessionStorage for std::sync::Arc<S> {
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> Result<()> {
        (**self).write(contents)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("session.json"));

        assert_eq!(storage.read().unwrap(), None);

        storage.write("{\"a\":1}").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some("{\"a\":1}"));

        storage.remove().unwrap();
        assert!(!storage.path().exists());
        // Second remove is a no-op
        storage.remove().unwrap();
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_contents("x");
        assert_eq!(storage.read().unwrap().as_deref(), Some("x"));
        storage.remove().unwrap();
        assert_eq!(storage.read().unwrap(), None);
    }
}
