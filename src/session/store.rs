// Persisted bearer-token slot.
// A single file under the platform data directory, written atomically
// via temp file + rename.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{PlinthError, Result};

/// Filesystem slot holding the bearer token, the only state that
/// survives a process restart.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store at the platform default location
    /// (e.g. ~/.local/share/plinth/token on Linux).
    pub fn new() -> Result<Self> {
        let path = Self::default_path().ok_or(PlinthError::MissingDataDir)?;
        Ok(Self { path })
    }

    /// Store at an explicit path. Used by tests.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Platform default token path, if a data directory exists.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "plinth").map(|dirs| dirs.data_dir().join("token"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the persisted token, if any.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let token = contents.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    /// Persist the token atomically.
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(token.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Remove the persisted token.
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::at(temp_dir.path().join("token"));

        assert_eq!(store.load().unwrap(), None);

        store.save("abc123").unwrap();
        assert_eq!(store.load().unwrap(), Some("abc123".to_string()));
    }

    #[test]
    fn test_delete_clears_token() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::at(temp_dir.path().join("token"));

        store.save("abc123").unwrap();
        store.delete().unwrap();
        assert_eq!(store.load().unwrap(), None);

        // Deleting again is a no-op.
        store.delete().unwrap();
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::at(temp_dir.path().join("nested").join("dir").join("token"));

        store.save("tok").unwrap();
        assert_eq!(store.load().unwrap(), Some("tok".to_string()));
    }
}
