// Process-wide auth session.
// Holds the bearer token. Written only by login success and logout;
// every other component reads it.

pub mod store;

use std::sync::RwLock;

pub use store::TokenStore;

use crate::error::Result;

/// The process-wide bearer token slot.
///
/// The request path only ever calls [`token`](Self::token); mutation
/// happens through [`set_token`](Self::set_token) on login success and
/// [`clear`](Self::clear) on logout.
#[derive(Debug)]
pub struct Session {
    token: RwLock<Option<String>>,
    store: Option<TokenStore>,
}

impl Session {
    /// Session without persistence. Used by tests and short-lived
    /// tooling.
    pub fn in_memory() -> Self {
        Self {
            token: RwLock::new(None),
            store: None,
        }
    }

    /// Session backed by a persisted slot; loads any existing token.
    pub fn with_store(store: TokenStore) -> Result<Self> {
        let token = store.load()?;
        Ok(Self {
            token: RwLock::new(token),
            store: Some(store),
        })
    }

    /// Current token, if logged in.
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Store a fresh token (login success) and persist it.
    pub fn set_token(&self, token: &str) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(token)?;
        }
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
        Ok(())
    }

    /// Drop the token (logout) and remove the persisted copy.
    pub fn clear(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.delete()?;
        }
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_session() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());

        session.set_token("tok").unwrap();
        assert_eq!(session.token(), Some("tok".to_string()));

        session.clear().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_persisted_session_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token");

        let session = Session::with_store(TokenStore::at(path.clone())).unwrap();
        session.set_token("tok").unwrap();
        drop(session);

        let restarted = Session::with_store(TokenStore::at(path)).unwrap();
        assert_eq!(restarted.token(), Some("tok".to_string()));
    }

    #[test]
    fn test_logout_clears_persisted_token() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token");

        let session = Session::with_store(TokenStore::at(path.clone())).unwrap();
        session.set_token("tok").unwrap();
        session.clear().unwrap();
        drop(session);

        let restarted = Session::with_store(TokenStore::at(path)).unwrap();
        assert!(!restarted.is_authenticated());
    }
}
