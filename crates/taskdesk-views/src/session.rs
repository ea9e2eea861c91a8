use std::fs;
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use taskdesk_core::{Credentials, Role, User};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("credentials file: {0}")]
    Io(#[from] io::Error),

    #[error("credentials format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Who is logged in.
///
/// Cheap to clone; clones share state. Pass it to whatever needs the
/// current user and call [`Session::subscribe`] to follow changes.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<Option<Credentials>>,
    store_path: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An anonymous session that is never persisted.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Restore from `path` if it holds credentials. Later updates are
    /// written back to the same file.
    pub fn restore(path: &Path) -> Result<Self, SessionError> {
        let creds = match fs::read_to_string(path) {
            Ok(raw) => Some(serde_json::from_str::<Credentials>(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        match &creds {
            Some(c) => info!("restored session for {}", c.user.email),
            None => debug!("no saved session at {}", path.display()),
        }
        Ok(Self::build(creds, Some(path.to_path_buf())))
    }

    fn build(creds: Option<Credentials>, store_path: Option<PathBuf>) -> Self {
        let (tx, _) = watch::channel(creds);
        Self {
            inner: Arc::new(Inner { tx, store_path }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Credentials>> {
        self.inner.tx.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.tx.borrow().as_ref().map(|c| c.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.inner.tx.borrow().as_ref().map(|c| c.token.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.tx.borrow().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.inner
            .tx
            .borrow()
            .as_ref()
            .is_some_and(|c| c.user.role == Role::Admin)
    }

    /// Replace the current user and persist the credentials.
    pub fn update_user(&self, creds: Credentials) -> Result<(), SessionError> {
        if let Some(path) = &self.inner.store_path {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            write_private(path, &serde_json::to_vec_pretty(&creds)?)?;
        }
        info!("session user set to {}", creds.user.email);
        self.inner.tx.send_replace(Some(creds));
        Ok(())
    }

    /// Log out: forget the user and delete persisted credentials.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.inner.tx.send_replace(None);
        if let Some(path) = &self.inner.store_path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!("session cleared");
        Ok(())
    }
}

/// Write `bytes` readable by the owner only; the file holds a bearer token.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(0o600);
    let mut file = opts.open(path)?;
    // mode only applies on creation
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(role: Role) -> Credentials {
        Credentials {
            token: "tok".into(),
            user: User {
                id: "u1".into(),
                name: "Ada".into(),
                username: "ada".into(),
                email: "ada@example.com".into(),
                role,
                bio: None,
                profile_image_url: None,
            },
        }
    }

    #[test]
    fn test_subscribers_see_login_and_logout() {
        let session = Session::new();
        let mut rx = session.subscribe();
        assert!(rx.borrow_and_update().is_none());

        session.update_user(creds(Role::Member)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|c| c.user.id.clone()),
            Some("u1".to_string())
        );
        assert!(!session.is_admin());

        session.clear().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::new();
        let other = session.clone();
        session.update_user(creds(Role::Admin)).unwrap();
        assert!(other.is_admin());
        assert_eq!(other.token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_persist_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let session = Session::restore(&path).unwrap();
        assert!(!session.is_logged_in());
        session.update_user(creds(Role::Admin)).unwrap();

        let restored = Session::restore(&path).unwrap();
        assert_eq!(restored.user().unwrap().email, "ada@example.com");
        assert!(restored.is_admin());

        restored.clear().unwrap();
        assert!(!path.exists());
        assert!(!Session::restore(&path).unwrap().is_logged_in());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Session::restore(&path),
            Err(SessionError::Format(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_credentials_file_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, serde_json::to_vec(&creds(Role::Member)).unwrap()).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let session = Session::restore(&path).unwrap();
        session.update_user(creds(Role::Admin)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
