// src/wallet/credential_storage.rs
//! On-disk storage for the device pairing credentials.
//!
//! Keeps the two raw strings the device exports, under the same file names it
//! uses (`deviceid.dat`, `privatekey.dat`), in a single directory. The raw key
//! text is stored as given; conversion to PKCS#8 happens when a
//! [`Credential`] is built from it.

use crate::error::CredentialError;
use crate::models::credential::Credential;
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEVICE_ID_FILE: &str = "deviceid.dat";
pub const PRIVATE_KEY_FILE: &str = "privatekey.dat";

/// Raw credential strings as persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub device_id: String,
    pub private_key: String,
}

impl StoredCredentials {
    /// Validates the stored strings into a usable [`Credential`].
    pub fn to_credential(&self) -> Result<Credential, CredentialError> {
        Credential::new(&self.device_id, &self.private_key)
    }
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

/// File-backed credential store.
///
/// # Behavior
/// - `load` returns `None` unless both files exist
/// - `save` overwrites existing files
/// - `clear` removes whatever is present and never fails on missing files
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn device_id_path(&self) -> PathBuf {
        self.dir.join(DEVICE_ID_FILE)
    }

    fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    /// Reads the user's exported id and key files and validates them.
    ///
    /// Nothing is written; call [`CredentialStore::save`] with the result.
    ///
    /// # Errors
    /// Fails if either file is unreadable, the id is not 36 characters, or
    /// the key cannot be normalized and parsed.
    pub fn import(
        device_id_file: &Path,
        private_key_file: &Path,
    ) -> Result<StoredCredentials, CredentialError> {
        let stored = StoredCredentials {
            device_id: fs::read_to_string(device_id_file)?.trim().to_string(),
            private_key: fs::read_to_string(private_key_file)?.trim().to_string(),
        };
        stored.to_credential()?;
        Ok(stored)
    }

    pub fn load(&self) -> Result<Option<StoredCredentials>, CredentialError> {
        let device_id = match read_optional(&self.device_id_path())? {
            Some(id) => id,
            None => return Ok(None),
        };
        let private_key = match read_optional(&self.private_key_path())? {
            Some(key) => key,
            None => return Ok(None),
        };
        Ok(Some(StoredCredentials {
            device_id: device_id.trim().to_string(),
            private_key,
        }))
    }

    /// Loads and validates, failing with [`CredentialError::Missing`] if
    /// nothing is stored.
    pub fn load_credential(&self) -> Result<Credential, CredentialError> {
        self.load()?
            .ok_or(CredentialError::Missing)?
            .to_credential()
    }

    pub fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.device_id_path(), &credentials.device_id)?;
        fs::write(self.private_key_path(), &credentials.private_key)?;
        restrict_permissions(&self.private_key_path())?;
        debug!("Stored credentials for device {}", credentials.device_id);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CredentialError> {
        for path in [self.device_id_path(), self.private_key_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        warn!("Cleared stored credentials in {}", self.dir.display());
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, CredentialError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::tests::{CLIENT_ID, PKCS1_PEM};

    fn stored() -> StoredCredentials {
        StoredCredentials {
            device_id: CLIENT_ID.to_string(),
            private_key: PKCS1_PEM.trim().to_string(),
        }
    }

    #[test]
    fn empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("creds"));
        assert!(store.load().unwrap().is_none());
        assert!(matches!(
            store.load_credential(),
            Err(CredentialError::Missing)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("creds"));
        store.save(&stored()).unwrap();

        assert_eq!(store.load().unwrap(), Some(stored()));
        assert_eq!(store.load_credential().unwrap().client_id(), CLIENT_ID);
    }

    #[test]
    fn clear_removes_files_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&stored()).unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!dir.path().join(PRIVATE_KEY_FILE).exists());

        store.clear().unwrap();
    }

    #[test]
    fn half_written_store_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEVICE_ID_FILE), CLIENT_ID).unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn import_validates_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let id_file = dir.path().join(DEVICE_ID_FILE);
        let key_file = dir.path().join(PRIVATE_KEY_FILE);

        fs::write(&id_file, format!("{CLIENT_ID}\n")).unwrap();
        fs::write(&key_file, PKCS1_PEM).unwrap();
        let imported = CredentialStore::import(&id_file, &key_file).unwrap();
        assert_eq!(imported.device_id, CLIENT_ID);

        fs::write(&id_file, "1234").unwrap();
        assert!(matches!(
            CredentialStore::import(&id_file, &key_file),
            Err(CredentialError::InvalidDeviceId(4))
        ));

        fs::write(&id_file, CLIENT_ID).unwrap();
        fs::write(&key_file, "-----BEGIN CERTIFICATE-----\nabc\n-----END CERTIFICATE-----").unwrap();
        assert!(matches!(
            CredentialStore::import(&id_file, &key_file),
            Err(CredentialError::InvalidKey(_))
        ));
    }

    #[test]
    fn import_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = CredentialStore::import(
            &dir.path().join("nope.dat"),
            &dir.path().join(PRIVATE_KEY_FILE),
        );
        assert!(matches!(result, Err(CredentialError::Io(_))));
    }
}
