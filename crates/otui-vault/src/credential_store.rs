use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use tracing::debug;

use crate::{
    error::Result,
    keyvault::KeyVault,
};

const PLAINTEXT_FILENAME: &str = "credentials.toml";
const ENCRYPTED_FILENAME: &str = "credentials.enc";

/// Flat `key → value` credential map. Keys are either a bare provider id
/// (`"anthropic"`) or `plugin_<pluginID>_<field>`. Each entry is encrypted
/// independently with the entry's own key bound in as AEAD associated data,
/// so ciphertexts cannot be swapped between entries undetected.
pub struct CredentialStore {
    data_dir: PathBuf,
    vault: Arc<KeyVault>,
    entries: RwLock<Option<BTreeMap<String, String>>>,
}

impl CredentialStore {
    pub fn new(data_dir: impl Into<PathBuf>, vault: Arc<KeyVault>) -> Self {
        Self {
            data_dir: data_dir.into(),
            vault,
            entries: RwLock::new(None),
        }
    }

    fn path(&self) -> PathBuf {
        let filename = if self.vault.is_plaintext() {
            PLAINTEXT_FILENAME
        } else {
            ENCRYPTED_FILENAME
        };
        self.data_dir.join(filename)
    }

    /// Loads the credential file on first access; subsequent calls read the
    /// cached map. Decrypt failures propagate as `WrongPassphrase` or
    /// `CredentialCorrupt` (set by the vault), never silently dropped.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_loaded()?;
        Ok(self
            .entries
            .read()
            .expect("credential entries lock poisoned")
            .as_ref()
            .expect("loaded above")
            .get(key)
            .cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_loaded()?;
        {
            let mut guard = self.entries.write().expect("credential entries lock poisoned");
            guard
                .as_mut()
                .expect("loaded above")
                .insert(key.to_string(), value.to_string());
        }
        self.save()
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.ensure_loaded()?;
        {
            let mut guard = self.entries.write().expect("credential entries lock poisoned");
            guard.as_mut().expect("loaded above").remove(key);
        }
        self.save()
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.ensure_loaded()?;
        Ok(self
            .entries
            .read()
            .expect("credential entries lock poisoned")
            .as_ref()
            .expect("loaded above")
            .keys()
            .cloned()
            .collect())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.entries.read().expect("credential entries lock poisoned").is_some() {
            return Ok(());
        }
        let loaded = self.load_from_disk()?;
        *self.entries.write().expect("credential entries lock poisoned") = Some(loaded);
        Ok(())
    }

    fn load_from_disk(&self) -> Result<BTreeMap<String, String>> {
        let path = self.path();
        if !path.exists() {
            debug!(path = %path.display(), "no credential file found, starting empty");
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&path)?;

        if self.vault.is_plaintext() {
            let table: BTreeMap<String, String> = toml::from_str(&raw)
                .map_err(|e| crate::error::Error::CredentialCorrupt(e.to_string()))?;
            return Ok(table);
        }

        let sealed: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        let mut out = BTreeMap::new();
        for (key, ciphertext) in sealed {
            let plaintext = self.vault.decrypt_string(&ciphertext, key.as_bytes())?;
            out.insert(key, plaintext);
        }
        Ok(out)
    }

    fn save(&self) -> Result<()> {
        let entries = self.entries.read().expect("credential entries lock poisoned");
        let entries = entries.as_ref().expect("save called after load");

        let serialized = if self.vault.is_plaintext() {
            toml::to_string_pretty(entries)
                .map_err(|e| crate::error::Error::Message(e.to_string()))?
        } else {
            let mut sealed = BTreeMap::new();
            for (key, plaintext) in entries.iter() {
                sealed.insert(key.clone(), self.vault.encrypt_string(plaintext, key.as_bytes())?);
            }
            serde_json::to_string_pretty(&sealed)?
        };

        write_atomic_0600(&self.path(), &serialized)?;
        Ok(())
    }
}

fn write_atomic_0600(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, path)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::signer::test_support::FixedSigner;

    #[test]
    fn plaintext_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::plaintext());
        let store = CredentialStore::new(dir.path(), vault);
        store.set("anthropic", "sk-ant-123").unwrap();

        let reloaded = CredentialStore::new(dir.path(), Arc::new(KeyVault::plaintext()));
        assert_eq!(reloaded.get("anthropic").unwrap().as_deref(), Some("sk-ant-123"));
        assert!(dir.path().join(PLAINTEXT_FILENAME).exists());
    }

    #[test]
    fn encrypted_mode_persists_ciphertext_not_plaintext() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::ssh_key(Arc::new(FixedSigner(b"fixed-sig".to_vec()))));
        vault.unseal().unwrap();
        let store = CredentialStore::new(dir.path(), vault.clone());
        store.set("plugin_weather_api_key", "super-secret-token").unwrap();

        let raw = std::fs::read_to_string(dir.path().join(ENCRYPTED_FILENAME)).unwrap();
        assert!(!raw.contains("super-secret-token"));

        let reloaded = CredentialStore::new(dir.path(), vault);
        assert_eq!(
            reloaded.get("plugin_weather_api_key").unwrap().as_deref(),
            Some("super-secret-token")
        );
    }

    #[test]
    fn remove_deletes_key() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::plaintext());
        let store = CredentialStore::new(dir.path(), vault);
        store.set("openai", "sk-1").unwrap();
        store.remove("openai").unwrap();
        assert_eq!(store.get("openai").unwrap(), None);
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path(), Arc::new(KeyVault::plaintext()));
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn sealed_vault_fails_on_decrypt_attempt() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::ssh_key(Arc::new(FixedSigner(b"x".to_vec()))));
        vault.unseal().unwrap();
        let store = CredentialStore::new(dir.path(), vault.clone());
        store.set("openrouter", "token").unwrap();

        vault.seal();
        let reloaded = CredentialStore::new(dir.path(), vault);
        assert!(reloaded.get("openrouter").is_err());
    }
}
