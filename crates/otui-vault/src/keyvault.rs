use std::sync::{Arc, RwLock};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{
    cipher::{Aes256GcmCipher, Cipher},
    error::{Error, Result},
    signer::{SshSigner, KEY_DERIVATION_NAMESPACE},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// No mode has been configured yet.
    Uninitialized,
    /// `ssh_key` mode configured but the symmetric key has not been derived.
    Sealed,
    /// Ready to encrypt/decrypt.
    Unsealed,
}

enum Mode {
    Plaintext,
    SshKey { signer: Arc<dyn SshSigner> },
}

/// Derives and holds the vault's symmetric key, and performs AEAD
/// encryption/decryption against it. `plaintext` mode never derives a key;
/// callers in that mode store credentials unencrypted instead.
pub struct KeyVault {
    mode: Mode,
    cipher: Aes256GcmCipher,
    key: RwLock<Option<Zeroizing<[u8; 32]>>>,
}

impl KeyVault {
    pub fn plaintext() -> Self {
        Self {
            mode: Mode::Plaintext,
            cipher: Aes256GcmCipher,
            key: RwLock::new(None),
        }
    }

    pub fn ssh_key(signer: Arc<dyn SshSigner>) -> Self {
        Self {
            mode: Mode::SshKey { signer },
            cipher: Aes256GcmCipher,
            key: RwLock::new(None),
        }
    }

    pub fn is_plaintext(&self) -> bool {
        matches!(self.mode, Mode::Plaintext)
    }

    pub fn status(&self) -> VaultStatus {
        match &self.mode {
            Mode::Plaintext => VaultStatus::Unsealed,
            Mode::SshKey { .. } => {
                if self.key.read().expect("vault key lock poisoned").is_some() {
                    VaultStatus::Unsealed
                } else {
                    VaultStatus::Sealed
                }
            },
        }
    }

    /// Derives the symmetric key by signing the fixed domain-separator
    /// string and SHA-256 hashing the signature. A no-op in plaintext mode.
    pub fn unseal(&self) -> Result<()> {
        let Mode::SshKey { signer } = &self.mode else {
            return Ok(());
        };
        let signature = signer.sign(KEY_DERIVATION_NAMESPACE, KEY_DERIVATION_NAMESPACE.as_bytes())?;
        let digest = Sha256::digest(&signature);
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        *self.key.write().expect("vault key lock poisoned") = Some(Zeroizing::new(key));
        Ok(())
    }

    pub fn seal(&self) {
        *self.key.write().expect("vault key lock poisoned") = None;
    }

    pub fn encrypt_string(&self, plaintext: &str, aad: &[u8]) -> Result<String> {
        let key = self.require_key()?;
        let ciphertext = self.cipher.encrypt(&key, plaintext.as_bytes(), aad)?;
        Ok(STANDARD.encode(ciphertext))
    }

    pub fn decrypt_string(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String> {
        let key = self.require_key()?;
        let ciphertext = STANDARD.decode(ciphertext_b64)?;
        let plaintext = self.cipher.decrypt(&key, &ciphertext, aad)?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::CredentialCorrupt("decrypted credential is not valid utf-8".to_string()))
    }

    fn require_key(&self) -> Result<[u8; 32]> {
        if matches!(self.mode, Mode::Plaintext) {
            return Err(Error::Message(
                "encrypt_string/decrypt_string are unavailable in plaintext mode".to_string(),
            ));
        }
        self.key
            .read()
            .expect("vault key lock poisoned")
            .as_ref()
            .map(|k| **k)
            .ok_or(Error::WrongPassphrase)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::test_support::FixedSigner;

    #[test]
    fn plaintext_mode_is_always_unsealed() {
        let vault = KeyVault::plaintext();
        assert_eq!(vault.status(), VaultStatus::Unsealed);
        assert!(vault.unseal().is_ok());
    }

    #[test]
    fn ssh_key_mode_starts_sealed() {
        let signer = Arc::new(FixedSigner(vec![1, 2, 3]));
        let vault = KeyVault::ssh_key(signer);
        assert_eq!(vault.status(), VaultStatus::Sealed);
    }

    #[test]
    fn unseal_then_round_trip() {
        let signer = Arc::new(FixedSigner(b"deterministic-signature-bytes".to_vec()));
        let vault = KeyVault::ssh_key(signer);
        vault.unseal().unwrap();
        assert_eq!(vault.status(), VaultStatus::Unsealed);

        let ciphertext = vault.encrypt_string("sk-ant-abc123", b"anthropic").unwrap();
        let plaintext = vault.decrypt_string(&ciphertext, b"anthropic").unwrap();
        assert_eq!(plaintext, "sk-ant-abc123");
    }

    #[test]
    fn same_signer_input_derives_same_key() {
        let signer_a = Arc::new(FixedSigner(b"same-bytes".to_vec()));
        let vault_a = KeyVault::ssh_key(signer_a);
        vault_a.unseal().unwrap();
        let ciphertext = vault_a.encrypt_string("payload", b"ctx").unwrap();

        let signer_b = Arc::new(FixedSigner(b"same-bytes".to_vec()));
        let vault_b = KeyVault::ssh_key(signer_b);
        vault_b.unseal().unwrap();
        assert_eq!(vault_b.decrypt_string(&ciphertext, b"ctx").unwrap(), "payload");
    }

    #[test]
    fn sealed_vault_refuses_decrypt() {
        let signer = Arc::new(FixedSigner(vec![9]));
        let vault = KeyVault::ssh_key(signer);
        assert!(vault.decrypt_string("anything", b"").is_err());
    }

    #[test]
    fn wrong_aad_fails_decrypt() {
        let signer = Arc::new(FixedSigner(b"key-material".to_vec()));
        let vault = KeyVault::ssh_key(signer);
        vault.unseal().unwrap();
        let ciphertext = vault.encrypt_string("payload", b"openai").unwrap();
        assert!(vault.decrypt_string(&ciphertext, b"anthropic").is_err());
    }
}
