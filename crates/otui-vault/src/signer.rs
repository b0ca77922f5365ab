use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use ssh_key::{HashAlg, PrivateKey};

use crate::error::{Error, Result};

/// Domain separator signed to derive the vault's symmetric key. Changing
/// this string would silently re-key every existing vault, so it is fixed.
pub const KEY_DERIVATION_NAMESPACE: &str = "otui-encryption-key-derivation-v1";

/// Anything that can produce an SSH signature over an arbitrary message,
/// abstracted so tests can substitute a fixed-output signer.
pub trait SshSigner: Send + Sync {
    fn sign(&self, namespace: &str, message: &[u8]) -> Result<Vec<u8>>;
}

/// Loads an OpenSSH private key from disk and signs with it, decrypting
/// on demand if the key itself is passphrase-protected.
pub struct FileSshSigner {
    path: PathBuf,
    key: PrivateKey,
}

impl FileSshSigner {
    /// Loads `path`. If the key is encrypted and `passphrase` is `None`,
    /// returns [`Error::PassphraseRequired`] without touching anything else.
    pub fn load(path: &Path, passphrase: Option<&SecretString>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let key = PrivateKey::from_openssh(&raw)
            .map_err(|e| Error::SshKey(format!("failed to parse {}: {e}", path.display())))?;

        let key = if key.is_encrypted() {
            let Some(passphrase) = passphrase else {
                return Err(Error::PassphraseRequired);
            };
            key.decrypt(passphrase.expose_secret().as_bytes())
                .map_err(|_| Error::WrongPassphrase)?
        } else {
            key
        };

        Ok(Self { path: path.to_path_buf(), key })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SshSigner for FileSshSigner {
    fn sign(&self, namespace: &str, message: &[u8]) -> Result<Vec<u8>> {
        let sig = self
            .key
            .sign(namespace, HashAlg::Sha256, message)
            .map_err(|e| Error::SshKey(format!("signing failed: {e}")))?;
        Ok(sig.signature().as_bytes().to_vec())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A signer with a fixed output, for tests that exercise key-derivation
    /// plumbing without parsing a real SSH key.
    pub struct FixedSigner(pub Vec<u8>);

    impl SshSigner for FixedSigner {
        fn sign(&self, _namespace: &str, _message: &[u8]) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }
}
