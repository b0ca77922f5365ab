//! Credential-at-rest storage (component C1/C2): a pluggable symmetric-key
//! source (plaintext or SSH-signature-derived AES-256-GCM) feeding a flat
//! encrypted credential map.

pub mod cipher;
pub mod credential_store;
pub mod error;
pub mod keyvault;
pub mod signer;

pub use cipher::{Aes256GcmCipher, Cipher};
pub use credential_store::CredentialStore;
pub use error::{Error, Result};
pub use keyvault::{KeyVault, VaultStatus};
pub use signer::{FileSshSigner, SshSigner, KEY_DERIVATION_NAMESPACE};
