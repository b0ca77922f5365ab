//! Authorization-code-with-PKCE OAuth flow and file-based token storage
//! for remote MCP plugins (component C5 auth concern).

pub mod error;
pub mod flow;
pub mod pkce;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use flow::{AuthorizationRequest, OAuthFlow};
pub use pkce::{generate_pkce, generate_state};
pub use storage::TokenStore;
pub use types::{OAuthConfig, OAuthTokens, PkceChallenge};
