use base64::{engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD}, Engine as _};
use secrecy::Secret;
use url::Url;

use crate::{
    error::{Error, Result},
    pkce::{generate_pkce, generate_state},
    types::{OAuthConfig, OAuthTokens, PkceChallenge},
};

/// Drives the OAuth 2.0 authorization-code-with-PKCE flow for one remote
/// MCP plugin's configured auth server.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

pub struct AuthorizationRequest {
    pub url: String,
    pub pkce: PkceChallenge,
    pub state: String,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    /// Builds the authorization URL and generates a fresh PKCE pair + state.
    pub fn start(&self) -> Result<AuthorizationRequest> {
        let pkce = generate_pkce();
        let state = generate_state();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|source| Error::message(format!("invalid auth_url: {source}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state);

        if let Some(resource) = &self.config.resource {
            url.query_pairs_mut().append_pair("resource", resource);
        }
        if !self.config.scopes.is_empty() {
            url.query_pairs_mut().append_pair("scope", &self.config.scopes.join(" "));
        }
        for (key, value) in &self.config.extra_auth_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(AuthorizationRequest { url: url.to_string(), pkce, state })
    }

    pub async fn exchange(&self, code: &str, verifier: &str) -> Result<OAuthTokens> {
        let mut form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.config.redirect_uri.clone()),
            ("client_id".to_string(), self.config.client_id.clone()),
            ("code_verifier".to_string(), verifier.to_string()),
        ];
        if let Some(resource) = &self.config.resource {
            form.push(("resource".to_string(), resource.clone()));
        }

        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        parse_token_response(&resp)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
        ];
        if let Some(resource) = &self.config.resource {
            form.push(("resource".to_string(), resource.clone()));
        }

        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        parse_token_response(&resp)
    }
}

fn parse_token_response(resp: &serde_json::Value) -> Result<OAuthTokens> {
    let access_token = resp["access_token"]
        .as_str()
        .ok_or_else(|| Error::message("missing access_token in response"))?
        .to_string();

    let refresh_token = resp["refresh_token"].as_str().map(str::to_string);
    let id_token = resp["id_token"].as_str().map(str::to_string);
    let account_id = extract_account_id_from_tokens(&access_token, id_token.as_deref());

    let expires_at = resp["expires_in"].as_u64().and_then(|secs| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() + secs)
    });

    Ok(OAuthTokens {
        access_token: Secret::new(access_token),
        refresh_token: refresh_token.map(Secret::new),
        id_token: id_token.map(Secret::new),
        account_id,
        expires_at,
    })
}

fn extract_account_id_from_tokens(access_token: &str, id_token: Option<&str>) -> Option<String> {
    id_token
        .and_then(extract_account_id_from_jwt)
        .or_else(|| extract_account_id_from_jwt(access_token))
}

fn extract_account_id_from_jwt(token: &str) -> Option<String> {
    let claims = parse_jwt_claims(token)?;
    claims
        .get("account_id")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            claims
                .get("sub")
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(ToString::to_string)
        })
}

fn parse_jwt_claims(token: &str) -> Option<serde_json::Value> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).or_else(|_| {
        let padded = match payload_b64.len() % 4 {
            2 => format!("{payload_b64}=="),
            3 => format!("{payload_b64}="),
            _ => payload_b64.to_string(),
        };
        STANDARD.decode(padded)
    });
    serde_json::from_slice(&payload.ok()?).ok()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "otui-client".to_string(),
            auth_url: "https://auth.example.com/authorize".to_string(),
            token_url: "https://auth.example.com/token".to_string(),
            redirect_uri: "http://localhost:8484/callback".to_string(),
            resource: None,
            scopes: vec!["tools.read".to_string()],
            extra_auth_params: vec![],
        }
    }

    #[test]
    fn start_builds_url_with_pkce_and_state() {
        let flow = OAuthFlow::new(test_config());
        let req = flow.start().unwrap();
        assert!(req.url.contains("code_challenge="));
        assert!(req.url.contains("code_challenge_method=S256"));
        assert!(req.url.contains(&format!("state={}", req.state)));
        assert!(req.url.contains("scope=tools.read"));
    }

    #[tokio::test]
    async fn exchange_parses_token_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"abc123","refresh_token":"def456","expires_in":3600}"#)
            .create_async()
            .await;

        let mut config = test_config();
        config.token_url = format!("{}/token", server.url());
        let flow = OAuthFlow::new(config);

        let tokens = flow.exchange("the-code", "the-verifier").await.unwrap();
        mock.assert_async().await;
        assert!(tokens.expires_at.is_some());
    }

    #[test]
    fn jwt_claims_round_trip() {
        let payload = serde_json::json!({ "sub": "user-42" });
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let token = format!("header.{payload_b64}.signature");
        assert_eq!(extract_account_id_from_jwt(&token).as_deref(), Some("user-42"));
    }
}
