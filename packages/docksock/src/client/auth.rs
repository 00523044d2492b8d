//! Registry Authentication
//!
//! Encodes registry credentials and identity tokens into the headers the
//! daemon reads on registry-facing calls.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ApiError, Result};

/// `Status` value of a successful login
pub const LOGIN_SUCCEEDED: &str = "Login Succeeded";

/// Header carrying a single registry credential or identity token
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Header carrying credentials for several registries at once (builds)
pub const REGISTRY_CONFIG_HEADER: &str = "X-Registry-Config";

/// Username and password for one registry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredential {
    pub serveraddress: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredential {
    pub fn new(
        serveraddress: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            serveraddress: serveraddress.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// JSON payload as sent to the daemon
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("serveraddress", &self.serveraddress)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a registry-facing call authenticates with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    /// Token issued earlier; sent as-is
    IdentityToken(String),
    Credential(RegistryCredential),
}

impl RegistryAuth {
    /// Header value for `X-Registry-Auth`
    pub fn encode(&self) -> Result<String> {
        match self {
            RegistryAuth::IdentityToken(token) => Ok(token.clone()),
            RegistryAuth::Credential(credential) => encode_credential(credential),
        }
    }
}

impl From<RegistryCredential> for RegistryAuth {
    fn from(credential: RegistryCredential) -> Self {
        RegistryAuth::Credential(credential)
    }
}

impl From<AuthToken> for RegistryAuth {
    fn from(token: AuthToken) -> Self {
        RegistryAuth::IdentityToken(token.0)
    }
}

/// base64 of the credential's JSON payload
pub fn encode_credential(credential: &RegistryCredential) -> Result<String> {
    Ok(URL_SAFE.encode(credential.to_payload()?))
}

/// Header value for registry calls made without any credential
pub fn encode_anonymous() -> String {
    URL_SAFE.encode("{}")
}

/// Reverse of [`encode_credential`], yielding the JSON payload
pub fn decode_payload(value: &str) -> Result<String> {
    let bytes = URL_SAFE
        .decode(value)
        .or_else(|_| STANDARD.decode(value))
        .map_err(|e| ApiError::InvalidRequest(format!("registry auth is not base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ApiError::InvalidRequest(format!("registry auth is not UTF-8: {e}")))
}

/// Opaque capability produced by a successful login
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<redacted>)")
    }
}

/// Reply of `POST /auth`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub identity_token: Option<String>,
}

impl AuthResponse {
    pub fn succeeded(&self) -> bool {
        self.status == LOGIN_SUCCEEDED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ConfigEntry {
    username: String,
    password: String,
}

/// Credentials for several registries, keyed by server address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    entries: BTreeMap<String, ConfigEntry>,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential; a second entry for the same server replaces the first
    pub fn insert(&mut self, credential: RegistryCredential) {
        self.entries.insert(
            credential.serveraddress,
            ConfigEntry {
                username: credential.username,
                password: credential.password,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Header value for `X-Registry-Config`
    pub fn encode(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(&self.entries)?))
    }
}

impl FromIterator<RegistryCredential> for RegistryConfig {
    fn from_iter<I: IntoIterator<Item = RegistryCredential>>(iter: I) -> Self {
        let mut config = RegistryConfig::new();
        for credential in iter {
            config.insert(credential);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn credential() -> RegistryCredential {
        RegistryCredential::new("ghcr.io", "octocat", "s3cr3t+/?")
    }

    #[test]
    fn test_credential_round_trip() {
        let credential = credential();
        let encoded = RegistryAuth::from(credential.clone()).encode().unwrap();

        assert_eq!(decode_payload(&encoded).unwrap(), credential.to_payload().unwrap());
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn test_identity_token_passes_through() {
        let auth = RegistryAuth::IdentityToken("eyJhbGciOi.token".to_string());
        assert_eq!(auth.encode().unwrap(), "eyJhbGciOi.token");
    }

    #[test]
    fn test_anonymous_auth_is_empty_object() {
        assert_eq!(decode_payload(&encode_anonymous()).unwrap(), "{}");
    }

    #[test]
    fn test_payload_field_names() {
        let payload: Value = serde_json::from_str(&credential().to_payload().unwrap()).unwrap();
        assert_eq!(
            payload,
            json!({"serveraddress": "ghcr.io", "username": "octocat", "password": "s3cr3t+/?"})
        );
    }

    #[test]
    fn test_registry_config_encoding() {
        let config: RegistryConfig = vec![
            credential(),
            RegistryCredential::new("localhost:5000", "dev", "dev"),
        ]
        .into_iter()
        .collect();

        let decoded = STANDARD.decode(config.encode().unwrap()).unwrap();
        let value: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(
            value,
            json!({
                "ghcr.io": {"username": "octocat", "password": "s3cr3t+/?"},
                "localhost:5000": {"username": "dev", "password": "dev"}
            })
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let printed = format!("{:?}", credential());
        assert!(!printed.contains("s3cr3t"));
        assert_eq!(format!("{:?}", AuthToken::new("abc".into())), "AuthToken(<redacted>)");
    }

    #[test]
    fn test_login_status() {
        let reply: AuthResponse =
            serde_json::from_str(r#"{"Status":"Login Succeeded","IdentityToken":""}"#).unwrap();
        assert!(reply.succeeded());

        let reply: AuthResponse = serde_json::from_str(r#"{"Status":"denied"}"#).unwrap();
        assert!(!reply.succeeded());
    }
}
