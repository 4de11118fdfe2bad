// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Photo vault API client.
//!
//! Handles login (including the MFA challenge round-trip), library and
//! collection listing, and streamed asset downloads. Authentication errors
//! are typed so the worker can tell a rejected credential (surface to the
//! user, re-prompt) from a transport fault (log and retry later).
//!
//! # Example
//!
//! ```no_run
//! use photopull::remote::{AuthAttempt, VaultClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = VaultClient::new("https://vault.example.com/api/v1");
//! match client.authenticate("ansel", "hunter2").await? {
//!     AuthAttempt::Authenticated(session) => {
//!         let libraries = session.libraries().await?;
//!         println!("{} private libraries", libraries.private.len());
//!     }
//!     AuthAttempt::MfaRequired(challenge) => {
//!         let _session = challenge.submit_code("123456").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::mask_sensitive;

/// Default vault API endpoint.
pub const DEFAULT_VAULT_URL: &str = "https://api.framevault.io/v1";

/// Default timeout for API requests (in seconds).
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Separate, longer timeout for asset downloads (in seconds).
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Error types specific to vault operations.
#[derive(Debug, Clone)]
pub enum VaultError {
    /// Username/password rejected by the vault.
    InvalidCredentials(String),
    /// MFA code rejected by the vault.
    InvalidCode(String),
    /// The vault answered with a non-auth error.
    ApiError(String),
    /// The vault could not be reached.
    NetworkError(String),
}

impl VaultError {
    /// True for the errors a user can fix by typing the secret again.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_) | Self::InvalidCode(_))
    }
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials(msg) => write!(f, "invalid credentials: {}", msg),
            Self::InvalidCode(msg) => write!(f, "invalid verification code: {}", msg),
            Self::ApiError(msg) => write!(f, "vault API error: {}", msg),
            Self::NetworkError(msg) => write!(f, "network error: {}", msg),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            VaultError::NetworkError(err.to_string())
        } else {
            VaultError::ApiError(err.to_string())
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    mfa_required: bool,
}

#[derive(Serialize)]
struct MfaSubmitRequest<'a> {
    token: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct MfaSubmitResponse {
    token: String,
}

/// The libraries visible to an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySummary {
    #[serde(default)]
    pub private: Vec<String>,
    #[serde(default)]
    pub shared: Vec<String>,
}

/// A folder or album with its asset count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: u64,
}

/// Which kind of collection an asset listing refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Folder,
    Album,
}

impl CollectionKind {
    fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Folder => "folder",
            CollectionKind::Album => "album",
        }
    }
}

/// One downloadable asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    /// Hex SHA-256 of the asset bytes, when the vault has one on record
    #[serde(default)]
    pub sha256: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Outcome of a login attempt.
pub enum AuthAttempt {
    /// Credentials accepted, no second factor needed
    Authenticated(VaultSession),
    /// Credentials accepted, vault wants a one-time code
    MfaRequired(MfaChallenge),
}

/// Unauthenticated client for starting a login.
#[derive(Debug, Clone)]
pub struct VaultClient {
    base_url: String,
    client: reqwest::Client,
}

impl VaultClient {
    /// Create a client against the given vault base URL.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built, which indicates a broken
    /// TLS stack; acceptable for initialization code.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client for the vault API");
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Attempt a username/password login.
    ///
    /// A 401 from the vault maps to [`VaultError::InvalidCredentials`];
    /// everything else is an API or network fault.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthAttempt, VaultError> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VaultError::InvalidCredentials(format!(
                "vault rejected the password for {}",
                username
            )));
        }
        if !response.status().is_success() {
            return Err(VaultError::ApiError(format!(
                "login failed with HTTP {}",
                response.status()
            )));
        }

        let login: LoginResponse = read_json(response).await?;
        tracing::debug!(
            username,
            token = %mask_sensitive(&login.token, 6),
            mfa_required = login.mfa_required,
            "vault login accepted"
        );

        if login.mfa_required {
            Ok(AuthAttempt::MfaRequired(MfaChallenge {
                base_url: self.base_url.clone(),
                client: self.client.clone(),
                username: username.to_string(),
                token: login.token,
            }))
        } else {
            Ok(AuthAttempt::Authenticated(VaultSession::new(
                self.base_url.clone(),
                self.client.clone(),
                username.to_string(),
                login.token,
            )))
        }
    }
}

/// A login waiting on its one-time code.
pub struct MfaChallenge {
    base_url: String,
    client: reqwest::Client,
    username: String,
    token: String,
}

impl MfaChallenge {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Submit the user-supplied code. A 401 maps to
    /// [`VaultError::InvalidCode`] and the challenge stays usable for
    /// another attempt.
    pub async fn submit_code(&self, code: &str) -> Result<VaultSession, VaultError> {
        let url = format!("{}/auth/mfa", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&MfaSubmitRequest {
                token: &self.token,
                code,
            })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VaultError::InvalidCode(
                "vault rejected the verification code".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(VaultError::ApiError(format!(
                "MFA submission failed with HTTP {}",
                response.status()
            )));
        }

        let accepted: MfaSubmitResponse = read_json(response).await?;
        Ok(VaultSession::new(
            self.base_url.clone(),
            self.client.clone(),
            self.username.clone(),
            accepted.token,
        ))
    }
}

/// An authenticated vault session.
///
/// This is the opaque handle cached in the exchange once the handshake
/// completes; the listing endpoints and the sync engine share it. Holds the
/// bearer token; the exchange neither validates, refreshes, nor expires it.
pub struct VaultSession {
    base_url: String,
    client: reqwest::Client,
    username: String,
    token: String,
}

impl VaultSession {
    fn new(base_url: String, client: reqwest::Client, username: String, token: String) -> Self {
        Self {
            base_url,
            client,
            username,
            token,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, VaultError> {
        let response = self.get(path).query(query).send().await?;
        if !response.status().is_success() {
            return Err(VaultError::ApiError(format!(
                "GET {} failed with HTTP {}",
                path,
                response.status()
            )));
        }
        read_json(response).await
    }

    /// Libraries visible to this account.
    pub async fn libraries(&self) -> Result<LibrarySummary, VaultError> {
        self.fetch_json("/libraries", &[]).await
    }

    /// Folders in a library, with asset counts.
    pub async fn folders(&self, library: &str) -> Result<Vec<CollectionInfo>, VaultError> {
        self.fetch_json(&format!("/libraries/{}/folders", library), &[])
            .await
    }

    /// Albums in a library, with asset counts.
    pub async fn albums(&self, library: &str) -> Result<Vec<CollectionInfo>, VaultError> {
        self.fetch_json(&format!("/libraries/{}/albums", library), &[])
            .await
    }

    /// Assets in one folder or album.
    pub async fn assets(
        &self,
        library: &str,
        kind: CollectionKind,
        name: &str,
    ) -> Result<Vec<Asset>, VaultError> {
        self.fetch_json(
            &format!("/libraries/{}/assets", library),
            &[("kind", kind.as_str()), ("name", name)],
        )
        .await
    }

    /// Start a streamed download of one asset. The caller consumes the
    /// response body chunk by chunk.
    pub async fn download(&self, asset_id: &str) -> Result<reqwest::Response, VaultError> {
        let response = self
            .get(&format!("/assets/{}", asset_id))
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VaultError::ApiError(format!(
                "asset {} download failed with HTTP {}",
                asset_id,
                response.status()
            )));
        }
        Ok(response)
    }
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &mask_sensitive(&self.token, 6))
            .finish()
    }
}

/// Decode a JSON body, folding decode failures into [`VaultError`].
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, VaultError> {
    response
        .json::<T>()
        .await
        .map_err(|e| VaultError::ApiError(format!("malformed vault response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejection_classification() {
        assert!(VaultError::InvalidCredentials("x".into()).is_credential_rejection());
        assert!(VaultError::InvalidCode("x".into()).is_credential_rejection());
        assert!(!VaultError::ApiError("x".into()).is_credential_rejection());
        assert!(!VaultError::NetworkError("x".into()).is_credential_rejection());
    }

    #[test]
    fn test_asset_deserializes_without_checksum() {
        let asset: Asset =
            serde_json::from_str(r#"{"id":"a1","filename":"IMG_0001.HEIC","size":1024}"#).unwrap();
        assert_eq!(asset.sha256, None);
        assert_eq!(asset.size, 1024);
    }

    #[test]
    fn test_session_debug_masks_token() {
        let session = VaultSession::new(
            DEFAULT_VAULT_URL.to_string(),
            reqwest::Client::new(),
            "ansel".to_string(),
            "tok-abcdefghijklmnop".to_string(),
        );
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("tok-ab..."));
        assert!(!rendered.contains("tok-abcdefghijklmnop"));
    }
}
