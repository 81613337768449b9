//! Blogger OAuth credentials.
//!
//! The server never prompts: it loads the credential store, has `oauth2` refresh the access
//! token with the stored refresh token when needed and writes the store back. First-time consent
//! happens out of band through `newsbot authorize`, which drives [`CredentialManager::authorize_interactive`].

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, HttpRequest, HttpResponse, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no usable credential in {}; run `newsbot authorize` first", path.display())]
    ConsentRequired { path: PathBuf },

    #[error("invalid client secret file {}: {reason}", path.display())]
    ClientSecret { path: PathBuf, reason: String },

    #[error("credential store {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential store {} is corrupt: {source}", path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no authorization code entered")]
    MissingCode,

    #[error("invalid OAuth endpoint {url}: {source}")]
    Endpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("token endpoint: {0}")]
    TokenEndpoint(String),

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("console I/O failed: {0}")]
    Console(#[from] std::io::Error),
}

/// Persisted OAuth credential (the on-disk credential store format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// True when the access token can still be used at `now` (with a safety margin).
    /// A credential without a known expiry is treated as expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.token_expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_MARGIN_SECONDS) > now,
            None => false,
        }
    }

    fn apply_token(&mut self, token: &BasicTokenResponse, now: DateTime<Utc>) -> Result<(), AuthError> {
        let expiry = match token.expires_in() {
            Some(lifetime) => Some(
                Duration::from_std(lifetime)
                    .ok()
                    .and_then(|d| now.checked_add_signed(d))
                    .ok_or_else(|| {
                        AuthError::TokenEndpoint(format!("expires_in out of range: {}s", lifetime.as_secs()))
                    })?,
            ),
            None => None,
        };

        self.access_token = token.access_token().secret().clone();
        self.token_expiry = expiry;
        if let Some(refresh) = token.refresh_token() {
            self.refresh_token = Some(refresh.secret().clone());
        }
        Ok(())
    }
}

/// One section (`installed` or `web`) of a Google client secret file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

/// Loads, refreshes and stores the Blogger credential.
pub struct CredentialManager {
    client_secret_file: PathBuf,
    storage_file: PathBuf,
    scopes: Vec<String>,
    client: reqwest::Client,
}

impl CredentialManager {
    pub fn new(
        client_secret_file: impl Into<PathBuf>,
        storage_file: impl Into<PathBuf>,
        scopes: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, AuthError> {
        // Token endpoints must not be followed through redirects.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("newsbot/0.1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client_secret_file: client_secret_file.into(),
            storage_file: storage_file.into(),
            scopes: scopes.split_whitespace().map(str::to_string).collect(),
            client,
        })
    }

    pub fn storage_file(&self) -> &Path {
        &self.storage_file
    }

    /// Return a usable credential, refreshing and persisting it when the access token expired.
    pub async fn obtain_credential(&self) -> Result<Credential, AuthError> {
        info!("Authorizing Blogger credentials");
        let mut credential = match self.load_store().await? {
            Some(c) => c,
            None => {
                warn!(path = %self.storage_file.display(), "no stored credential");
                return Err(self.consent_required());
            }
        };

        if credential.is_valid_at(Utc::now()) {
            info!("Blogger credentials ready (stored token)");
            return Ok(credential);
        }

        let refresh_token = match credential.refresh_token.clone() {
            Some(t) if !t.is_empty() => t,
            _ => {
                warn!("stored credential expired and has no refresh token");
                return Err(self.consent_required());
            }
        };

        info!("Access token expired, refreshing");
        let client = oauth_client(
            &credential.client_id,
            &credential.client_secret,
            DEFAULT_AUTH_URI,
            &credential.token_uri,
        )?;
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(|request| send_token_request(&self.client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(ref resp) if *resp.error() == BasicErrorResponseType::InvalidGrant => {
                    warn!(error = %resp, "refresh token rejected");
                    self.consent_required()
                }
                other => token_error(other),
            })?;
        credential.apply_token(&token, Utc::now())?;
        self.save_store(&credential).await?;

        info!("Blogger credentials ready (refreshed)");
        Ok(credential)
    }

    /// First-time consent: print the consent URL, read the pasted code, exchange it, store the result.
    pub async fn authorize_interactive<R, W>(&self, input: &mut R, output: &mut W) -> Result<Credential, AuthError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let secret = self.load_client_secret().await?;
        let redirect_uri = secret
            .redirect_uris
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        let consent = self.consent_url(&secret, &redirect_uri)?;
        let client = oauth_client(&secret.client_id, &secret.client_secret, &secret.auth_uri, &secret.token_uri)?
            .set_redirect_uri(redirect_url(&redirect_uri)?);

        output
            .write_all(
                format!(
                    "Open this URL in a browser and grant access:\n\n  {}\n\nThen paste the `code` parameter of the redirect URL here: ",
                    consent
                )
                .as_bytes(),
            )
            .await?;
        output.flush().await?;

        let mut line = String::new();
        input.read_line(&mut line).await?;
        let code = line.trim();
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(|request| send_token_request(&self.client, request))
            .await
            .map_err(token_error)?;

        if token.refresh_token().is_none() {
            warn!("token endpoint returned no refresh token; consent will be needed again after expiry");
        }

        let mut credential = Credential {
            access_token: String::new(),
            refresh_token: None,
            token_expiry: None,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            token_uri: secret.token_uri,
            scopes: self.scopes.clone(),
        };
        credential.apply_token(&token, Utc::now())?;
        self.save_store(&credential).await?;

        info!(path = %self.storage_file.display(), "credential stored");
        Ok(credential)
    }

    /// Build the offline-access consent URL for the configured scopes.
    pub fn consent_url(&self, secret: &ClientSecret, redirect_uri: &str) -> Result<url::Url, AuthError> {
        let client = oauth_client(&secret.client_id, &secret.client_secret, &secret.auth_uri, &secret.token_uri)?
            .set_redirect_uri(redirect_url(redirect_uri)?);
        let (url, _state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok(url)
    }

    pub async fn load_client_secret(&self) -> Result<ClientSecret, AuthError> {
        let path = &self.client_secret_file;
        let data = tokio::fs::read_to_string(path).await.map_err(|e| AuthError::ClientSecret {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let file: ClientSecretFile = serde_json::from_str(&data).map_err(|e| AuthError::ClientSecret {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        file.installed.or(file.web).ok_or_else(|| AuthError::ClientSecret {
            path: path.clone(),
            reason: "expected an `installed` or `web` section".to_string(),
        })
    }

    async fn load_store(&self) -> Result<Option<Credential>, AuthError> {
        let path = &self.storage_file;
        let data = match tokio::fs::read_to_string(path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::Store {
                    path: path.clone(),
                    source: e,
                })
            }
        };
        if data.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| AuthError::CorruptStore {
                path: path.clone(),
                source: e,
            })
    }

    /// Write through a sibling temp file and rename so readers never see a partial store.
    async fn save_store(&self, credential: &Credential) -> Result<(), AuthError> {
        let path = &self.storage_file;
        let store_err = |source| AuthError::Store {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(store_err)?;
        }

        let json = serde_json::to_vec_pretty(credential).map_err(|e| AuthError::CorruptStore {
            path: path.clone(),
            source: e,
        })?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await.map_err(store_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(store_err)?;
        Ok(())
    }

    fn consent_required(&self) -> AuthError {
        AuthError::ConsentRequired {
            path: self.storage_file.clone(),
        }
    }
}

/// Google accepts the client credentials in the form body, as its own libraries send them.
fn oauth_client(client_id: &str, client_secret: &str, auth_uri: &str, token_uri: &str) -> Result<BasicClient, AuthError> {
    let auth_url = AuthUrl::new(auth_uri.to_string()).map_err(|source| AuthError::Endpoint {
        url: auth_uri.to_string(),
        source,
    })?;
    let token_url = TokenUrl::new(token_uri.to_string()).map_err(|source| AuthError::Endpoint {
        url: token_uri.to_string(),
        source,
    })?;

    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        Some(oauth2::ClientSecret::new(client_secret.to_string())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody))
}

fn redirect_url(uri: &str) -> Result<RedirectUrl, AuthError> {
    RedirectUrl::new(uri.to_string()).map_err(|source| AuthError::Endpoint {
        url: uri.to_string(),
        source,
    })
}

/// Runs `oauth2` token requests on the manager's client so they share its timeout.
async fn send_token_request(client: &reqwest::Client, request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url)
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();
    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn token_error(err: RequestTokenError<reqwest::Error, BasicErrorResponse>) -> AuthError {
    match err {
        RequestTokenError::Request(e) => AuthError::Http(e),
        RequestTokenError::ServerResponse(resp) => AuthError::TokenEndpoint(resp.to_string()),
        RequestTokenError::Parse(e, body) => AuthError::TokenEndpoint(format!(
            "unexpected response ({}): {}",
            e,
            String::from_utf8_lossy(&body)
        )),
        RequestTokenError::Other(msg) => AuthError::TokenEndpoint(msg),
    }
}
