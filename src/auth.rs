//! Trakt PIN-flow authentication and on-disk credential caching.
//!
//! The two JSON files (client credentials, OAuth token) are wrapped in an
//! explicit [`CredentialStore`] so loading and saving stay testable without
//! the interactive prompts. Concurrent runs sharing the same store directory
//! are not protected against interleaved writes.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use dialoguer::Input;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CONFIG;
use crate::trakt::CLIENT;

const CREDENTIALS_FILE: &str = "trakt_credentials.json";
const TOKEN_FILE: &str = "trakt_token.json";

const AUTHORIZE_URL: &str = "https://trakt.tv/oauth/authorize";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    pub created_at: Option<u64>,
}

pub struct CredentialStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            credentials_path: dir.as_ref().join(CREDENTIALS_FILE),
            token_path: dir.as_ref().join(TOKEN_FILE),
        }
    }

    /// `None` when the file is missing or unreadable as credentials; the
    /// caller re-prompts and overwrites in that case.
    pub fn load_credentials(&self) -> Option<ClientCredentials> {
        Self::load(&self.credentials_path)
    }

    pub fn save_credentials(&self, credentials: &ClientCredentials) -> Result<()> {
        Self::save(&self.credentials_path, credentials)
    }

    pub fn load_token(&self) -> Option<Token> {
        Self::load(&self.token_path)
    }

    pub fn save_token(&self, token: &Token) -> Result<()> {
        Self::save(&self.token_path, token)
    }

    fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("ignoring unreadable {}: {e}", path.display());
                None
            }
        }
    }

    fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}

fn prompt_credentials() -> Result<ClientCredentials> {
    let client_id: String = Input::new()
        .with_prompt("Enter your Trakt Client ID")
        .interact_text()?;
    let client_secret: String = Input::new()
        .with_prompt("Enter your Trakt Client Secret")
        .interact_text()?;
    Ok(ClientCredentials {
        client_id: client_id.trim().to_string(),
        client_secret: client_secret.trim().to_string(),
    })
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

fn exchange_pin(credentials: &ClientCredentials, pin: &str) -> Result<Token> {
    let res = CLIENT
        .post(format!("{}/oauth/token", CONFIG.trakt_api_url))
        .json(&TokenRequest {
            code: pin,
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            redirect_uri: REDIRECT_URI,
            grant_type: "authorization_code",
        })
        .send()?;

    let status = res.status();
    if !status.is_success() {
        return Err(eyre!(
            "error authenticating with Trakt: {status} - {}",
            res.text().unwrap_or_default()
        ));
    }
    res.json().map_err(Into::into)
}

/// Returns a usable token and the client credentials, prompting only for
/// what the store cannot supply. A cached token is reused as-is unless
/// `reauth` forces a fresh PIN exchange.
pub fn authenticate(store: &CredentialStore, reauth: bool) -> Result<(Token, ClientCredentials)> {
    let credentials = match store.load_credentials() {
        Some(credentials) => credentials,
        None => {
            let credentials = prompt_credentials()?;
            store.save_credentials(&credentials)?;
            credentials
        }
    };

    if !reauth {
        if let Some(token) = store.load_token() {
            info!("using cached Trakt token");
            return Ok((token, credentials));
        }
    }

    let auth_url = format!(
        "{AUTHORIZE_URL}?response_type=code&client_id={}&redirect_uri={REDIRECT_URI}",
        credentials.client_id
    );
    println!("Opening browser to authorize Trakt. Please enter the PIN code provided.");
    if open::that(&auth_url).is_err() {
        warn!("could not open a browser, visit {auth_url} manually");
    }

    let pin: String = Input::new()
        .with_prompt("Enter the PIN code you received from Trakt")
        .interact_text()?;

    let token = exchange_pin(&credentials, pin.trim())?;
    store.save_token(&token)?;
    println!("Successfully authenticated with Trakt.");
    Ok((token, credentials))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_round_trip_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        assert!(store.load_credentials().is_none());

        let credentials = ClientCredentials {
            client_id: "abc".into(),
            client_secret: "shh".into(),
        };
        store.save_credentials(&credentials).unwrap();

        let loaded = store.load_credentials().unwrap();
        assert_eq!(loaded.client_id, "abc");
        assert_eq!(loaded.client_secret, "shh");
    }

    #[test]
    fn token_round_trip_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        assert!(store.load_token().is_none());

        store
            .save_token(&Token {
                access_token: "tok".into(),
                token_type: Some("bearer".into()),
                refresh_token: None,
                scope: None,
                expires_in: Some(7200),
                created_at: None,
            })
            .unwrap();

        assert_eq!(store.load_token().unwrap().access_token, "tok");
    }

    #[test]
    fn corrupt_files_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        fs::write(dir.path().join(CREDENTIALS_FILE), "{not json").unwrap();
        fs::write(dir.path().join(TOKEN_FILE), "{\"access_token\": 3}").unwrap();

        assert!(store.load_credentials().is_none());
        assert!(store.load_token().is_none());
    }
}
