use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use media_sync_config::CredentialStore;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
const TOKEN_URL: &str = "https://api.trakt.tv/oauth/token";
const DEVICE_CODE_URL: &str = "https://api.trakt.tv/oauth/device/code";
const DEVICE_TOKEN_URL: &str = "https://api.trakt.tv/oauth/device/token";

/// Tokens within this window of expiry are refreshed before use
const REFRESH_MARGIN_MINUTES: i64 = 5;

pub fn create_trakt_client() -> Client {
    Client::builder()
        .user_agent(concat!("plextraktsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<TokenResponse> for TokenInfo {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in as i64 - 120),
        }
    }
}

/// Code the user enters at the verification URL
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub expires_in: u64,
    pub interval: u64,
}

/// Return a usable access token, refreshing the stored one when it is about to expire
///
/// Without a stored token this fails; `login` runs the device flow instead.
pub async fn access_token(
    store: &mut CredentialStore,
    client_id: &str,
    client_secret: &str,
) -> Result<String> {
    let Some(token) = store.get_trakt_access_token().cloned() else {
        return Err(anyhow!("No Trakt token found, run `plextraktsync login` first"));
    };

    let expiring = store
        .get_trakt_token_expires()
        .map(|expires_at| expires_at <= Utc::now() + Duration::minutes(REFRESH_MARGIN_MINUTES))
        .unwrap_or(false);
    if !expiring {
        debug!("Using saved Trakt access token");
        return Ok(token);
    }

    let Some(refresh_token) = store.get_trakt_refresh_token().cloned() else {
        return Err(anyhow!("Trakt token expired and no refresh token is stored, run `plextraktsync login`"));
    };

    info!("Trakt access token expired or expiring soon, refreshing");
    let client = create_trakt_client();
    let token_info = refresh_access_token(&client, client_id, client_secret, &refresh_token).await?;
    save_token(store, &token_info)?;
    Ok(token_info.access_token)
}

pub fn save_token(store: &mut CredentialStore, token_info: &TokenInfo) -> Result<()> {
    store.set_trakt_access_token(token_info.access_token.clone());
    store.set_trakt_refresh_token(token_info.refresh_token.clone());
    store.set_trakt_token_expires(token_info.expires_at);
    store.save()
}

pub async fn refresh_access_token(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenInfo> {
    let payload = serde_json::json!({
        "refresh_token": refresh_token,
        "client_id": client_id,
        "client_secret": client_secret,
        "redirect_uri": REDIRECT_URI,
        "grant_type": "refresh_token"
    });

    let response = client
        .post(TOKEN_URL)
        .json(&payload)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Token refresh failed: {} - {}", status, error_text));
    }

    let token_response: TokenResponse = response.json().await?;
    Ok(token_response.into())
}

pub async fn request_device_code(client: &Client, client_id: &str) -> Result<DeviceCode> {
    let response = client
        .post(DEVICE_CODE_URL)
        .json(&serde_json::json!({ "client_id": client_id }))
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Failed to request device code: {} - {}", status, error_text));
    }

    Ok(response.json().await?)
}

/// Poll until the user approves the device code, it expires, or is denied
pub async fn poll_device_token(
    client: &Client,
    code: &DeviceCode,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenInfo> {
    let deadline = Utc::now() + Duration::seconds(code.expires_in as i64);
    let mut interval = std::time::Duration::from_secs(code.interval.max(1));
    let payload = serde_json::json!({
        "code": code.device_code,
        "client_id": client_id,
        "client_secret": client_secret,
    });

    while Utc::now() < deadline {
        tokio::time::sleep(interval).await;

        let response = client
            .post(DEVICE_TOKEN_URL)
            .json(&payload)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let token_response: TokenResponse = response.json().await?;
                info!("Trakt device authorization approved");
                return Ok(token_response.into());
            }
            // pending
            StatusCode::BAD_REQUEST => continue,
            StatusCode::TOO_MANY_REQUESTS => {
                interval += std::time::Duration::from_secs(1);
                warn!("Polling Trakt too fast, slowing down to {:?}", interval);
            }
            StatusCode::NOT_FOUND => return Err(anyhow!("Invalid Trakt device code")),
            StatusCode::CONFLICT => return Err(anyhow!("Trakt device code already used")),
            StatusCode::GONE => return Err(anyhow!("Trakt device code expired")),
            StatusCode::IM_A_TEAPOT => return Err(anyhow!("Trakt authorization denied by user")),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("Trakt device authorization failed: {} - {}", status, error_text));
            }
        }
    }

    Err(anyhow!("Trakt device code expired before it was approved"))
}

/// Full device-code login; `prompt` shows the code to the user
pub async fn device_login<F>(
    store: &mut CredentialStore,
    client_id: &str,
    client_secret: &str,
    prompt: F,
) -> Result<TokenInfo>
where
    F: FnOnce(&DeviceCode),
{
    let client = create_trakt_client();
    let code = request_device_code(&client, client_id).await?;
    prompt(&code);
    let token_info = poll_device_token(&client, &code, client_id, client_secret).await?;
    save_token(store, &token_info)?;
    Ok(token_info)
}
