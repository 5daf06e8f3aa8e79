use reqwest::Client;
use tracing::info;

use crate::error::{check_response, SourceResult};

const PLEX_TV_BASE_URL: &str = "https://plex.tv";

/// Verify that a token is accepted by plex.tv, returning the account name
pub async fn verify_token(token: &str) -> SourceResult<Option<String>> {
    let client = Client::new();
    let url = format!("{}/api/v2/user", PLEX_TV_BASE_URL);

    let response = client
        .get(&url)
        .header("X-Plex-Token", token)
        .header("X-Plex-Client-Identifier", "plextraktsync")
        .header("Accept", "application/json")
        .send()
        .await?;

    let json: serde_json::Value = check_response(response).await?.json().await?;
    let username = json.get("username").and_then(|u| u.as_str()).map(|s| s.to_string());
    info!("Plex token verified for {}", username.as_deref().unwrap_or("unknown user"));
    Ok(username)
}

/// Verify that the server answers with this token
pub async fn verify_server(server_url: &str, token: &str) -> SourceResult<()> {
    let response = Client::new()
        .get(format!("{}/identity", server_url.trim_end_matches('/')))
        .header("X-Plex-Token", token)
        .header("Accept", "application/json")
        .send()
        .await?;
    check_response(response).await?;
    Ok(())
}
