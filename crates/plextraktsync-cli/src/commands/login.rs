use super::config::print_section_header;
use super::prompts::{prompt_secret, prompt_string, prompt_yes_no};
use super::session::Session;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::PathManager;
use media_sync_sources::plex::auth as plex_auth;
use media_sync_sources::trakt::auth as trakt_auth;
use owo_colors::OwoColorize;

const DEFAULT_SERVER_URL: &str = "http://localhost:32400";

/// Values given on the command line; anything missing is prompted for
#[derive(Debug, Default)]
pub struct LoginArgs {
    pub plex_token: Option<String>,
    pub server_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

pub async fn run_login(paths: &PathManager, args: LoginArgs, output: &Output) -> Result<()> {
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create config directories: {}", e))?;
    let mut session = Session::load(paths)?;

    login_plex(&mut session, args.plex_token, args.server_url, output).await?;
    login_trakt(&mut session, args.client_id, args.client_secret, output).await?;

    let config_file = paths.config_file();
    session
        .config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))?;
    session
        .credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials: {}", e))?;

    output.success(format!("Login complete, configuration saved to {}", config_file.display()));
    Ok(())
}

async fn login_plex(
    session: &mut Session,
    token: Option<String>,
    server_url: Option<String>,
    output: &Output,
) -> Result<()> {
    print_section_header("Plex", output);

    let token = match token.or_else(|| session.credentials.get_plex_token().cloned()) {
        Some(token) => token,
        None => {
            output.info("Find your token at https://support.plex.tv/articles/204059436");
            prompt_secret("Plex token")?
        }
    };

    let username = plex_auth::verify_token(&token)
        .await
        .map_err(|e| eyre!("Plex rejected the token: {}", e))?;
    if let Some(name) = &username {
        output.success(format!("Plex token belongs to {}", name.bright_white()));
    }

    let server_url = match server_url.or_else(|| session.plex_server_url()) {
        Some(url) => url,
        None => prompt_string("Plex server URL", Some(DEFAULT_SERVER_URL))?,
    };
    let server_url = server_url.trim_end_matches('/').to_string();
    plex_auth::verify_server(&server_url, &token)
        .await
        .map_err(|e| eyre!("Could not reach Plex server at {}: {}", server_url, e))?;
    output.success(format!("Connected to Plex server at {}", server_url));

    session.credentials.set_plex_token(token);
    session.credentials.set_plex_server_url(server_url);
    if session.config.plex.username.is_none() {
        session.config.plex.username = username;
    }
    Ok(())
}

async fn login_trakt(
    session: &mut Session,
    client_id: Option<String>,
    client_secret: Option<String>,
    output: &Output,
) -> Result<()> {
    print_section_header("Trakt", output);

    if let Some(id) = client_id {
        session.config.trakt.client_id = id;
    }
    if let Some(secret) = client_secret {
        session.config.trakt.client_secret = secret;
    }
    if !session.config.is_trakt_configured() {
        output.info("Create an API application at https://trakt.tv/oauth/applications");
        output.info("Use urn:ietf:wg:oauth:2.0:oob as the redirect URI");
        session.config.trakt.client_id = prompt_string("Trakt client ID", None)?;
        session.config.trakt.client_secret = prompt_secret("Trakt client secret")?;
    }

    if session.credentials.get_trakt_access_token().is_some()
        && !prompt_yes_no("A Trakt login is already stored, replace it?", false)?
    {
        output.info("Keeping the existing Trakt login");
        return Ok(());
    }

    let client_id = session.config.trakt.client_id.clone();
    let client_secret = session.config.trakt.client_secret.clone();
    let token = trakt_auth::device_login(&mut session.credentials, &client_id, &client_secret, |code| {
        output.info(format!(
            "Open {} and enter the code {}",
            code.verification_url.bright_blue(),
            code.user_code.bold()
        ));
        output.info("Waiting for approval...");
    })
    .await
    .map_err(|e| eyre!("Trakt login failed: {}", e))?;

    output.success(format!(
        "Trakt login saved, token valid until {}",
        token.expires_at.format("%Y-%m-%d")
    ));
    Ok(())
}
