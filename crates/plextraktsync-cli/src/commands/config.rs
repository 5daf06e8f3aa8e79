use super::session::Session;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Table};
use media_sync_config::{Config, CredentialStore, PathManager};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn show_config(paths: &PathManager, full: bool, output: &Output) -> Result<()> {
    let session = Session::load(paths)?;
    let config_file = paths.config_file();
    if !config_file.exists() {
        output.warn(format!(
            "Configuration file not found at {}, showing defaults",
            config_file.display()
        ));
    }

    let secret = |value: &str| if full { value.to_string() } else { mask_string(value) };

    if !output.is_human() {
        let mut config = serde_json::to_value(&session.config).map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        config["trakt"]["client_secret"] = json!(secret(session.config.trakt.client_secret.as_str()));
        output.json(&json!({
            "config_file": config_file.display().to_string(),
            "credentials_file": paths.credentials_file().display().to_string(),
            "config": config,
            "credentials": credentials_json(&session.credentials, &secret),
        }));
        return Ok(());
    }

    print_section_header("Paths", output);
    output.info(
        table(vec![
            ("Config file", config_file.display().to_string()),
            ("Credentials", paths.credentials_file().display().to_string()),
            ("HTTP cache", paths.http_cache_file().display().to_string()),
            ("Logs", paths.log_dir().display().to_string()),
        ])
        .to_string(),
    );

    print_section_header("Plex", output);
    output.info(plex_table(&session, &secret).to_string());

    print_section_header("Trakt", output);
    let credentials = &session.credentials;
    output.info(
        table(vec![
            ("Client ID", session.config.trakt.client_id.clone()),
            ("Client Secret", secret(session.config.trakt.client_secret.as_str())),
            (
                "Access Token",
                secret(credentials.get_trakt_access_token().map(String::as_str).unwrap_or("")),
            ),
            (
                "Token Expires",
                credentials
                    .get_trakt_token_expires()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "<not set>".to_string()),
            ),
        ])
        .to_string(),
    );

    print_section_header("Sync", output);
    output.info(sync_table(&session.config).to_string());

    print_section_header("Watch", output);
    let watch = &session.config.watch;
    output.info(
        table(vec![
            ("Scrobble threshold", format!("{}%", watch.scrobble_threshold)),
            ("Add to collection", yes_no(watch.add_collection)),
            ("Remove from collection", yes_no(watch.remove_collection)),
            ("Own sessions only", yes_no(watch.username_filter)),
            ("Progress bars", yes_no(watch.media_progressbar)),
            ("Restart interval", format!("{}s", watch.restart_interval)),
        ])
        .to_string(),
    );

    Ok(())
}

fn plex_table(session: &Session, secret: &dyn Fn(&str) -> String) -> Table {
    let plex = &session.config.plex;
    table(vec![
        ("Server URL", session.plex_server_url().unwrap_or_else(|| "<not set>".to_string())),
        ("Username", plex.username.clone().unwrap_or_else(|| "<any>".to_string())),
        (
            "Token",
            secret(session.credentials.get_plex_token().map(String::as_str).unwrap_or("")),
        ),
        ("Timeout", format!("{}s", plex.timeout_seconds)),
        ("Page size", plex.page_size.to_string()),
        (
            "Excluded libraries",
            if session.config.excluded_libraries.is_empty() {
                "<none>".to_string()
            } else {
                session.config.excluded_libraries.join(", ")
            },
        ),
    ])
}

fn sync_table(config: &Config) -> Table {
    let sync = &config.sync;
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Setting").add_attribute(Attribute::Bold),
        Cell::new("Plex → Trakt").add_attribute(Attribute::Bold),
        Cell::new("Trakt → Plex").add_attribute(Attribute::Bold),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    let rows = [
        ("Collection", yes_no(sync.plex_to_trakt.collection), "-".to_string()),
        ("Clear collected", yes_no(sync.plex_to_trakt.clear_collected), "-".to_string()),
        (
            "Watched status",
            yes_no(sync.plex_to_trakt.watched_status),
            yes_no(sync.trakt_to_plex.watched_status),
        ),
        ("Ratings", yes_no(sync.plex_to_trakt.ratings), yes_no(sync.trakt_to_plex.ratings)),
        ("Watchlist", yes_no(sync.plex_to_trakt.watchlist), yes_no(sync.trakt_to_plex.watchlist)),
        ("Watchlist as playlist", "-".to_string(), yes_no(sync.trakt_to_plex.watchlist_as_playlist)),
        ("Liked lists", "-".to_string(), yes_no(sync.trakt_to_plex.liked_lists)),
        ("Playback progress", "-".to_string(), yes_no(sync.sync_playback_status)),
    ];
    for (name, to_trakt, to_plex) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(to_trakt), Cell::new(to_plex)]);
    }
    table.add_row(vec![
        Cell::new("Rating priority"),
        Cell::new(sync.rating_priority.to_string()),
        Cell::new(""),
    ]);
    table
}

fn credentials_json(credentials: &CredentialStore, secret: &dyn Fn(&str) -> String) -> serde_json::Value {
    let mut keys = credentials.get_all_keys();
    keys.sort();
    let entries: serde_json::Map<String, serde_json::Value> = keys
        .into_iter()
        .filter_map(|key| {
            let value = credentials.get(&key)?;
            Some((key, json!(secret(value.as_str()))))
        })
        .collect();
    serde_json::Value::Object(entries)
}

fn table(rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    table
}

fn yes_no(enabled: bool) -> String {
    let text = if enabled { "yes" } else { "no" };
    text.to_string()
}

fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

pub fn print_section_header(title: &str, output: &Output) {
    output.info("");
    output.info(format!("{}", title.bold().bright_cyan()));
    output.info(format!("{}", "─".repeat(title.len()).bright_cyan()));
}
