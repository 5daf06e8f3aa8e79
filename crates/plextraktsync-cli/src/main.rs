use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use commands::{cache, config, login, sync, watch};
use media_sync_config::PathManager;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "plextraktsync")]
#[command(about = "Two-way sync between Plex Media Server and Trakt")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// What a `sync` run walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncKind {
    All,
    Movies,
    #[value(alias = "tv")]
    Shows,
    Watchlist,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync Plex libraries with Trakt (one-time run)
    #[command(long_about = "Walk the Plex libraries, match every item to Trakt and reconcile collection, watched status, ratings, playback progress, watchlist and lists in the directions enabled in the configuration. Any filter makes the run partial, which skips plugins that need a view of the whole library.")]
    Sync {
        /// Only walk this library section (repeatable)
        #[arg(long = "library", value_name = "NAME")]
        libraries: Vec<String>,

        /// Only walk the show with this title (repeatable)
        #[arg(long = "show", value_name = "TITLE")]
        shows: Vec<String>,

        /// Only walk the movie with this title (repeatable)
        #[arg(long = "movie", value_name = "TITLE")]
        movies: Vec<String>,

        /// Only walk the item with this Plex rating key (repeatable)
        #[arg(long = "id", value_name = "RATING_KEY")]
        ids: Vec<u64>,

        /// Which media to walk (repeatable)
        #[arg(long = "sync", value_enum, default_value = "all")]
        kinds: Vec<SyncKind>,

        /// Read everything and report what would change without writing
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Listen to Plex playback events and scrobble them to Trakt
    #[command(long_about = "Subscribe to the Plex server notification stream and translate playback, library and timeline events into Trakt scrobbles and collection updates. Runs until interrupted with Ctrl-C; the connection is re-established when the stream drops.")]
    Watch,
    /// Authenticate with Plex and Trakt
    #[command(long_about = "Store a Plex token and server URL, then run the Trakt device-code login. You need a Trakt API application (https://trakt.tv/oauth/applications) for the client id and secret.")]
    Login {
        /// Plex token (prompted when omitted)
        #[arg(long)]
        plex_token: Option<String>,

        /// Plex server URL (prompted when omitted)
        #[arg(long)]
        server_url: Option<String>,

        /// Trakt client id (prompted when not configured)
        #[arg(long)]
        client_id: Option<String>,

        /// Trakt client secret (prompted when not configured)
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Manage the Trakt HTTP response cache
    Cache {
        #[command(subcommand)]
        cmd: CacheCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (secrets masked)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete the persisted HTTP cache
    Clear,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let paths = PathManager::default();

    let log_file = match cli.command {
        Commands::Watch => Some(logging::LogFile {
            dir: paths.log_dir(),
            prefix: paths.watch_log_prefix().to_string(),
        }),
        _ => None,
    };
    logging::init_logging(cli.verbose, cli.quiet, log_file).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    let result = match cli.command {
        Commands::Sync {
            libraries,
            shows,
            movies,
            ids,
            kinds,
            dry_run,
        } => {
            let filters = sync::walk_filters(libraries, shows, movies, ids, &kinds);
            sync::run_sync(&paths, filters, dry_run, &output).await
        }
        Commands::Watch => watch::run_watch(&paths, &output).await,
        Commands::Login {
            plex_token,
            server_url,
            client_id,
            client_secret,
        } => {
            let args = login::LoginArgs {
                plex_token,
                server_url,
                client_id,
                client_secret,
            };
            login::run_login(&paths, args, &output).await
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show { full } => config::show_config(&paths, full, &output),
        },
        Commands::Cache { cmd } => match cmd {
            CacheCommands::Clear => cache::clear_cache(&paths, &output),
        },
    };

    // scripts reading --output json get the failure on stdout as well
    if let Err(e) = &result {
        if !output.is_human() {
            output.error(format!("{:#}", e));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_flags_parse() {
        let cli = Cli::try_parse_from([
            "plextraktsync",
            "sync",
            "--library",
            "Movies",
            "--id",
            "42",
            "--sync",
            "tv",
            "--sync",
            "watchlist",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Sync {
                libraries,
                ids,
                kinds,
                dry_run,
                ..
            } => {
                assert_eq!(libraries, vec!["Movies"]);
                assert_eq!(ids, vec![42]);
                assert_eq!(kinds, vec![SyncKind::Shows, SyncKind::Watchlist]);
                assert!(dry_run);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_sync_defaults_to_all() {
        let cli = Cli::try_parse_from(["plextraktsync", "sync"]).unwrap();
        match cli.command {
            Commands::Sync { kinds, dry_run, .. } => {
                assert_eq!(kinds, vec![SyncKind::All]);
                assert!(!dry_run);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_global_output_flag() {
        let cli = Cli::try_parse_from(["plextraktsync", "watch", "--output", "json-pretty", "-vv"]).unwrap();
        assert_eq!(cli.output, output::OutputFormat::JsonPretty);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_usage_error() {
        let err = Cli::try_parse_from(["plextraktsync", "sync", "--sync", "music"])
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 2);
    }
}
