use anyhow::Result;
use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Daily-rotated log file written next to stderr output
#[derive(Debug, Clone)]
pub struct LogFile {
    pub dir: PathBuf,
    /// Files are named `<prefix>.YYYY-MM-DD`
    pub prefix: String,
}

fn build_filter(verbose_level: u8, quiet: bool) -> EnvFilter {
    // 0 = info, 1 = debug (with hyper noise suppressed), 2+ = trace
    if quiet {
        return EnvFilter::new("error");
    }
    let default = match verbose_level {
        0 => "info",
        1 => "debug,hyper::proto::h1=warn,hyper::client::pool=warn",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn json_requested() -> bool {
    std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal())
}

pub fn init_logging(verbose_level: u8, quiet: bool, log_file: Option<LogFile>) -> Result<()> {
    let filter = build_filter(verbose_level, quiet);
    let json = json_requested();

    let stderr_layer = if json {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr)
            .boxed()
    };

    let file_layer = match log_file {
        Some(file) => {
            std::fs::create_dir_all(&file.dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, &file.dir, &file.prefix);
            let layer = if json {
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(appender)
                    .boxed()
            } else {
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(appender)
                    .boxed()
            };
            Some(layer)
        }
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
