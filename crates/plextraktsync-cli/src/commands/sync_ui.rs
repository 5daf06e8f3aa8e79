use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use media_sync_core::{PlayState, PlaybackUpdate, WalkProgress, WalkStats};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Walked items between two progress log lines in non-interactive mode
const LOG_EVERY: usize = 250;

/// Spinner showing the item being walked
pub struct SyncUI {
    spinner: ProgressBar,
    interactive: bool,
}

impl SyncUI {
    pub fn new() -> Self {
        let interactive = is_interactive();

        let spinner = if interactive {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner.set_message("Starting sync...");
            spinner
        } else {
            tracing::info!(
                operation = "ui_init",
                mode = "non_interactive",
                "Running in non-interactive mode - progress bars disabled, using structured logging"
            );
            ProgressBar::hidden()
        };

        Self { spinner, interactive }
    }

    /// Callback for the walker
    pub fn walk_progress(&self) -> WalkProgress {
        let spinner = self.spinner.clone();
        let interactive = self.interactive;
        Arc::new(move |stats: &WalkStats, label: &str| {
            if interactive {
                spinner.set_message(progress_message(stats, label));
            } else if stats.walked % LOG_EVERY == 0 {
                tracing::info!(
                    operation = "progress",
                    walked = stats.walked,
                    resolved = stats.resolved,
                    skipped = stats.skipped,
                    "Sync progress update"
                );
            }
        })
    }

    pub fn finish(&self) {
        if self.interactive {
            self.spinner.finish_and_clear();
        }
    }
}

fn progress_message(stats: &WalkStats, label: &str) -> String {
    format!(
        "{} walked, {} matched, {} skipped | {}",
        stats.walked, stats.resolved, stats.skipped, label
    )
}

/// One bar per active playback session while `watch` runs
pub struct PlaybackBars {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl PlaybackBars {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    /// Consume updates until every sender is dropped
    pub async fn run(mut self, mut updates: mpsc::UnboundedReceiver<PlaybackUpdate>) {
        while let Some(update) = updates.recv().await {
            self.apply(update);
        }
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
    }

    fn apply(&mut self, update: PlaybackUpdate) {
        if update.state == PlayState::Stopped {
            if let Some(bar) = self.bars.remove(&update.session_key) {
                bar.finish_and_clear();
            }
            return;
        }

        let multi = &self.multi;
        let bar = self.bars.entry(update.session_key.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{prefix:.cyan} [{wide_bar:.yellow/blue}] {pos}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            bar
        });
        bar.set_prefix(update.label);
        bar.set_position(update.percent.clamp(0.0, 100.0).round() as u64);
        bar.set_message(update.state.as_str());
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
