pub mod cache;
pub mod config;
pub mod login;
pub mod prompts;
pub mod session;
pub mod sync;
pub mod sync_ui;
pub mod watch;
