use media_sync_sources::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad filter, unknown library or invalid option
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{call}({args}) failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        call: String,
        args: String,
        attempts: u32,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Write queue is closed")]
    QueueClosed,
}

impl SyncError {
    /// Errors that abort the whole command instead of skipping one item
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Source(SourceError::Unauthorized(_)) => true,
            SyncError::Source(_) => false,
            _ => true,
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
