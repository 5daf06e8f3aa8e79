use media_sync_sources::{SourceError, SourceResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Bounded retry of idempotent calls on transient transport errors
///
/// Retry `n` sleeps `1 + n` seconds, or the server's Retry-After when rate limited.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn delay(&self, retry: u32, error: &SourceError) -> Duration {
        match error.retry_after() {
            Some(seconds) => Duration::from_secs(seconds),
            None => Duration::from_secs(1 + retry as u64),
        }
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or the retry budget is spent
    ///
    /// `call` and `args` end up in the terminal error for diagnostics.
    pub async fn run<T, F, Fut>(&self, call: &str, args: &str, mut operation: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SourceResult<T>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    retry += 1;
                    if retry > self.max_retries {
                        return Err(SyncError::RetriesExhausted {
                            call: call.to_string(),
                            args: args.to_string(),
                            attempts: retry,
                            source: err,
                        });
                    }
                    let delay = self.delay(retry, &err);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        call, err, retry, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(SourceError::Unauthorized(message)) => return Err(SyncError::Auth(message)),
                Err(err) => return Err(err.into()),
            }
        }
    }
}
