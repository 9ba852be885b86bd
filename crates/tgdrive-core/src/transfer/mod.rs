//! Upload transfer engine: strategy selection, resumable session protocol,
//! chunk sequencing with resume and retry, and outcome classification.

pub mod chunking;
pub mod engine;
pub mod outcome;
pub mod progress;
pub mod range;

use std::time::Duration;

pub use engine::{TransferEngine, UploadRequest};
pub use outcome::ChunkOutcome;
pub use progress::Progress;

/// Matches the Telegram Bot API download limit.
pub const DEFAULT_RESUMABLE_THRESHOLD: u64 = 20 * 1024 * 1024;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_PROGRESS_STEP_PERCENT: u8 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Simple,
    Resumable,
}

/// Sizes strictly above `threshold` go resumable.
pub fn select_strategy(size: u64, threshold: u64) -> Strategy {
    if size > threshold {
        Strategy::Resumable
    } else {
        Strategy::Simple
    }
}

#[derive(Clone, Debug)]
pub struct TransferPolicy {
    pub resumable_threshold: u64,
    /// Already aligned; see `chunking::align_chunk_size`.
    pub chunk_size: u64,
    /// Attempts per request, including the first one.
    pub max_attempts: u32,
    /// Delay before retry `k` is `retry_base_delay * k`.
    pub retry_base_delay: Duration,
    pub progress_step_percent: u8,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            resumable_threshold: DEFAULT_RESUMABLE_THRESHOLD,
            chunk_size: chunking::DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            progress_step_percent: DEFAULT_PROGRESS_STEP_PERCENT,
        }
    }
}

impl TransferPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive_for_simple() {
        let t = DEFAULT_RESUMABLE_THRESHOLD;
        assert_eq!(select_strategy(0, t), Strategy::Simple);
        assert_eq!(select_strategy(10 * 1024 * 1024, t), Strategy::Simple);
        assert_eq!(select_strategy(t, t), Strategy::Simple);
        assert_eq!(select_strategy(t + 1, t), Strategy::Resumable);
        assert_eq!(select_strategy(25 * 1024 * 1024, t), Strategy::Resumable);
    }

    #[test]
    fn backoff_grows_with_attempt() {
        let p = TransferPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_secs(1));
        assert_eq!(p.backoff(2), Duration::from_secs(2));
    }
}
