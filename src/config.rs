use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::default_cache_dir;

/// What happens to reminders that reference a job when the job is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReminderCleanup {
    /// Leave them in place with a dangling `job_id`.
    #[default]
    Orphan,
    /// Delete them along with the job.
    Cascade,
}

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend, e.g. `https://api.example.com/api`.
    pub api_base_url: String,

    /// Per-request timeout on remote calls.
    pub request_timeout: Duration,

    /// Retries for mutation confirmations (create/update/delete). Loads
    /// never retry; they fall back to the cache.
    pub mutation_retries: u32,

    /// Initial retry backoff; doubles per attempt.
    pub retry_backoff: Duration,

    /// Directory for the cache blobs. Defaults to the platform data dir.
    pub cache_dir: PathBuf,

    pub reminder_cleanup: ReminderCleanup,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            request_timeout: Duration::from_secs(10),
            mutation_retries: 2,
            retry_backoff: Duration::from_millis(200),
            cache_dir: default_cache_dir(),
            reminder_cleanup: ReminderCleanup::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// - JOBTRACK_API_URL: base URL of the REST backend
    /// - JOBTRACK_TIMEOUT_SECS: per-request timeout
    /// - JOBTRACK_RETRIES: mutation confirmation retries
    /// - JOBTRACK_CACHE_DIR: cache blob directory
    /// - JOBTRACK_REMINDER_CLEANUP: "orphan" (default) or "cascade"
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: env::var("JOBTRACK_API_URL").unwrap_or(defaults.api_base_url),
            request_timeout: env::var("JOBTRACK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            mutation_retries: env::var("JOBTRACK_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.mutation_retries),
            retry_backoff: defaults.retry_backoff,
            cache_dir: env::var("JOBTRACK_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            reminder_cleanup: match env::var("JOBTRACK_REMINDER_CLEANUP").as_deref() {
                Ok("cascade") => ReminderCleanup::Cascade,
                _ => defaults.reminder_cleanup,
            },
        }
    }
}
