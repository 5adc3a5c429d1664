use std::sync::Arc;
use tracing::info;

use crate::auth::AuthProvider;
use crate::config::{Config, ReminderCleanup};
use crate::error::StoreError;
use crate::goals::{GoalStore, Progress};
use crate::jobs::JobStore;
use crate::reminders::ReminderStore;
use crate::remote::RemoteStore;

/// The application's data layer: one store per entity type sharing a single
/// auth provider, HTTP client and cache directory.
///
/// Consumers hold and pass around a `Tracker` (usually in an `Arc`) instead
/// of reaching for globals, so multiple views stay consistent and tests can
/// build isolated instances.
pub struct Tracker {
    pub jobs: JobStore,
    pub goals: GoalStore,
    pub reminders: ReminderStore,
    reminder_cleanup: ReminderCleanup,
}

impl Tracker {
    pub fn new(config: Config, auth: Arc<dyn AuthProvider>) -> Result<Self, StoreError> {
        let remote = RemoteStore::new(
            &config.api_base_url,
            config.request_timeout,
            config.mutation_retries,
            config.retry_backoff,
        )?;
        let jobs = JobStore::new(config.cache_dir.clone(), &remote, auth.clone())?;
        let goals = GoalStore::new(config.cache_dir.clone(), &remote, auth.clone())?;
        let reminders = ReminderStore::new(config.cache_dir.clone(), &remote, auth)?;
        info!(api = %config.api_base_url, cache = %config.cache_dir.display(), "tracker ready");
        Ok(Self {
            jobs,
            goals,
            reminders,
            reminder_cleanup: config.reminder_cleanup,
        })
    }

    /// Loads all three collections concurrently.
    pub async fn load_all(&self) {
        tokio::join!(self.jobs.load(), self.goals.load(), self.reminders.load());
    }

    /// Deletes a job, applying the configured reminder cleanup policy to
    /// reminders that reference it.
    pub async fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        self.jobs.delete(id).await?;
        match self.reminder_cleanup {
            ReminderCleanup::Orphan => {}
            ReminderCleanup::Cascade => {
                let removed = self.reminders.delete_for_job(id).await?;
                if removed > 0 {
                    info!(job_id = id, removed, "cascaded job deletion to reminders");
                }
            }
        }
        Ok(())
    }

    /// Progress against this month's goal, derived from the jobs applied
    /// this calendar month.
    pub fn monthly_progress(&self) -> Progress {
        self.goals
            .monthly_progress(self.jobs.applications_this_month())
    }
}
