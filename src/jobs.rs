use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::cache::CacheSlot;
use crate::error::StoreError;
use crate::models::{Job, JobDraft, JobPatch, JobStats, JobStatus, require};
use crate::remote::RemoteStore;
use crate::store::{Entity, EntityStore, Saved, SyncState};

impl Entity for Job {
    type Draft = JobDraft;
    type Patch = JobPatch;

    const KIND: &'static str = "jobs";

    fn validate(draft: &Self::Draft) -> Result<(), StoreError> {
        require("title", &draft.title)?;
        require("company", &draft.company)?;
        Ok(())
    }

    fn from_draft(draft: &Self::Draft, id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        Job {
            id,
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            company: draft.company.clone(),
            location: draft.location.clone(),
            salary: draft.salary.clone(),
            status: draft.status.unwrap_or(JobStatus::Applied),
            applied_date: draft.applied_date.unwrap_or(now),
            notes: draft.notes.clone(),
            job_url: draft.job_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(company) = &patch.company {
            self.company = company.clone();
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        if let Some(salary) = &patch.salary {
            self.salary = Some(salary.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(applied_date) = patch.applied_date {
            self.applied_date = applied_date;
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(job_url) = &patch.job_url {
            self.job_url = Some(job_url.clone());
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Starter collection shown the first time someone opens the tracker signed
/// out with nothing cached.
fn seed_jobs() -> Vec<Job> {
    let entries = [
        (
            "seed-1",
            "Senior Backend Engineer",
            "TechCorp Inc.",
            "San Francisco, CA",
            JobStatus::Interviewing,
            (2024, 1, 15),
        ),
        (
            "seed-2",
            "Rust Developer",
            "StartupXYZ",
            "Remote",
            JobStatus::Applied,
            (2024, 1, 20),
        ),
        (
            "seed-3",
            "Platform Engineer",
            "MegaCorp",
            "New York, NY",
            JobStatus::Offer,
            (2024, 1, 10),
        ),
    ];
    entries
        .into_iter()
        .map(|(id, title, company, location, status, (y, m, d))| {
            let t = Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();
            Job {
                id: id.to_string(),
                user_id: "demo-user".to_string(),
                title: title.to_string(),
                company: company.to_string(),
                location: Some(location.to_string()),
                salary: None,
                status,
                applied_date: t,
                notes: None,
                job_url: None,
                created_at: t,
                updated_at: t,
            }
        })
        .collect()
}

/// Tracked job applications for the current user.
pub struct JobStore {
    inner: EntityStore<Job>,
}

impl JobStore {
    pub(crate) fn new(
        cache_dir: std::path::PathBuf,
        remote: &RemoteStore,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, StoreError> {
        let cache = CacheSlot::new(cache_dir, Job::KIND)?;
        let api = remote.collection::<Job>("jobs");
        Ok(Self {
            inner: EntityStore::new(cache, api, auth, seed_jobs()),
        })
    }

    pub async fn load(&self) {
        self.inner.load().await;
    }

    pub async fn ensure_loaded(&self) {
        self.inner.ensure_loaded().await;
    }

    pub async fn add(&self, draft: JobDraft) -> Result<Saved<Job>, StoreError> {
        self.inner.add(draft).await
    }

    pub async fn update(&self, id: &str, patch: JobPatch) -> Result<Saved<Job>, StoreError> {
        self.inner.update(id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.inner.items()
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.inner.get(id)
    }

    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.inner.sync_state(id)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    pub fn is_degraded(&self) -> bool {
        self.inner.is_degraded()
    }

    /// Jobs with the given status, in insertion order.
    pub fn jobs_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.inner
            .items()
            .into_iter()
            .filter(|job| job.status == status)
            .collect()
    }

    pub fn stats(&self) -> JobStats {
        let jobs = self.inner.items();
        let count = |status| jobs.iter().filter(|j| j.status == status).count();
        JobStats {
            total: jobs.len(),
            applied: count(JobStatus::Applied),
            interviewing: count(JobStatus::Interviewing),
            offers: count(JobStatus::Offer),
            rejected: count(JobStatus::Rejected),
        }
    }

    /// Applications whose applied date falls in the current calendar month.
    pub fn applications_this_month(&self) -> usize {
        self.applications_in_month(Utc::now())
    }

    pub(crate) fn applications_in_month(&self, at: DateTime<Utc>) -> usize {
        self.inner
            .items()
            .iter()
            .filter(|job| {
                job.applied_date.year() == at.year() && job.applied_date.month() == at.month()
            })
            .count()
    }
}
