use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::cache::CacheSlot;
use crate::error::StoreError;
use crate::models::{Priority, Reminder, ReminderDraft, ReminderPatch, require};
use crate::remote::RemoteStore;
use crate::store::{Entity, EntityStore, Saved, SyncState};

impl Entity for Reminder {
    type Draft = ReminderDraft;
    type Patch = ReminderPatch;

    const KIND: &'static str = "reminders";

    fn validate(draft: &Self::Draft) -> Result<(), StoreError> {
        require("title", &draft.title)
    }

    fn from_draft(draft: &Self::Draft, id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        Reminder {
            id,
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            due_date: draft.due_date,
            kind: draft.kind,
            priority: draft.priority,
            is_completed: false,
            job_id: draft.job_id.clone(),
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
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        // Completion is one-way; a patch can set it but never clear it.
        if patch.is_completed == Some(true) {
            self.is_completed = true;
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Scheduled follow-ups and deadlines, optionally tied to jobs. Served by
/// the remote `/schedules` collection.
pub struct ReminderStore {
    inner: EntityStore<Reminder>,
}

impl ReminderStore {
    pub(crate) fn new(
        cache_dir: std::path::PathBuf,
        remote: &RemoteStore,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, StoreError> {
        let cache = CacheSlot::new(cache_dir, Reminder::KIND)?;
        let api = remote.collection::<Reminder>("schedules");
        Ok(Self {
            inner: EntityStore::new(cache, api, auth, Vec::new()),
        })
    }

    pub async fn load(&self) {
        self.inner.load().await;
    }

    pub async fn ensure_loaded(&self) {
        self.inner.ensure_loaded().await;
    }

    pub async fn add(&self, draft: ReminderDraft) -> Result<Saved<Reminder>, StoreError> {
        self.inner.add(draft).await
    }

    pub async fn update(
        &self,
        id: &str,
        patch: ReminderPatch,
    ) -> Result<Saved<Reminder>, StoreError> {
        self.inner.update(id, patch).await
    }

    /// Marks a reminder done. One-way: there is no un-complete.
    pub async fn complete(&self, id: &str) -> Result<Saved<Reminder>, StoreError> {
        let patch = ReminderPatch {
            is_completed: Some(true),
            ..Default::default()
        };
        self.inner.update(id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    /// Deletes every reminder referencing the given job. Used by the
    /// cascade cleanup policy.
    pub(crate) async fn delete_for_job(&self, job_id: &str) -> Result<usize, StoreError> {
        let linked: Vec<String> = self
            .inner
            .items()
            .into_iter()
            .filter(|r| r.job_id.as_deref() == Some(job_id))
            .map(|r| r.id)
            .collect();
        let mut removed = 0;
        for id in linked {
            match self.inner.delete(&id).await {
                Ok(()) => removed += 1,
                // Already gone is fine here.
                Err(StoreError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.inner.items()
    }

    pub fn get(&self, id: &str) -> Option<Reminder> {
        self.inner.get(id)
    }

    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.inner.sync_state(id)
    }

    /// Reminders not yet completed, in insertion order.
    pub fn active(&self) -> Vec<Reminder> {
        self.inner
            .items()
            .into_iter()
            .filter(|r| !r.is_completed)
            .collect()
    }

    /// Active reminders whose due date has passed.
    pub fn overdue(&self) -> Vec<Reminder> {
        let now = Utc::now();
        self.active()
            .into_iter()
            .filter(|r| r.due_date < now)
            .collect()
    }

    /// Active reminders due within the next 24 hours.
    pub fn upcoming(&self) -> Vec<Reminder> {
        let now = Utc::now();
        let horizon = now + Duration::hours(24);
        self.active()
            .into_iter()
            .filter(|r| r.due_date >= now && r.due_date <= horizon)
            .collect()
    }

    /// Badge count: active reminders.
    pub fn active_count(&self) -> usize {
        self.active().len()
    }

    pub fn high_priority_count(&self) -> usize {
        self.active()
            .iter()
            .filter(|r| r.priority == Priority::High)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;
    use crate::models::ReminderType;
    use std::time::Duration as StdDuration;

    fn store() -> (tempfile::TempDir, ReminderStore) {
        let tmp = tempfile::tempdir().unwrap();
        let remote = RemoteStore::new(
            "http://127.0.0.1:9",
            StdDuration::from_secs(1),
            0,
            StdDuration::from_millis(1),
        )
        .unwrap();
        let store = ReminderStore::new(
            tmp.path().to_path_buf(),
            &remote,
            Arc::new(StaticAuth::signed_out()),
        )
        .unwrap();
        (tmp, store)
    }

    fn draft(title: &str, due_in_hours: i64) -> ReminderDraft {
        ReminderDraft {
            title: title.to_string(),
            description: None,
            due_date: Utc::now() + Duration::hours(due_in_hours),
            kind: ReminderType::FollowUp,
            priority: Priority::Medium,
            job_id: None,
        }
    }

    #[tokio::test]
    async fn test_new_reminder_starts_incomplete() {
        let (_tmp, store) = store();
        let saved = store.add(draft("Call recruiter", 2)).await.unwrap();
        assert!(!saved.entity.is_completed);
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_is_one_way() {
        let (_tmp, store) = store();
        let saved = store.add(draft("Send thank-you note", 2)).await.unwrap();
        let id = saved.entity.id;

        let completed = store.complete(&id).await.unwrap();
        assert!(completed.entity.is_completed);
        assert_eq!(store.active_count(), 0);

        // A patch trying to clear completion is ignored.
        let patch = ReminderPatch {
            is_completed: Some(false),
            ..Default::default()
        };
        let after = store.update(&id, patch).await.unwrap();
        assert!(after.entity.is_completed);
    }

    #[tokio::test]
    async fn test_overdue_and_upcoming_buckets() {
        let (_tmp, store) = store();
        store.add(draft("overdue", -3)).await.unwrap();
        store.add(draft("soon", 5)).await.unwrap();
        store.add(draft("next week", 24 * 7)).await.unwrap();
        let done = store.add(draft("done but overdue", -1)).await.unwrap();
        store.complete(&done.entity.id).await.unwrap();

        let overdue: Vec<String> = store.overdue().into_iter().map(|r| r.title).collect();
        assert_eq!(overdue, vec!["overdue"]);

        let upcoming: Vec<String> = store.upcoming().into_iter().map(|r| r.title).collect();
        assert_eq!(upcoming, vec!["soon"]);
    }

    #[tokio::test]
    async fn test_high_priority_count_ignores_completed() {
        let (_tmp, store) = store();
        let mut high = draft("urgent", 1);
        high.priority = Priority::High;
        store.add(high).await.unwrap();

        let mut done = draft("was urgent", 1);
        done.priority = Priority::High;
        let saved = store.add(done).await.unwrap();
        store.complete(&saved.entity.id).await.unwrap();

        store.add(draft("normal", 1)).await.unwrap();

        assert_eq!(store.high_priority_count(), 1);
    }

    #[tokio::test]
    async fn test_reminder_requires_title() {
        let (_tmp, store) = store();
        let err = store.add(draft("", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "title" }));
    }

    #[tokio::test]
    async fn test_delete_for_job_only_touches_linked() {
        let (_tmp, store) = store();
        let mut linked = draft("prep interview", 4);
        linked.job_id = Some("job-1".to_string());
        store.add(linked).await.unwrap();

        let mut other = draft("other job", 4);
        other.job_id = Some("job-2".to_string());
        store.add(other).await.unwrap();

        store.add(draft("unlinked", 4)).await.unwrap();

        let removed = store.delete_for_job("job-1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.reminders().len(), 2);
        assert!(
            store
                .reminders()
                .iter()
                .all(|r| r.job_id.as_deref() != Some("job-1"))
        );
    }
}
