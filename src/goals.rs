use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::cache::CacheSlot;
use crate::error::StoreError;
use crate::models::{Goal, GoalDraft, GoalPatch, require};
use crate::remote::RemoteStore;
use crate::store::{Entity, EntityStore, Saved, SyncState};

impl Entity for Goal {
    type Draft = GoalDraft;
    type Patch = GoalPatch;

    const KIND: &'static str = "goals";

    fn validate(draft: &Self::Draft) -> Result<(), StoreError> {
        require("period", &draft.period)?;
        if draft.target == 0 {
            return Err(StoreError::Validation { field: "target" });
        }
        Ok(())
    }

    fn from_draft(draft: &Self::Draft, id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        Goal {
            id,
            user_id: user_id.to_string(),
            period: draft.period.clone(),
            target: draft.target,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(target) = patch.target {
            self.target = target;
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Progress against the current month's goal. `percentage` is unclamped
/// (125 means 25% over target); use [`Progress::display_percentage`] for a
/// progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percentage: u32,
    pub remaining: u32,
}

impl Progress {
    pub fn display_percentage(&self) -> u32 {
        self.percentage.min(100)
    }
}

/// Monthly application targets. At most one goal per calendar month:
/// setting a goal for a month that already has one replaces it.
pub struct GoalStore {
    inner: EntityStore<Goal>,
}

impl GoalStore {
    pub(crate) fn new(
        cache_dir: std::path::PathBuf,
        remote: &RemoteStore,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, StoreError> {
        let cache = CacheSlot::new(cache_dir, Goal::KIND)?;
        let api = remote.collection::<Goal>("goals");
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

    pub fn goals(&self) -> Vec<Goal> {
        self.inner.items()
    }

    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.inner.sync_state(id)
    }

    pub fn goal_for_period(&self, period: &str) -> Option<Goal> {
        self.inner.items().into_iter().find(|g| g.period == period)
    }

    pub fn current_month_goal(&self) -> Option<Goal> {
        self.goal_for_period(&current_period(Utc::now()))
    }

    /// Sets the application target for the current month, replacing any
    /// existing goal for the period rather than adding a second one.
    pub async fn set_monthly_goal(&self, target: u32) -> Result<Saved<Goal>, StoreError> {
        self.set_goal_for_period(&current_period(Utc::now()), target)
            .await
    }

    pub async fn set_goal_for_period(
        &self,
        period: &str,
        target: u32,
    ) -> Result<Saved<Goal>, StoreError> {
        match self.goal_for_period(period) {
            Some(existing) => {
                let patch = GoalPatch {
                    target: Some(target),
                };
                self.inner.update(&existing.id, patch).await
            }
            None => {
                let draft = GoalDraft {
                    period: period.to_string(),
                    target,
                };
                self.inner.add(draft).await
            }
        }
    }

    /// Removes the current month's goal. Returns false when none was set.
    pub async fn remove_monthly_goal(&self) -> Result<bool, StoreError> {
        match self.current_month_goal() {
            Some(goal) => {
                self.inner.delete(&goal.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Progress for the current month given how many applications were made
    /// this period. `{0, 0}` when no goal is set.
    pub fn monthly_progress(&self, applications_this_month: usize) -> Progress {
        let Some(goal) = self.current_month_goal() else {
            return Progress {
                percentage: 0,
                remaining: 0,
            };
        };
        let percentage =
            ((applications_this_month as f64 / goal.target as f64) * 100.0).round() as u32;
        let remaining = goal.target.saturating_sub(applications_this_month as u32);
        Progress {
            percentage,
            remaining,
        }
    }
}

fn current_period(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}
