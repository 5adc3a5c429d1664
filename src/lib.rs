//! Data-synchronization core for a job-application tracker.
//!
//! Three entity stores (jobs, monthly goals, reminders) keep an in-memory
//! collection per signed-in user, apply mutations optimistically, confirm
//! them against a REST backend, and mirror every state to a local JSON
//! cache. Remote failures never surface as errors from `load`/`add`/
//! `update`/`delete`: the stores degrade to the cached (or seed) data and
//! report what happened through per-entity [`store::SyncState`].
//!
//! Wire a [`tracker::Tracker`] from a [`config::Config`] and an
//! [`auth::AuthProvider`] and share it across the application; it replaces
//! any notion of a global mutable store.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod goals;
pub mod jobs;
pub mod models;
pub mod reminders;
mod remote;
pub mod store;
pub mod tracker;

pub use auth::{AuthProvider, Session, StaticAuth};
pub use config::{Config, ReminderCleanup};
pub use error::StoreError;
pub use goals::{GoalStore, Progress};
pub use jobs::JobStore;
pub use models::{
    Goal, GoalDraft, GoalPatch, Job, JobDraft, JobPatch, JobStats, JobStatus, Priority, Reminder,
    ReminderDraft, ReminderPatch, ReminderType,
};
pub use reminders::ReminderStore;
pub use store::{Saved, SyncState};
pub use tracker::Tracker;
