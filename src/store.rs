use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::auth::{AuthProvider, Session};
use crate::cache::{ANONYMOUS_SCOPE, CacheSlot};
use crate::error::StoreError;
use crate::remote::EntityApi;

/// Whether an in-memory entity has been confirmed by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Matches the remote store's last response.
    Synced,
    /// Optimistically applied; a remote confirmation is in flight.
    Pending,
    /// Exists locally only. The next full load reconciles.
    LocalOnly,
}

/// Result of a mutation: the entity as currently known, plus whether the
/// remote store confirmed it. Callers can frame "saved" vs "saved locally,
/// will sync later" from `state`.
#[derive(Debug, Clone)]
pub struct Saved<T> {
    pub entity: T,
    pub state: SyncState,
}

/// Contract every synced entity type satisfies: construction from a draft,
/// typed patching, and timestamp bookkeeping.
pub(crate) trait Entity:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Draft: Serialize + Clone + Send + Sync;
    type Patch: Serialize + Clone + Send + Sync;

    /// Cache slot name and log label.
    const KIND: &'static str;

    fn validate(draft: &Self::Draft) -> Result<(), StoreError>;
    fn from_draft(draft: &Self::Draft, id: String, user_id: &str, now: DateTime<Utc>) -> Self;
    fn id(&self) -> &str;
    fn apply_patch(&mut self, patch: &Self::Patch);
    fn updated_at(&self) -> DateTime<Utc>;
    fn touch(&mut self, now: DateTime<Utc>);
}

struct Tracked<T> {
    entity: T,
    /// Bumped on every local write. A remote confirmation only lands if the
    /// revision it was issued against is still current, so a stale response
    /// can never overwrite a newer local state or resurrect a deleted entity.
    revision: u64,
    sync: SyncState,
}

struct State<T> {
    items: Vec<Tracked<T>>,
    loaded: bool,
    loading: bool,
    degraded: bool,
    next_revision: u64,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loaded: false,
            loading: false,
            degraded: false,
            next_revision: 0,
        }
    }
}

/// In-memory collection manager for one entity type: optimistic mutation,
/// remote confirmation, cache write-through, degrade-not-fail loads.
///
/// All methods take `&self`; the state lock is never held across an await,
/// so concurrent operations interleave safely and dropping an in-flight
/// future leaves the optimistic state intact.
pub(crate) struct EntityStore<T: Entity> {
    state: Mutex<State<T>>,
    cache: CacheSlot<T>,
    api: EntityApi<T>,
    auth: Arc<dyn AuthProvider>,
    seed: Vec<T>,
}

impl<T: Entity> EntityStore<T> {
    pub(crate) fn new(
        cache: CacheSlot<T>,
        api: EntityApi<T>,
        auth: Arc<dyn AuthProvider>,
        seed: Vec<T>,
    ) -> Self {
        Self {
            state: Mutex::new(State::default()),
            cache,
            api,
            auth,
            seed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap()
    }

    fn scope(&self) -> (Option<Session>, String) {
        let session = self.auth.session();
        let scope = session
            .as_ref()
            .map(|s| s.user_id.clone())
            .unwrap_or_else(|| ANONYMOUS_SCOPE.to_string());
        (session, scope)
    }

    fn snapshot_locked(state: &State<T>) -> Vec<T> {
        state.items.iter().map(|t| t.entity.clone()).collect()
    }

    fn write_cache(&self, scope: &str) {
        let snapshot = Self::snapshot_locked(&self.lock());
        self.cache.write(scope, &snapshot);
    }

    /// Loads the collection, refetching even if already loaded. Never fails:
    /// without a session or on any remote error it falls back to the cache,
    /// or to the built-in seed when the cache is empty.
    pub async fn load(&self) {
        {
            let mut state = self.lock();
            state.loading = true;
        }
        let (session, scope) = self.scope();

        let (items, from_remote) = match &session {
            None => (self.local_items(&scope), false),
            Some(session) => match self.api.list(&session.token).await {
                Ok(items) => (items, true),
                Err(err) => {
                    warn!(kind = T::KIND, %err, "remote list failed, using local data");
                    (self.local_items(&scope), false)
                }
            },
        };

        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let sync = if from_remote {
                SyncState::Synced
            } else {
                SyncState::LocalOnly
            };
            let mut tracked = Vec::with_capacity(items.len());
            for entity in items {
                let revision = state.next_revision;
                state.next_revision += 1;
                tracked.push(Tracked {
                    entity,
                    revision,
                    sync,
                });
            }
            state.items = tracked;
            state.degraded = !from_remote && session.is_some();
            state.loaded = true;
            state.loading = false;
        }
        self.write_cache(&scope);
        debug!(kind = T::KIND, from_remote, "collection loaded");
    }

    /// Loads once; later calls are no-ops while a load is running or after
    /// one has finished. `load` refetches unconditionally.
    pub async fn ensure_loaded(&self) {
        {
            let state = self.lock();
            if state.loaded || state.loading {
                return;
            }
        }
        self.load().await;
    }

    fn local_items(&self, scope: &str) -> Vec<T> {
        match self.cache.read(scope) {
            Some(items) => items,
            None => self.seed.clone(),
        }
    }

    /// Optimistically inserts a provisional entity, then confirms with the
    /// remote store. On confirmation the provisional entity is replaced in
    /// its slot by the server's copy; on failure it stays, marked
    /// [`SyncState::LocalOnly`].
    pub async fn add(&self, draft: T::Draft) -> Result<Saved<T>, StoreError> {
        T::validate(&draft)?;
        let (session, scope) = self.scope();
        let now = Utc::now();

        let provisional_id = local_id();
        let entity = T::from_draft(&draft, provisional_id.clone(), &scope, now);
        let issued_revision;
        {
            let mut state = self.lock();
            issued_revision = state.next_revision;
            state.next_revision += 1;
            state.items.push(Tracked {
                entity: entity.clone(),
                revision: issued_revision,
                sync: if session.is_some() {
                    SyncState::Pending
                } else {
                    SyncState::LocalOnly
                },
            });
        }
        self.write_cache(&scope);

        let Some(session) = session else {
            return Ok(Saved {
                entity,
                state: SyncState::LocalOnly,
            });
        };

        match self.api.create(&session.token, &draft).await {
            Ok(confirmed) => {
                let orphaned = {
                    let mut state = self.lock();
                    match state
                        .items
                        .iter_mut()
                        .find(|t| t.entity.id() == provisional_id)
                    {
                        Some(tracked) if tracked.revision == issued_revision => {
                            tracked.entity = confirmed.clone();
                            tracked.sync = SyncState::Synced;
                            None
                        }
                        // Edited while the create was in flight: the newer
                        // local write wins, next load reconciles.
                        Some(tracked) => {
                            tracked.sync = SyncState::LocalOnly;
                            None
                        }
                        // Deleted while the create was in flight; the server
                        // copy must not come back.
                        None => Some(confirmed.id().to_string()),
                    }
                };
                if let Some(remote_id) = orphaned {
                    warn!(kind = T::KIND, id = %remote_id, "entity deleted before create confirmed");
                    if let Err(err) = self.api.delete(&session.token, &remote_id).await {
                        warn!(kind = T::KIND, id = %remote_id, %err, "failed to remove orphaned remote entity");
                    }
                    return Ok(Saved {
                        entity,
                        state: SyncState::LocalOnly,
                    });
                }
                self.write_cache(&scope);
                Ok(Saved {
                    entity: confirmed,
                    state: SyncState::Synced,
                })
            }
            Err(err) => {
                warn!(kind = T::KIND, %err, "create not confirmed, keeping local copy");
                {
                    let mut state = self.lock();
                    if let Some(tracked) = state
                        .items
                        .iter_mut()
                        .find(|t| t.entity.id() == provisional_id)
                    {
                        tracked.sync = SyncState::LocalOnly;
                    }
                }
                self.write_cache(&scope);
                Ok(Saved {
                    entity,
                    state: SyncState::LocalOnly,
                })
            }
        }
    }

    /// Optimistically merges `patch`, bumping `updated_at` monotonically,
    /// then confirms with the remote store. The server response is preferred
    /// when it arrives and is still current; a stale or failed confirmation
    /// leaves the optimistic merge standing.
    pub async fn update(&self, id: &str, patch: T::Patch) -> Result<Saved<T>, StoreError> {
        let (session, scope) = self.scope();
        let issued_revision;
        let optimistic;
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let next_revision = state.next_revision;
            let tracked = state
                .items
                .iter_mut()
                .find(|t| t.entity.id() == id)
                .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
            tracked.entity.apply_patch(&patch);
            // Wall clocks can step backwards; updated_at may not.
            let now = Utc::now().max(tracked.entity.updated_at());
            tracked.entity.touch(now);
            tracked.revision = next_revision;
            tracked.sync = if session.is_some() {
                SyncState::Pending
            } else {
                SyncState::LocalOnly
            };
            issued_revision = next_revision;
            state.next_revision += 1;
            optimistic = tracked.entity.clone();
        }
        self.write_cache(&scope);

        let Some(session) = session else {
            return Ok(Saved {
                entity: optimistic,
                state: SyncState::LocalOnly,
            });
        };

        match self.api.update(&session.token, id, &patch).await {
            Ok(confirmed) => {
                let applied = {
                    let mut state = self.lock();
                    match state.items.iter_mut().find(|t| t.entity.id() == id) {
                        Some(tracked) if tracked.revision == issued_revision => {
                            // Keep updated_at monotonic even if the server
                            // clock lags the optimistic bump.
                            let floor = tracked.entity.updated_at();
                            tracked.entity = confirmed;
                            if tracked.entity.updated_at() < floor {
                                tracked.entity.touch(floor);
                            }
                            tracked.sync = SyncState::Synced;
                            Some(tracked.entity.clone())
                        }
                        _ => None,
                    }
                };
                match applied {
                    Some(entity) => {
                        self.write_cache(&scope);
                        Ok(Saved {
                            entity,
                            state: SyncState::Synced,
                        })
                    }
                    None => {
                        debug!(kind = T::KIND, id, "dropping stale update confirmation");
                        Ok(Saved {
                            entity: optimistic,
                            state: SyncState::LocalOnly,
                        })
                    }
                }
            }
            Err(err) => {
                warn!(kind = T::KIND, id, %err, "update not confirmed, keeping optimistic state");
                {
                    let mut state = self.lock();
                    if let Some(tracked) = state
                        .items
                        .iter_mut()
                        .find(|t| t.entity.id() == id && t.revision == issued_revision)
                    {
                        tracked.sync = SyncState::LocalOnly;
                    }
                }
                self.write_cache(&scope);
                Ok(Saved {
                    entity: optimistic,
                    state: SyncState::LocalOnly,
                })
            }
        }
    }

    /// Optimistically removes the entity, then tells the remote store. The
    /// removal is never reversed, even when the remote delete fails.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let (session, scope) = self.scope();
        {
            let mut state = self.lock();
            let pos = state
                .items
                .iter()
                .position(|t| t.entity.id() == id)
                .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
            state.items.remove(pos);
        }
        self.write_cache(&scope);

        if let Some(session) = session {
            // Provisional entities never reached the server.
            if !is_provisional(id) {
                if let Err(err) = self.api.delete(&session.token, id).await {
                    warn!(kind = T::KIND, id, %err, "remote delete failed, local removal stands");
                }
            }
        }
        Ok(())
    }

    /// Snapshot of the collection in insertion order.
    pub fn items(&self) -> Vec<T> {
        Self::snapshot_locked(&self.lock())
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.lock()
            .items
            .iter()
            .find(|t| t.entity.id() == id)
            .map(|t| t.entity.clone())
    }

    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.lock()
            .items
            .iter()
            .find(|t| t.entity.id() == id)
            .map(|t| t.sync)
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// True when the last authenticated load fell back to local data.
    pub fn is_degraded(&self) -> bool {
        self.lock().degraded
    }
}

/// Provisional identity for an entity awaiting its server-assigned id.
fn local_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("local-{}", suffix.to_lowercase())
}

pub fn is_provisional(id: &str) -> bool {
    id.starts_with("local-")
}
