use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::StoreError;

/// One persistent JSON blob per (entity kind, user scope): the last-known-good
/// collection, read whole and written whole. Serves as the data source when
/// the remote store is unreachable or nobody is signed in.
///
/// Slots are namespaced by user id so two accounts on one machine never see
/// each other's data; the signed-out scope is a fixed anonymous namespace.
pub struct CacheSlot<T> {
    dir: PathBuf,
    kind: &'static str,
    _marker: PhantomData<T>,
}

/// Scope used when no user is signed in.
pub const ANONYMOUS_SCOPE: &str = "anonymous";

/// Platform data directory for cache blobs, or a dotdir fallback when the
/// platform conventions cannot be resolved.
pub fn default_cache_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".jobtrack")
    }
}

impl<T> CacheSlot<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(dir: PathBuf, kind: &'static str) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            kind,
            _marker: PhantomData,
        })
    }

    fn path_for(&self, scope: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.json", self.kind, sanitize(scope)))
    }

    /// Last cached collection for `scope`, or `None` when nothing usable is
    /// on disk. A corrupt blob is treated as empty, not as an error.
    pub fn read(&self, scope: &str) -> Option<Vec<T>> {
        let path = self.path_for(scope);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(items) => Some(items),
            Err(err) => {
                warn!(kind = self.kind, path = %path.display(), %err, "discarding corrupt cache blob");
                None
            }
        }
    }

    /// Mirrors the collection to disk. Best effort: a failed write is logged
    /// and swallowed so a full disk never breaks an in-memory mutation.
    pub fn write(&self, scope: &str, items: &[T]) {
        let path = self.path_for(scope);
        let payload = match serde_json::to_string(items) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(kind = self.kind, %err, "failed to serialize cache blob");
                return;
            }
        };
        if let Err(err) = fs::write(&path, payload) {
            warn!(kind = self.kind, path = %path.display(), %err, "failed to write cache blob");
        } else {
            debug!(kind = self.kind, scope, count = items.len(), "cache updated");
        }
    }
}

fn sanitize(scope: &str) -> String {
    scope
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
