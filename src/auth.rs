use std::sync::RwLock;

/// An authenticated identity: who the data belongs to, and the bearer token
/// the remote store expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

/// Identity collaborator. The stores are passive consumers: no session means
/// remote calls are skipped and local data is used instead.
pub trait AuthProvider: Send + Sync {
    /// Current session, if the user is signed in with a valid token.
    fn session(&self) -> Option<Session>;
}

/// Process-local auth state, for embedding and tests. Real deployments wrap
/// their identity provider's SDK in an `AuthProvider` impl instead.
#[derive(Debug, Default)]
pub struct StaticAuth {
    session: RwLock<Option<Session>>,
}

impl StaticAuth {
    /// Signed-out state.
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session: RwLock::new(Some(Session {
                user_id: user_id.into(),
                token: token.into(),
            })),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>, token: impl Into<String>) {
        *self.session.write().unwrap() = Some(Session {
            user_id: user_id.into(),
            token: token.into(),
        });
    }

    pub fn sign_out(&self) {
        *self.session.write().unwrap() = None;
    }
}

impl AuthProvider for StaticAuth {
    fn session(&self) -> Option<Session> {
        self.session.read().unwrap().clone()
    }
}
