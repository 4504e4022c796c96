use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::config::CallbackConfig;
use crate::coordinator::CallbackCoordinator;
use crate::session::SessionStore;
use crate::snapshot::CoordinatorSnapshot;

/// Everything that lives exactly as long as one session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    inner: Arc<SessionContextInner>,
}

#[derive(Debug)]
struct SessionContextInner {
    store: Arc<SessionStore>,
    config: CallbackConfig,
    callbacks: OnceLock<Arc<CallbackCoordinator>>,
}

impl SessionContext {
    fn new(id: &str, config: CallbackConfig) -> Self {
        Self {
            inner: Arc::new(SessionContextInner {
                store: Arc::new(SessionStore::new(id)),
                config,
                callbacks: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.store.id()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    /// The session's coordinator, created on first use.
    pub fn callbacks(&self) -> &Arc<CallbackCoordinator> {
        self.inner.callbacks.get_or_init(|| {
            Arc::new(CallbackCoordinator::new(
                self.inner.store.clone(),
                &self.inner.config,
            ))
        })
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.store.is_destroyed()
    }
}

/// Sessions keyed by id. Removing a session destroys its store, which
/// interrupts any poll still blocked on it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: CallbackConfig,
    sessions: Mutex<HashMap<String, SessionContext>>,
}

impl SessionRegistry {
    pub fn new(config: CallbackConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CallbackConfig {
        &self.config
    }

    /// Returns `None` if a session with this id already exists.
    pub fn create(&self, id: &str) -> Option<SessionContext> {
        let mut sessions = self.lock();
        if sessions.contains_key(id) {
            return None;
        }
        let context = SessionContext::new(id, self.config.clone());
        sessions.insert(id.to_string(), context.clone());
        tracing::info!(session_id = %id, "session created");
        Some(context)
    }

    pub fn get_or_create(&self, id: &str) -> SessionContext {
        let mut sessions = self.lock();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = %id, "session created");
                SessionContext::new(id, self.config.clone())
            })
            .clone()
    }

    /// Re-creates a session after a restart. Any session already registered
    /// under `id` is destroyed first.
    pub fn restore(&self, id: &str, snapshot: CoordinatorSnapshot) -> SessionContext {
        let context = SessionContext::new(id, self.config.clone());
        let callbacks = Arc::new(CallbackCoordinator::restore(
            context.inner.store.clone(),
            snapshot,
        ));
        // fresh context, nothing can have initialised it yet
        let _ = context.inner.callbacks.set(callbacks);

        let previous = self.lock().insert(id.to_string(), context.clone());
        if let Some(previous) = previous {
            previous.store().destroy();
        }
        tracing::info!(session_id = %id, "session restored");
        context
    }

    pub fn get(&self, id: &str) -> Option<SessionContext> {
        self.lock().get(id).cloned()
    }

    /// Returns `false` if no session with this id exists.
    pub fn destroy(&self, id: &str) -> bool {
        let Some(context) = self.lock().remove(id) else {
            return false;
        };
        context.store().destroy();
        tracing::info!(session_id = %id, "session destroyed");
        true
    }

    /// Destroys every session, interrupting all blocked polls. Returns how
    /// many sessions were removed.
    pub fn destroy_all(&self) -> usize {
        let sessions: Vec<SessionContext> = self.lock().drain().map(|(_, context)| context).collect();
        for context in &sessions {
            context.store().destroy();
        }
        tracing::info!(sessions = sessions.len(), "all sessions destroyed");
        sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionContext>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
