use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// Callback fired when a session is destroyed.
pub trait DestroyListener: Send + Sync {
    fn on_destroy(&self);
}

impl DestroyListener for CancellationToken {
    fn on_destroy(&self) {
        self.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Destroy notifications of a session store.
///
/// A listener fires at most once, and only if the session is destroyed
/// before the listener is removed.
pub trait SessionLifecycle: Send + Sync {
    fn add_destroy_listener(&self, listener: Arc<dyn DestroyListener>) -> ListenerId;

    /// Returns `false` if the listener was not registered (already removed or
    /// already fired).
    fn remove_destroy_listener(&self, id: ListenerId) -> bool;
}

#[derive(Default)]
struct StoreState {
    destroyed: bool,
    next_listener: u64,
    listeners: HashMap<ListenerId, Arc<dyn DestroyListener>>,
}

/// In-memory session store owning the destroy listeners of one session.
pub struct SessionStore {
    id: String,
    state: Mutex<StoreState>,
}

impl SessionStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Fires every attached listener once. Listeners added afterwards fire
    /// immediately. Returns `false` if the store was already destroyed.
    pub fn destroy(&self) -> bool {
        let listeners = {
            let mut state = self.lock();
            if state.destroyed {
                return false;
            }
            state.destroyed = true;
            std::mem::take(&mut state.listeners)
        };

        tracing::debug!(
            session_id = %self.id,
            listeners = listeners.len(),
            "session store: notifying destroy listeners"
        );
        for listener in listeners.into_values() {
            listener.on_destroy();
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionLifecycle for SessionStore {
    fn add_destroy_listener(&self, listener: Arc<dyn DestroyListener>) -> ListenerId {
        let mut state = self.lock();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        if state.destroyed {
            drop(state);
            listener.on_destroy();
        } else {
            state.listeners.insert(id, listener);
        }
        id
    }

    fn remove_destroy_listener(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionStore")
            .field("id", &self.id)
            .field("destroyed", &state.destroyed)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

/// Cancels a blocked poll if its session is destroyed while the watch is
/// attached. Detaches on drop.
pub struct SessionWatch {
    session: Arc<dyn SessionLifecycle>,
    listener: Option<ListenerId>,
}

impl SessionWatch {
    pub fn attach(session: Arc<dyn SessionLifecycle>, target: CancellationToken) -> Self {
        let listener = session.add_destroy_listener(Arc::new(target));
        Self {
            session,
            listener: Some(listener),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    pub fn detach(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.session.remove_destroy_listener(listener);
        }
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for SessionWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionWatch")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingListener {
        fired: AtomicUsize,
    }

    impl DestroyListener for CountingListener {
        fn on_destroy(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn destroy_fires_each_listener_once() {
        let store = SessionStore::new("s1");
        let listener = Arc::new(CountingListener::default());
        store.add_destroy_listener(listener.clone());
        store.add_destroy_listener(listener.clone());

        assert!(store.destroy());
        assert!(!store.destroy());
        assert_eq!(listener.fired.load(Ordering::SeqCst), 2);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn removed_listener_never_fires() {
        let store = SessionStore::new("s1");
        let listener = Arc::new(CountingListener::default());
        let id = store.add_destroy_listener(listener.clone());

        assert!(store.remove_destroy_listener(id));
        assert!(!store.remove_destroy_listener(id));
        store.destroy();
        assert_eq!(listener.fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_added_after_destroy_fires_immediately() {
        let store = SessionStore::new("s1");
        store.destroy();

        let listener = Arc::new(CountingListener::default());
        store.add_destroy_listener(listener.clone());
        assert_eq!(listener.fired.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn watch_cancels_token_on_destroy() {
        let store = Arc::new(SessionStore::new("s1"));
        let token = CancellationToken::new();
        let watch = SessionWatch::attach(store.clone(), token.clone());
        assert!(watch.is_attached());
        assert_eq!(store.listener_count(), 1);

        store.destroy();
        assert!(token.is_cancelled());
        drop(watch);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn watch_detaches_on_drop_and_twice_is_fine() {
        let store = Arc::new(SessionStore::new("s1"));
        let token = CancellationToken::new();
        let mut watch = SessionWatch::attach(store.clone(), token.clone());

        watch.detach();
        watch.detach();
        assert!(!watch.is_attached());
        drop(watch);

        assert_eq!(store.listener_count(), 0);
        store.destroy();
        assert!(!token.is_cancelled());
    }
}
