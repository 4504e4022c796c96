use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::activation::ActivationRegistry;
use crate::config::CallbackConfig;
use crate::probe::ConnectionProbe;
use crate::scope::RequestScope;
use crate::session::{SessionLifecycle, SessionWatch};
use crate::snapshot::CoordinatorSnapshot;
use crate::tracker::{RequestHandle, RequestTracker};

/// Request attribute telling the response writer to start a callback poll
/// even though no feature keeps push active.
pub const FORCE_CALLBACK_ATTRIBUTE: &str = "ui_callback.force_callback";

/// Why a call to [`CallbackCoordinator::process_request_detailed`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// Blocking was not warranted; the poll returned right away.
    NotBlocked,
    /// The poll was the active one when its wait ended.
    Released,
    /// A newer poll replaced this one while it was waiting.
    Rescinded,
    /// The session was destroyed while the poll was waiting.
    Interrupted,
}

impl PollOutcome {
    pub fn is_released(self) -> bool {
        matches!(self, Self::NotBlocked | Self::Released)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotBlocked => "not_blocked",
            Self::Released => "released",
            Self::Rescinded => "rescinded",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct CallbackState {
    activations: ActivationRegistry,
    tracker: RequestTracker,
    ui_processing_active: bool,
    has_pending_work: bool,
    wake_requested: bool,
    check_interval: Duration,
    next_handle: u64,
}

impl CallbackState {
    fn is_push_active(&self) -> bool {
        !self.activations.is_empty()
    }

    fn must_block(&self) -> bool {
        self.is_push_active() && !self.has_pending_work
    }

    /// Pending work only ends a wait once the worker that produced it is done.
    fn work_ready(&self) -> bool {
        !self.must_block() && !self.ui_processing_active
    }

    fn issue_handle(&mut self) -> RequestHandle {
        self.next_handle += 1;
        RequestHandle::new(self.next_handle)
    }
}

/// Holds the callback poll of one session open until there is something to
/// deliver.
///
/// All state sits behind one lock. Blocked polls park on a broadcast signal and
/// re-evaluate their own release condition whenever it fires or the check
/// interval elapses.
pub struct CallbackCoordinator {
    session: Arc<dyn SessionLifecycle>,
    state: Mutex<CallbackState>,
    signal: watch::Sender<u64>,
}

impl CallbackCoordinator {
    pub fn new(session: Arc<dyn SessionLifecycle>, config: &CallbackConfig) -> Self {
        Self::from_parts(
            session,
            ActivationRegistry::new(),
            false,
            config.check_interval,
        )
    }

    /// Rebuilds a coordinator from a snapshot. The request tracker starts
    /// empty and no worker is considered running.
    pub fn restore(session: Arc<dyn SessionLifecycle>, snapshot: CoordinatorSnapshot) -> Self {
        Self::from_parts(
            session,
            snapshot.activations.into_iter().collect(),
            snapshot.has_pending_work,
            snapshot.check_interval,
        )
    }

    fn from_parts(
        session: Arc<dyn SessionLifecycle>,
        activations: ActivationRegistry,
        has_pending_work: bool,
        check_interval: Duration,
    ) -> Self {
        let (signal, _) = watch::channel(0);
        Self {
            session,
            state: Mutex::new(CallbackState {
                activations,
                tracker: RequestTracker::new(),
                ui_processing_active: false,
                has_pending_work,
                wake_requested: false,
                check_interval,
                next_handle: 0,
            }),
            signal,
        }
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let state = self.lock();
        CoordinatorSnapshot {
            activations: state.activations.ids().map(str::to_string).collect(),
            has_pending_work: state.has_pending_work,
            check_interval: state.check_interval,
        }
    }

    /// Returns the number of ids registered afterwards.
    pub fn activate(&self, id: impl Into<String>) -> usize {
        let id = id.into();
        let mut state = self.lock();
        if state.activations.activate(id.clone()) {
            tracing::debug!(
                id = %id,
                active = state.activations.len(),
                "ui callback: activated"
            );
        }
        state.activations.len()
    }

    /// Returns the number of ids still registered. Dropping to zero releases
    /// any blocked poll.
    pub fn deactivate(&self, id: &str) -> usize {
        let mut state = self.lock();
        let remaining = state.activations.deactivate(id);
        tracing::debug!(id = %id, remaining = remaining, "ui callback: deactivated");
        if remaining == 0 {
            self.release_locked(&mut state);
        }
        remaining
    }

    pub fn is_push_active(&self) -> bool {
        self.lock().is_push_active()
    }

    pub fn must_block(&self) -> bool {
        self.lock().must_block()
    }

    pub fn notify_worker_start(&self) {
        self.lock().ui_processing_active = true;
    }

    pub fn notify_worker_end(&self) {
        let mut state = self.lock();
        state.ui_processing_active = false;
        if state.has_pending_work {
            self.release_locked(&mut state);
        }
    }

    pub fn has_pending_work(&self) -> bool {
        self.lock().has_pending_work
    }

    /// Records whether the worker has client-visible work queued.
    ///
    /// While push is active, pending work also marks `scope` so that the
    /// response of the current request asks the client for a callback poll.
    pub fn set_has_pending_work(&self, value: bool, scope: &RequestScope) {
        let push_active = {
            let mut state = self.lock();
            state.has_pending_work = value;
            if value && !state.ui_processing_active {
                self.recheck_locked();
            }
            state.is_push_active()
        };

        if value && push_active {
            scope.set_attribute(FORCE_CALLBACK_ATTRIBUTE, Value::Bool(true));
        }
    }

    /// Releases the blocked poll unless the worker is running, in which case
    /// `notify_worker_end` takes care of it.
    pub fn request_wake(&self) {
        let mut state = self.lock();
        if !state.ui_processing_active {
            self.release_locked(&mut state);
        }
    }

    pub fn force_release(&self) {
        let mut state = self.lock();
        self.release_locked(&mut state);
    }

    /// Whether the next response should tell the client to start a poll.
    pub fn needs_activation(&self, scope: &RequestScope) -> bool {
        self.is_push_active()
            || scope
                .attribute(FORCE_CALLBACK_ATTRIBUTE)
                .and_then(|value| value.as_bool())
                .unwrap_or(false)
    }

    pub fn is_request_blocked(&self) -> bool {
        !self.lock().tracker.no_active_request_tracked()
    }

    pub fn blocked_requests(&self) -> usize {
        self.lock().tracker.len()
    }

    pub fn check_interval(&self) -> Duration {
        self.lock().check_interval
    }

    /// Takes effect from the next wake-up of a blocked poll on. A zero interval
    /// disables the periodic re-check.
    pub fn set_check_interval(&self, check_interval: Duration) {
        self.lock().check_interval = check_interval;
    }

    /// Blocks the callback poll until it should be answered.
    ///
    /// Returns `true` if the caller should answer the poll as released, and
    /// `false` if it was replaced by a newer poll or its session went away.
    pub async fn process_request<P>(&self, probe: &P) -> bool
    where
        P: ConnectionProbe + ?Sized,
    {
        self.process_request_detailed(probe).await.is_released()
    }

    pub async fn process_request_detailed<P>(&self, probe: &P) -> PollOutcome
    where
        P: ConnectionProbe + ?Sized,
    {
        let (handle, mut signal) = {
            let mut state = self.lock();
            if state.tracker.no_active_request_tracked() {
                self.release_locked(&mut state);
            }
            if !state.must_block() {
                return PollOutcome::NotBlocked;
            }

            let handle = state.issue_handle();
            if !state.tracker.is_empty() {
                // let the superseded poll notice it is stale
                self.recheck_locked();
            }
            state.tracker.activate(handle);
            state.wake_requested = false;
            (handle, self.signal.subscribe())
        };

        let cancel = CancellationToken::new();
        let _guard = BlockGuard {
            coordinator: self,
            handle,
            watch: SessionWatch::attach(self.session.clone(), cancel.clone()),
        };
        tracing::debug!(handle = %handle, "ui callback: poll blocked");

        let outcome = loop {
            let check_interval = self.check_interval();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break PollOutcome::Interrupted,
                _ = signal.changed() => {}
                () = check_tick(check_interval) => {}
            }

            let state = self.lock();
            let still_active = state.tracker.is_active(handle);
            if state.wake_requested || state.work_ready() || !probe.is_alive() || !still_active {
                break if still_active {
                    PollOutcome::Released
                } else {
                    PollOutcome::Rescinded
                };
            }
        };

        tracing::debug!(handle = %handle, outcome = %outcome, "ui callback: poll finished");
        outcome
    }

    fn release_locked(&self, state: &mut CallbackState) {
        state.wake_requested = true;
        self.recheck_locked();
    }

    fn recheck_locked(&self) {
        self.signal.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    fn lock(&self) -> MutexGuard<'_, CallbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CallbackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCoordinator")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

async fn check_tick(check_interval: Duration) {
    if check_interval.is_zero() {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(check_interval).await;
    }
}

/// Removes a blocked poll from the tracker and the session when its wait ends,
/// including when the poll future is dropped mid-wait.
struct BlockGuard<'a> {
    coordinator: &'a CallbackCoordinator,
    handle: RequestHandle,
    watch: SessionWatch,
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        self.watch.detach();
        self.coordinator.lock().tracker.deactivate(self.handle);
    }
}
