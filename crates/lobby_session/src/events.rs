//! Session events and the observer registry they are dispatched through.

use std::sync::{Arc, Mutex, PoisonError};

use crate::controls::LobbyControls;
use crate::error::SessionError;
use crate::member::MemberId;
use crate::phase::SessionPhase;
use crate::roster::ReconcileResult;
use crate::seats::SeatPlan;
use crate::session::SceneChangeRequest;

/// Everything a [`SessionContext`](crate::SessionContext) reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A reconciliation pass changed the roster.
    RosterReconciled(ReconcileResult),
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    ControlsChanged(LobbyControls),
    SeatsAssigned(SeatPlan),
    /// The local ready flag was handed to the directory.
    ReadyChanged { member: MemberId, ready: bool },
    /// The host should load another scene.
    SceneChangeRequested(SceneChangeRequest),
    LeaveRequested,
    /// The menu scene loaded and the session state was torn down.
    SessionEnded,
    Fault(SessionError),
}

/// Token returned by [`ObserverRegistry::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Observers<E> {
    next: u64,
    entries: Vec<(ObserverHandle, Callback<E>)>,
}

/// Subscriber list keyed by handle.
///
/// Clones share the same list. Dispatch runs on a snapshot, so callbacks may
/// subscribe or unsubscribe (themselves included) while being called; such
/// changes take effect from the next dispatch.
pub struct ObserverRegistry<E> {
    inner: Arc<Mutex<Observers<E>>>,
}

impl<E> Clone for ObserverRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Observers {
                next: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<E> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> ObserverHandle {
        let mut observers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = ObserverHandle(observers.next);
        observers.next += 1;
        observers.entries.push((handle, Arc::new(callback)));
        handle
    }

    /// Returns `false` if the handle was not (or no longer) registered.
    pub fn unsubscribe(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.entries.len();
        observers.entries.retain(|(h, _)| *h != handle);
        observers.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every subscriber in registration order.
    pub fn dispatch(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = {
            let observers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            observers.entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in snapshot {
            callback(event);
        }
    }
}
