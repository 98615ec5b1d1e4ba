//! Typed publish/subscribe layer over the realtime transport.
//!
//! Subscriptions are keyed by [`EventKind`] and owned by the bus, not by the
//! underlying socket, so they keep firing across reconnects. Registrations
//! made before a session exists are queued ("pending listeners") and
//! activated in order when one opens.

use parking_lot::Mutex;
use std::sync::Arc;
use vicino_shared::{EventKind, ServerEvent};

type Callback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Identifies one `on()` registration, for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    kind: EventKind,
    callback: Callback,
}

#[derive(Default)]
struct BusState {
    session_live: bool,
    active: Vec<Registration>,
    pending: Vec<Registration>,
    next_id: u64,
}

/// Event bus decoupling listener registration from session lifetime.
#[derive(Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a listener for one event kind.
    ///
    /// With a live session the listener is active immediately; otherwise it
    /// is queued and activated, in registration order, when a session opens.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        let registration = Registration {
            id,
            kind,
            callback: Arc::new(callback),
        };
        if state.session_live {
            state.active.push(registration);
        } else {
            state.pending.push(registration);
        }
        id
    }

    /// Remove one listener (by id) or every listener for an event kind.
    /// Pending registrations for the kind are removed too; other kinds are
    /// untouched.
    pub fn off(&self, kind: EventKind, id: Option<SubscriptionId>) {
        let mut state = self.state.lock();
        let keep = |r: &Registration| r.kind != kind || id.is_some_and(|id| r.id != id);
        state.active.retain(keep);
        state.pending.retain(keep);
    }

    /// Drop every listener, live and pending.
    pub fn remove_all(&self) {
        let mut state = self.state.lock();
        state.active.clear();
        state.pending.clear();
    }

    /// Invoke every active listener for the event's kind, in registration
    /// order. Listeners run outside the bus lock, so they may re-enter.
    pub fn dispatch(&self, event: &ServerEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = {
            let state = self.state.lock();
            state
                .active
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    /// A session opened: activate queued registrations in order.
    pub(crate) fn session_opened(&self) {
        let mut state = self.state.lock();
        state.session_live = true;
        let mut pending = std::mem::take(&mut state.pending);
        state.active.append(&mut pending);
    }

    /// The session ended: new registrations queue again.
    pub(crate) fn session_closed(&self) {
        self.state.lock().session_live = false;
    }

    /// Drop queued-but-unregistered listeners (manual disconnect).
    pub(crate) fn discard_pending(&self) {
        self.state.lock().pending.clear();
    }
}
