//! In-process dispatcher: delivers events posted from Rust.
//!
//! `LocalDispatcher` behaves like the SDK from the point of view of a
//! registered callback object: it keeps a registration list keyed by
//! callback id, and a delivery calls the object's `run` slot with a
//! payload pointer. It never spawns threads; events are delivered either
//! immediately ([`fire`](LocalDispatcher::fire)) or on the next
//! [`run_callbacks`](CallbackDispatcher::run_callbacks) after a
//! [`post`](LocalDispatcher::post).
//!
//! Every delivery runs under a reentrant delivery lock that
//! [`unregister`](CallbackDispatcher::unregister) also takes. Another
//! thread unregistering an object therefore waits until the delivery in
//! progress has returned, while a forwarder on the delivering thread can
//! still unregister (and free) handlers, its own included.

use std::collections::VecDeque;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lobbywire_events::{CallbackId, CallbackPayload};
use parking_lot::ReentrantMutex;

use crate::{CALLBACK_FLAG_REGISTERED, CallbackBase, CallbackDispatcher};

/// A registered object pointer, movable into the registration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BasePtr(NonNull<CallbackBase>);

// SAFETY: the dispatcher only stores and compares the address; it is
// dereferenced on the pumping thread under the register/unregister
// contract of `CallbackDispatcher`.
unsafe impl Send for BasePtr {}

#[derive(Debug)]
struct Registration {
    base: BasePtr,
    callback_id: CallbackId,
    /// Distinguishes a re-registration at a recycled address.
    seq: u64,
}

/// A posted event waiting for the next pump.
type PostedEvent = Box<dyn FnOnce(&LocalDispatcher) -> usize + Send>;

#[derive(Default)]
struct LocalState {
    registrations: Vec<Registration>,
    next_seq: u64,
    posted: VecDeque<PostedEvent>,
}

/// An SDK stand-in that runs entirely in-process.
pub struct LocalDispatcher {
    state: Mutex<LocalState>,
    /// Held across every delivery and every unregistration.
    delivering: ReentrantMutex<()>,
}

impl Default for LocalDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalDispatcher {
    /// Creates a dispatcher with no registrations and no pending events.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            delivering: ReentrantMutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers `payload` right now to every object registered for its
    /// kind. Returns the number of deliveries.
    ///
    /// The same pointer (`payload as *mut P`) is handed to every object.
    pub fn fire<P: CallbackPayload>(&self, payload: &mut P) -> usize {
        let param = (payload as *mut P).cast::<c_void>();
        // SAFETY: `param` points at a live `P` for the whole call, which is
        // what objects registered under `P::CALLBACK_ID` expect.
        unsafe { self.fire_raw(P::CALLBACK_ID, param) }
    }

    /// Delivers an arbitrary pointer to every object registered for
    /// `callback_id`. Returns the number of deliveries.
    ///
    /// Objects unregistered while the delivery is in progress (including
    /// by their own `run`) are skipped from that point on. Unregistering
    /// from another thread blocks until this call returns.
    ///
    /// # Safety
    /// `param` must be acceptable to every `run` registered under
    /// `callback_id`. Forwarding handlers never read it themselves, so any
    /// value their forwarders accept is fine.
    pub unsafe fn fire_raw(&self, callback_id: CallbackId, param: *mut c_void) -> usize {
        let _delivering = self.delivering.lock();
        let targets: Vec<(BasePtr, u64)> = self
            .lock()
            .registrations
            .iter()
            .filter(|r| r.callback_id == callback_id)
            .map(|r| (r.base, r.seq))
            .collect();

        let mut delivered = 0;
        for (base, seq) in targets {
            let live = self
                .lock()
                .registrations
                .iter()
                .any(|r| r.base == base && r.seq == seq);
            if !live {
                continue;
            }
            tracing::trace!(%callback_id, "local delivery");
            // SAFETY: still registered, and no other thread can unregister
            // it while `delivering` is held, so it stays alive for the call.
            unsafe { CallbackBase::dispatch(base.0, param) };
            delivered += 1;
        }
        delivered
    }

    /// Queues `payload` for the next [`run_callbacks`], the way the SDK
    /// queues events until the game pumps it.
    ///
    /// [`run_callbacks`]: CallbackDispatcher::run_callbacks
    pub fn post<P: CallbackPayload>(&self, payload: P) {
        let mut payload = payload;
        self.lock()
            .posted
            .push_back(Box::new(move |dispatcher| dispatcher.fire(&mut payload)));
    }

    /// Number of events posted but not yet delivered.
    pub fn pending(&self) -> usize {
        self.lock().posted.len()
    }

    /// Number of objects registered for `callback_id`.
    pub fn registered(&self, callback_id: CallbackId) -> usize {
        self.lock()
            .registrations
            .iter()
            .filter(|r| r.callback_id == callback_id)
            .count()
    }

    /// Total number of registered objects.
    pub fn registration_count(&self) -> usize {
        self.lock().registrations.len()
    }

    /// Pumps posted events and returns how many deliveries happened.
    pub fn pump(&self) -> usize {
        // Take the queue first: a forwarder may post more events, which
        // then wait for the next pump like they would with the SDK.
        let posted: Vec<PostedEvent> = self.lock().posted.drain(..).collect();
        posted.into_iter().map(|event| event(self)).sum()
    }
}

impl CallbackDispatcher for LocalDispatcher {
    unsafe fn register(&self, base: NonNull<CallbackBase>, callback_id: CallbackId) {
        // SAFETY: the caller guarantees `base` is live.
        unsafe { (*base.as_ptr()).flags |= CALLBACK_FLAG_REGISTERED };
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.registrations.push(Registration {
            base: BasePtr(base),
            callback_id,
            seq,
        });
    }

    unsafe fn unregister(&self, base: NonNull<CallbackBase>) {
        // Waits out a delivery running on another thread.
        let _delivering = self.delivering.lock();
        self.lock().registrations.retain(|r| r.base != BasePtr(base));
        // SAFETY: the caller guarantees `base` is still live.
        unsafe { (*base.as_ptr()).flags &= !CALLBACK_FLAG_REGISTERED };
    }

    fn run_callbacks(&self) {
        let delivered = self.pump();
        tracing::trace!(delivered, "local dispatcher pumped");
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LocalDispatcher")
            .field("registrations", &state.registrations.len())
            .field("posted", &state.posted.len())
            .finish()
    }
}
