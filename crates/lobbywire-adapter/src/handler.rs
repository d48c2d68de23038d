//! The generic callback handler.
//!
//! One [`CallbackHandler<P>`] replaces a hand-written class per event
//! kind. It owns a native callback object laid out like the SDK's
//! `CCallbackBase`, registers it with a dispatcher for `P::CALLBACK_ID`,
//! and relays each delivery to its forwarder:
//!
//! ```text
//! dispatcher ──run(this, param)──→ RawCallback<P>
//!                                     │ forward(context, param as *mut P)
//!                                     ▼
//!                             extension-module trampoline
//! ```
//!
//! The payload pointer is handed over untouched: no copy, no filtering.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use lobbywire_dispatch::{CallbackBase, CallbackDispatcher, CallbackVTable};
use lobbywire_events::{CallbackPayload, EventKind};

use crate::AdapterError;

/// A trampoline owned by the extension module: `(context, payload)`.
///
/// Called synchronously on the dispatching thread. The payload pointer is
/// only valid for the duration of the call.
pub type Forwarder<P> = unsafe extern "C" fn(context: *mut c_void, payload: *mut P);

/// The object the dispatcher actually sees. `base` must stay first.
#[repr(C)]
struct RawCallback<P: CallbackPayload> {
    base: CallbackBase,
    vtable: CallbackVTable,
    context: *mut c_void,
    forward: Forwarder<P>,
}

unsafe extern "C" fn run<P: CallbackPayload>(this: *mut CallbackBase, param: *mut c_void) {
    // Copy what we need out first: the forwarder may destroy this handler,
    // after which `this` dangles.
    // SAFETY: only `CallbackHandler<P>` registers objects with this vtable,
    // and it keeps them alive until unregistered.
    let (context, forward) = unsafe {
        let raw = &*this.cast::<RawCallback<P>>();
        (raw.context, raw.forward)
    };
    tracing::trace!(kind = %P::KIND, ?context, "forwarding callback");
    // SAFETY: the forwarder's contract is the extension module's; it is
    // handed exactly what the dispatcher delivered for `P::CALLBACK_ID`.
    unsafe { forward(context, param.cast::<P>()) };
}

unsafe extern "C" fn run_with_call<P: CallbackPayload>(
    this: *mut CallbackBase,
    param: *mut c_void,
    _io_failure: bool,
    _api_call: u64,
) {
    // SAFETY: same object, same contract as `run`.
    unsafe { run::<P>(this, param) }
}

unsafe extern "C" fn size_bytes<P: CallbackPayload>(_this: *mut CallbackBase) -> i32 {
    P::size_bytes()
}

/// A live subscription to one event kind for one context.
///
/// Creating it registers with the dispatcher; dropping it unregisters
/// before the native object is freed, so no delivery follows the drop.
pub struct CallbackHandler<P: CallbackPayload> {
    raw: NonNull<RawCallback<P>>,
    dispatcher: Arc<dyn CallbackDispatcher>,
}

// SAFETY: the handler never dereferences `context`, and the native object
// is only touched by the dispatcher under its register/unregister contract.
unsafe impl<P: CallbackPayload> Send for CallbackHandler<P> {}

impl<P: CallbackPayload> CallbackHandler<P> {
    /// Subscribes `forward` to `P`'s event kind on behalf of `context`.
    ///
    /// `context` is opaque: it is passed back to `forward` on every
    /// delivery and never read.
    ///
    /// # Errors
    /// [`AdapterError::NullContext`] if `context` is null.
    pub fn new(
        dispatcher: Arc<dyn CallbackDispatcher>,
        context: *mut c_void,
        forward: Forwarder<P>,
    ) -> Result<Self, AdapterError> {
        if context.is_null() {
            return Err(AdapterError::NullContext);
        }

        let raw = Box::new(RawCallback::<P> {
            base: CallbackBase::new(std::ptr::null(), P::CALLBACK_ID),
            vtable: CallbackVTable {
                run: run::<P>,
                run_with_call: run_with_call::<P>,
                size_bytes: size_bytes::<P>,
            },
            context,
            forward,
        });
        // SAFETY: `Box::into_raw` never returns null.
        let raw = unsafe { NonNull::new_unchecked(Box::into_raw(raw)) };

        // SAFETY: `raw` is a fresh, exclusively owned allocation. The vtable
        // lives inside it, so pointing at it is valid for the object's life.
        // It stays at this address until `drop` unregisters and frees it.
        unsafe {
            let ptr = raw.as_ptr();
            (*ptr).base.vtable = &raw const (*ptr).vtable;
            dispatcher.register(NonNull::new_unchecked(&raw mut (*ptr).base), P::CALLBACK_ID);
        }

        tracing::debug!(
            kind = %P::KIND,
            ?context,
            dispatcher = dispatcher.name(),
            "handler registered"
        );
        Ok(Self { raw, dispatcher })
    }

    fn base(&self) -> NonNull<CallbackBase> {
        // `base` is at offset 0 of the `#[repr(C)]` RawCallback.
        self.raw.cast::<CallbackBase>()
    }

    pub fn kind(&self) -> EventKind {
        P::KIND
    }

    /// The context pointer given at creation.
    pub fn context(&self) -> *mut c_void {
        // SAFETY: the allocation lives as long as `self`.
        unsafe { self.raw.as_ref().context }
    }

    /// `true` while the dispatcher holds the native object.
    pub fn is_registered(&self) -> bool {
        // SAFETY: the allocation lives as long as `self`.
        unsafe { self.base().as_ref().is_registered() }
    }
}

impl<P: CallbackPayload> Drop for CallbackHandler<P> {
    fn drop(&mut self) {
        // SAFETY: registered in `new` and still alive; after `unregister`
        // returns no delivery can reach it, so freeing is sound.
        unsafe {
            self.dispatcher.unregister(self.base());
            drop(Box::from_raw(self.raw.as_ptr()));
        }
        tracing::debug!(kind = %P::KIND, "handler unregistered");
    }
}

impl<P: CallbackPayload> std::fmt::Debug for CallbackHandler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandler")
            .field("kind", &P::KIND)
            .field("context", &self.context())
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Kind-erased view of a [`CallbackHandler`], so handlers of all eight
/// kinds can share one registry.
pub trait AnyHandler: Send + std::fmt::Debug {
    fn kind(&self) -> EventKind;
    fn context(&self) -> *mut c_void;
    fn is_registered(&self) -> bool;
}

impl<P: CallbackPayload> AnyHandler for CallbackHandler<P> {
    fn kind(&self) -> EventKind {
        CallbackHandler::kind(self)
    }

    fn context(&self) -> *mut c_void {
        CallbackHandler::context(self)
    }

    fn is_registered(&self) -> bool {
        CallbackHandler::is_registered(self)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use lobbywire_dispatch::LocalDispatcher;
    use lobbywire_events::{GameOverlayActivated, LobbyEnter, SteamId};

    use super::*;

    thread_local! {
        static SEEN: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn record_enter(context: *mut c_void, payload: *mut LobbyEnter) {
        SEEN.with(|s| s.borrow_mut().push((context as usize, payload as usize)));
    }

    unsafe extern "C" fn record_overlay(context: *mut c_void, payload: *mut GameOverlayActivated) {
        SEEN.with(|s| s.borrow_mut().push((context as usize, payload as usize)));
    }

    fn take_seen() -> Vec<(usize, usize)> {
        SEEN.with(|s| std::mem::take(&mut *s.borrow_mut()))
    }

    fn ctx(value: usize) -> *mut c_void {
        value as *mut c_void
    }

    #[test]
    fn test_new_null_context_returns_error() {
        let dispatcher = Arc::new(LocalDispatcher::new());
        let result = CallbackHandler::<LobbyEnter>::new(
            dispatcher.clone(),
            std::ptr::null_mut(),
            record_enter,
        );
        assert!(matches!(result, Err(AdapterError::NullContext)));
        assert_eq!(dispatcher.registration_count(), 0);
    }

    #[test]
    fn test_new_registers_under_payload_callback_id() {
        let dispatcher = Arc::new(LocalDispatcher::new());
        let handler =
            CallbackHandler::<LobbyEnter>::new(dispatcher.clone(), ctx(0x10), record_enter)
                .unwrap();

        assert!(handler.is_registered());
        assert_eq!(handler.kind(), EventKind::LobbyEnter);
        assert_eq!(handler.context(), ctx(0x10));
        assert_eq!(dispatcher.registered(LobbyEnter::CALLBACK_ID), 1);
    }

    #[test]
    fn test_fire_forwards_context_and_same_payload_pointer() {
        take_seen();
        let dispatcher = Arc::new(LocalDispatcher::new());
        let _handler =
            CallbackHandler::<LobbyEnter>::new(dispatcher.clone(), ctx(0x20), record_enter)
                .unwrap();

        let mut payload = LobbyEnter {
            lobby: SteamId(109775241021923456),
            chat_permissions: 0,
            locked: false,
            enter_response: 1,
        };
        let expected = &mut payload as *mut LobbyEnter as usize;
        dispatcher.fire(&mut payload);

        assert_eq!(take_seen(), vec![(0x20, expected)]);
    }

    #[test]
    fn test_drop_unregisters_and_stops_forwarding() {
        take_seen();
        let dispatcher = Arc::new(LocalDispatcher::new());
        let handler = CallbackHandler::<GameOverlayActivated>::new(
            dispatcher.clone(),
            ctx(0x30),
            record_overlay,
        )
        .unwrap();
        drop(handler);

        let mut payload = GameOverlayActivated {
            active: 1,
            user_initiated: true,
            app_id: 480,
            overlay_pid: 0,
        };
        assert_eq!(dispatcher.fire(&mut payload), 0);
        assert!(take_seen().is_empty());
        assert_eq!(dispatcher.registration_count(), 0);
    }

    #[test]
    fn test_size_bytes_slot_reports_payload_size() {
        let dispatcher = Arc::new(LocalDispatcher::new());
        let handler =
            CallbackHandler::<LobbyEnter>::new(dispatcher, ctx(0x40), record_enter).unwrap();
        let base = handler.base();
        // SAFETY: the handler is alive and its vtable was set in `new`.
        let reported = unsafe { ((*base.as_ref().vtable).size_bytes)(base.as_ptr()) };
        assert_eq!(reported, LobbyEnter::size_bytes());
    }

    #[test]
    fn test_run_with_call_slot_forwards_like_run() {
        take_seen();
        let dispatcher = Arc::new(LocalDispatcher::new());
        let handler =
            CallbackHandler::<LobbyEnter>::new(dispatcher, ctx(0x50), record_enter).unwrap();
        let base = handler.base();
        let param = 0xBEEF as *mut c_void;
        // SAFETY: the handler is alive; the recording forwarder never
        // dereferences the payload.
        unsafe { ((*base.as_ref().vtable).run_with_call)(base.as_ptr(), param, false, 0) };
        assert_eq!(take_seen(), vec![(0x50, 0xBEEF)]);
    }
}
