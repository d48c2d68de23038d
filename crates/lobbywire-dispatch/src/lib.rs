//! SDK callback subscription for lobbywire.
//!
//! Provides the [`CallbackDispatcher`] trait, which abstracts over the
//! SDK's "register a callback object for callback id N, call its `run`
//! slot when such an event arrives" mechanism, plus two implementations:
//!
//! - [`LocalDispatcher`]: an in-process stand-in that delivers events
//!   posted from Rust. Used by tests and headless hosts.
//! - `SteamDispatcher` (feature `steam`, on by default): the real SDK,
//!   loaded at runtime with `libloading`.
//!
//! # The native callback object
//!
//! The SDK dispatches to C++ objects derived from `CCallbackBase`. A
//! [`CallbackBase`] reproduces that object's layout: a vtable pointer
//! followed by the flag byte and the callback id. Anything that starts
//! with a `CallbackBase` (at offset 0, `#[repr(C)]`) can be registered.
//!
//! ```text
//! CallbackBase ──vtable──→ CallbackVTable { run, run_with_call, size_bytes }
//!   flags: u8
//!   callback_id: i32
//! ```

mod error;
mod local;
#[cfg(feature = "steam")]
mod steam;

pub use error::DispatchError;
pub use local::LocalDispatcher;
#[cfg(feature = "steam")]
pub use steam::{SteamConfig, SteamDispatcher};

use std::ffi::c_void;
use std::ptr::NonNull;

use lobbywire_events::CallbackId;

/// `k_ECallbackFlagsRegistered`: set while the object is registered.
pub const CALLBACK_FLAG_REGISTERED: u8 = 0x01;

/// Vtable of a native callback object.
///
/// MSVC lays out overloaded virtuals in reverse declaration order while
/// the Itanium ABI keeps declaration order, so the SDK may call either of
/// the first two slots for a plain delivery. Both slots must forward the
/// same way.
#[repr(C)]
pub struct CallbackVTable {
    /// `Run(void *pvParam)`.
    pub run: unsafe extern "C" fn(this: *mut CallbackBase, param: *mut c_void),
    /// `Run(void *pvParam, bool bIOFailure, SteamAPICall_t hSteamAPICall)`.
    pub run_with_call: unsafe extern "C" fn(
        this: *mut CallbackBase,
        param: *mut c_void,
        io_failure: bool,
        api_call: u64,
    ),
    /// `GetCallbackSizeBytes()`.
    pub size_bytes: unsafe extern "C" fn(this: *mut CallbackBase) -> i32,
}

/// Layout of the SDK's `CCallbackBase`.
#[repr(C)]
#[derive(Debug)]
pub struct CallbackBase {
    pub vtable: *const CallbackVTable,
    pub flags: u8,
    pub callback_id: i32,
}

impl CallbackBase {
    /// Creates an unregistered base for `callback_id`.
    pub fn new(vtable: *const CallbackVTable, callback_id: CallbackId) -> Self {
        Self {
            vtable,
            flags: 0,
            callback_id: callback_id.raw(),
        }
    }

    /// `true` while a dispatcher holds this object.
    pub fn is_registered(&self) -> bool {
        self.flags & CALLBACK_FLAG_REGISTERED != 0
    }

    /// Invokes the object's `run` slot, as the SDK does on delivery.
    ///
    /// # Safety
    /// `this` must point to a live callback object whose vtable is valid,
    /// and `param` must be whatever that object's `run` expects.
    pub unsafe fn dispatch(this: NonNull<CallbackBase>, param: *mut c_void) {
        let this = this.as_ptr();
        // SAFETY: the caller guarantees `this` and its vtable are live.
        unsafe {
            let vtable = &*(*this).vtable;
            (vtable.run)(this, param);
        }
    }
}

/// The SDK's callback subscription mechanism.
///
/// Implementations never fail a registration; they mirror the SDK's
/// `SteamAPI_RegisterCallback` / `SteamAPI_UnregisterCallback`, which
/// return nothing.
///
/// # Threading
///
/// Deliveries happen synchronously inside [`run_callbacks`]
/// (or a local `fire`), on the caller's thread.
///
/// [`run_callbacks`]: CallbackDispatcher::run_callbacks
pub trait CallbackDispatcher: Send + Sync + 'static {
    /// Starts routing events with `callback_id` to `base`.
    ///
    /// # Safety
    /// `base` must point to a callback object that stays alive, at the
    /// same address, until [`unregister`](Self::unregister) returns for it.
    unsafe fn register(&self, base: NonNull<CallbackBase>, callback_id: CallbackId);

    /// Stops routing events to `base`. After this returns no new delivery
    /// reaches it and the caller may free it.
    ///
    /// # Safety
    /// `base` must have been passed to [`register`](Self::register) on
    /// this dispatcher and still be alive.
    unsafe fn unregister(&self, base: NonNull<CallbackBase>);

    /// Pumps the SDK: delivers every pending event to registered objects.
    fn run_callbacks(&self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
