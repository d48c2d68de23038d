//! The C surface the extension module links against.
//!
//! One process-wide [`Bridge`] sits behind these functions. The sixteen
//! per-kind constructors and destructors are generated from a single
//! table by `ffi_handlers!`:
//!
//! ```c
//! uint64_t lobbywire_new_lobby_invite_handler(void *context);  // 0 on failure
//! int32_t  lobbywire_del_lobby_invite_handler(uint64_t handle); // LwStatus
//! ```
//!
//! `lobbywire_new_handler` and `lobbywire_del_handler` do the same for an
//! event named by its SDK callback id.
//!
//! A failed constructor returns `0` and records why; read it back with
//! `lobbywire_last_status`. Every other function returns an [`LwStatus`].
//!
//! The global lock is only held long enough to clone the bridge out, so
//! forwarders running inside `lobbywire_run_callbacks` may call any of
//! these functions.

use std::ffi::{CStr, c_char, c_void};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use lobbywire_adapter::{AdapterError, TrampolineTable};
use lobbywire_dispatch::DispatchError;
use lobbywire_events::{CallbackId, EventKind};
use lobbywire_registry::{HandlerHandle, RegistryError};

#[cfg(feature = "steam")]
use crate::BridgeConfig;
use crate::{Bridge, LobbywireError, logging};

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Result code of every C entry point. `0` is success.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LwStatus {
    Ok = 0,
    NotInitialized = 1,
    AlreadyInitialized = 2,
    NullContext = 3,
    InvalidHandle = 4,
    StaleHandle = 5,
    KindMismatch = 6,
    MissingForwarder = 7,
    LibraryNotFound = 8,
    MissingSymbol = 9,
    SdkInitFailed = 10,
    InvalidConfig = 11,
    InvalidArgument = 12,
    RegistryFull = 13,
}

impl LwStatus {
    /// Every status, in code order.
    pub const ALL: [LwStatus; 14] = [
        Self::Ok,
        Self::NotInitialized,
        Self::AlreadyInitialized,
        Self::NullContext,
        Self::InvalidHandle,
        Self::StaleHandle,
        Self::KindMismatch,
        Self::MissingForwarder,
        Self::LibraryNotFound,
        Self::MissingSymbol,
        Self::SdkInitFailed,
        Self::InvalidConfig,
        Self::InvalidArgument,
        Self::RegistryFull,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// The status for a raw code, if it is one.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Human-readable description, NUL-terminated for C callers.
    pub fn message(self) -> &'static CStr {
        match self {
            Self::Ok => c"ok",
            Self::NotInitialized => c"lobbywire is not initialised",
            Self::AlreadyInitialized => c"lobbywire is already initialised",
            Self::NullContext => c"context pointer is null",
            Self::InvalidHandle => c"handle was never issued",
            Self::StaleHandle => c"handle was already destroyed",
            Self::KindMismatch => c"handle belongs to a different event kind",
            Self::MissingForwarder => c"no trampoline installed for this event kind",
            Self::LibraryNotFound => c"SDK library not found",
            Self::MissingSymbol => c"SDK library is missing an entry point",
            Self::SdkInitFailed => c"SDK initialisation failed",
            Self::InvalidConfig => c"invalid configuration",
            Self::InvalidArgument => c"invalid argument",
            Self::RegistryFull => c"too many live handlers",
        }
    }
}

impl From<&RegistryError> for LwStatus {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::InvalidHandle(_) | RegistryError::NotFound(_) => Self::InvalidHandle,
            RegistryError::StaleHandle(_) => Self::StaleHandle,
            RegistryError::Exhausted => Self::RegistryFull,
        }
    }
}

impl From<&LobbywireError> for LwStatus {
    fn from(err: &LobbywireError) -> Self {
        match err {
            LobbywireError::Event(_) => Self::InvalidArgument,
            LobbywireError::Dispatch(DispatchError::LibraryNotFound { .. }) => {
                Self::LibraryNotFound
            }
            #[cfg(feature = "steam")]
            LobbywireError::Dispatch(DispatchError::MissingSymbol { .. }) => Self::MissingSymbol,
            LobbywireError::Dispatch(DispatchError::InitFailed) => Self::SdkInitFailed,
            LobbywireError::Registry(e) | LobbywireError::Adapter(AdapterError::Registry(e)) => {
                e.into()
            }
            LobbywireError::Adapter(AdapterError::NullContext) => Self::NullContext,
            LobbywireError::Adapter(AdapterError::KindMismatch { .. }) => Self::KindMismatch,
            LobbywireError::Adapter(AdapterError::MissingForwarder(_)) => Self::MissingForwarder,
            LobbywireError::NotInitialized => Self::NotInitialized,
            LobbywireError::AlreadyInitialized => Self::AlreadyInitialized,
            LobbywireError::Config(_) => Self::InvalidConfig,
        }
    }
}

static LAST_STATUS: AtomicI32 = AtomicI32::new(0);

fn record(status: LwStatus) -> LwStatus {
    LAST_STATUS.store(status.code(), Ordering::Relaxed);
    status
}

fn record_result(result: Result<(), LobbywireError>) -> LwStatus {
    match result {
        Ok(()) => record(LwStatus::Ok),
        Err(e) => record(LwStatus::from(&e)),
    }
}

// ---------------------------------------------------------------------------
// Global bridge
// ---------------------------------------------------------------------------

static BRIDGE: RwLock<Option<Arc<Bridge>>> = RwLock::new(None);

/// The last table passed to `lobbywire_install_trampolines`. Outlives
/// shutdown, so a bridge initialised again gets the same forwarders.
static HOST_TRAMPOLINES: Mutex<Option<TrampolineTable>> = Mutex::new(None);

fn host_trampolines() -> Option<TrampolineTable> {
    *HOST_TRAMPOLINES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Makes `bridge` the one the C functions operate on.
///
/// # Errors
/// [`LobbywireError::AlreadyInitialized`] if a bridge is installed.
pub fn install(bridge: Bridge) -> Result<Arc<Bridge>, LobbywireError> {
    install_with(|| Ok(bridge))
}

/// Builds a bridge and installs it, all under the global lock. `build`
/// only runs when no bridge is installed, so a losing concurrent
/// initialisation never brings an SDK up (or down) at all.
///
/// The host's trampoline table takes precedence over the bridge's own
/// forwarders; those fill the slots the host left empty.
///
/// # Errors
/// [`LobbywireError::AlreadyInitialized`] if a bridge is installed, or
/// whatever `build` fails with.
pub fn install_with(
    build: impl FnOnce() -> Result<Bridge, LobbywireError>,
) -> Result<Arc<Bridge>, LobbywireError> {
    let mut slot = BRIDGE.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(LobbywireError::AlreadyInitialized);
    }
    let bridge = build()?;
    if let Some(mut table) = host_trampolines() {
        table.merge(&bridge.trampolines());
        bridge.install_trampolines(table);
    }
    let bridge = Arc::new(bridge);
    *slot = Some(Arc::clone(&bridge));
    Ok(bridge)
}

/// Removes the installed bridge without shutting it down.
pub fn uninstall() -> Option<Arc<Bridge>> {
    BRIDGE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// The installed bridge.
pub fn current() -> Result<Arc<Bridge>, LobbywireError> {
    BRIDGE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(LobbywireError::NotInitialized)
}

fn base_builder() -> crate::BridgeBuilder {
    let builder = Bridge::builder();
    #[cfg(feature = "linked-trampolines")]
    let builder = builder.trampolines(TrampolineTable::linked());
    builder
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Installs an in-process bridge. Events reach handlers only when posted
/// from Rust; meant for tests and headless runs.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_init_local() -> LwStatus {
    logging::init();
    record_result(install_with(|| base_builder().build()).map(drop))
}

/// Loads and initialises the SDK and installs a bridge on top of it.
///
/// `config_json` is a NUL-terminated JSON [`BridgeConfig`], or null for
/// defaults.
///
/// # Safety
/// `config_json` must be null or point to a NUL-terminated string.
#[cfg(feature = "steam")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lobbywire_init_steam(config_json: *const c_char) -> LwStatus {
    let config = if config_json.is_null() {
        BridgeConfig::default()
    } else {
        // SAFETY: forwarded to the caller.
        let raw = unsafe { CStr::from_ptr(config_json) };
        let Ok(json) = raw.to_str() else {
            return record(LwStatus::InvalidArgument);
        };
        match BridgeConfig::from_json(json) {
            Ok(config) => config,
            Err(e) => {
                logging::init();
                tracing::warn!(error = %e, "rejected bridge configuration");
                return record(LwStatus::from(&e));
            }
        }
    };
    logging::init_with(config.log_filter.as_deref());

    let result = install_with(|| {
        base_builder()
            .config(&config)
            .steam(config.steam.clone())
            .build()
    })
    .map(drop);
    if let Err(e) = &result {
        tracing::warn!(error = %e, "SDK bridge initialisation failed");
    }
    record_result(result)
}

/// Installs the eight forwarders. Works before or after initialisation
/// and survives shutdown; the table is copied.
///
/// # Safety
/// `table` must be null or point to a valid `TrampolineTable`, and every
/// non-null forwarder in it must have the signature of its slot.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lobbywire_install_trampolines(table: *const TrampolineTable) -> LwStatus {
    if table.is_null() {
        return record(LwStatus::InvalidArgument);
    }
    // SAFETY: forwarded to the caller.
    let table = unsafe { *table };
    // Released before `current()`: `install_with` takes these in the
    // other order.
    *HOST_TRAMPOLINES
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(table);
    if let Ok(bridge) = current() {
        bridge.install_trampolines(table);
    }
    record(LwStatus::Ok)
}

/// Pumps callbacks. Call once per frame.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_run_callbacks() -> LwStatus {
    record_result(current().map(|bridge| {
        bridge.run_callbacks();
    }))
}

/// Destroys every handler, shuts the SDK down and uninstalls the bridge.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_shutdown() -> LwStatus {
    match uninstall() {
        Some(bridge) => {
            bridge.shutdown();
            record(LwStatus::Ok)
        }
        None => record(LwStatus::NotInitialized),
    }
}

/// Static description of a status code. Never null.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_status_message(status: i32) -> *const c_char {
    LwStatus::from_code(status)
        .map_or(c"unknown status", LwStatus::message)
        .as_ptr()
}

/// Status of the most recent call on any thread.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_last_status() -> i32 {
    LAST_STATUS.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Per-kind constructors and destructors
// ---------------------------------------------------------------------------

fn create_handler(kind: EventKind, context: *mut c_void) -> u64 {
    match current().and_then(|bridge| bridge.create(kind, context)) {
        Ok(handle) => {
            record(LwStatus::Ok);
            handle.to_raw()
        }
        Err(e) => {
            record(LwStatus::from(&e));
            0
        }
    }
}

fn destroy_handler(kind: EventKind, raw: u64) -> LwStatus {
    let result = HandlerHandle::from_raw(raw)
        .map_err(LobbywireError::from)
        .and_then(|handle| current()?.destroy(kind, handle));
    if let Err(LobbywireError::Registry(e)) = &result {
        tracing::warn!(%kind, raw, error = %e, "destroy with malformed handle");
    }
    record_result(result)
}

/// Subscribes `context` to the event registered under the SDK callback
/// id `callback_id`. Returns the handle, or 0 on failure; an id outside
/// the eight supported events reports `InvalidArgument`.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_new_handler(callback_id: i32, context: *mut c_void) -> u64 {
    match EventKind::from_callback_id(CallbackId(callback_id)) {
        Ok(kind) => create_handler(kind, context),
        Err(e) => {
            tracing::warn!(callback_id, error = %e, "handler for unsupported event refused");
            record(LwStatus::from(&LobbywireError::from(e)));
            0
        }
    }
}

/// Destroys a handle of any kind.
#[unsafe(no_mangle)]
pub extern "C" fn lobbywire_del_handler(handle: u64) -> LwStatus {
    let result = HandlerHandle::from_raw(handle)
        .map_err(LobbywireError::from)
        .and_then(|handle| current()?.destroy_any(handle))
        .map(drop);
    record_result(result)
}

macro_rules! ffi_handlers {
    ($($kind:ident => $new:ident, $del:ident;)*) => {
        $(
            #[doc = concat!(
                "Subscribes `context` to `", stringify!($kind),
                "` events. Returns the handle, or 0 on failure."
            )]
            #[unsafe(no_mangle)]
            pub extern "C" fn $new(context: *mut c_void) -> u64 {
                create_handler(EventKind::$kind, context)
            }

            #[doc = concat!(
                "Destroys a handle returned by `", stringify!($new), "`."
            )]
            #[unsafe(no_mangle)]
            pub extern "C" fn $del(handle: u64) -> LwStatus {
                destroy_handler(EventKind::$kind, handle)
            }
        )*
    };
}

ffi_handlers! {
    LobbyCreated => lobbywire_new_lobby_created_handler, lobbywire_del_lobby_created_handler;
    LobbyEnter => lobbywire_new_lobby_enter_handler, lobbywire_del_lobby_enter_handler;
    LobbyChatUpdate =>
        lobbywire_new_lobby_chat_update_handler,
        lobbywire_del_lobby_chat_update_handler;
    LobbyDataUpdate =>
        lobbywire_new_lobby_data_update_handler,
        lobbywire_del_lobby_data_update_handler;
    LobbyInvite => lobbywire_new_lobby_invite_handler, lobbywire_del_lobby_invite_handler;
    JoinRequested => lobbywire_new_join_requested_handler, lobbywire_del_join_requested_handler;
    RichPresenceJoinRequested =>
        lobbywire_new_game_rich_presence_join_requested_handler,
        lobbywire_del_game_rich_presence_join_requested_handler;
    OverlayActivated =>
        lobbywire_new_game_overlay_activated_handler,
        lobbywire_del_game_overlay_activated_handler;
}
