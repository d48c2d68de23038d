//! # lobbywire
//!
//! Steamworks lobby callback bridge for game extension modules.
//!
//! The SDK reports lobby, invite and overlay events by calling back into
//! C++ objects registered per callback id. lobbywire creates those objects
//! on behalf of a scripting-side extension module and forwards every
//! delivery, untouched, to a trampoline the module provides. It owns no
//! lobby logic of its own.
//!
//! ```text
//! SteamAPI_RunCallbacks ─→ CallbackHandler<P>::run ─→ forward(context, payload)
//! ```
//!
//! ## From Rust
//!
//! ```rust,no_run
//! use std::ffi::c_void;
//! use std::sync::Arc;
//! use lobbywire::prelude::*;
//!
//! unsafe extern "C" fn on_invite(_context: *mut c_void, _payload: *mut LobbyInvite) {}
//!
//! # fn main() -> Result<(), LobbywireError> {
//! let local = Arc::new(LocalDispatcher::new());
//! let bridge = Bridge::builder().local(local.clone()).build()?;
//!
//! let context = 0x1 as *mut c_void;
//! let handle = bridge.subscribe::<LobbyInvite>(context, on_invite)?;
//! bridge.run_callbacks();
//! bridge.destroy_any(handle)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## From C
//!
//! See [`ffi`]: `lobbywire_init_steam`, `lobbywire_install_trampolines`,
//! then `lobbywire_new_<kind>_handler` / `lobbywire_del_<kind>_handler`
//! and `lobbywire_run_callbacks` once per frame.

mod bridge;
mod config;
mod error;
pub mod ffi;
pub mod logging;

pub use bridge::{Bridge, BridgeBuilder};
pub use config::BridgeConfig;
pub use error::LobbywireError;
pub use ffi::LwStatus;

pub use lobbywire_adapter::{
    AdapterError, CallbackHandler, Forwarder, HandlerInfo, HandlerManager, TrampolineTable,
};
#[cfg(feature = "steam")]
pub use lobbywire_dispatch::{SteamConfig, SteamDispatcher};
pub use lobbywire_dispatch::{CallbackDispatcher, DispatchError, LocalDispatcher};
pub use lobbywire_events::{
    CallbackId, CallbackPayload, ChatMemberStateChange, EventError, EventKind,
    GameLobbyJoinRequested, GameOverlayActivated, GameRichPresenceJoinRequested, LobbyChatUpdate,
    LobbyCreated, LobbyDataUpdate, LobbyEnter, LobbyInvite, SteamId,
};
pub use lobbywire_pump::{CallbackPump, PumpConfig, PumpInfo, PumpMetrics};
pub use lobbywire_registry::{HandlerHandle, RegistryError};

/// Everything needed to build a bridge and handle its events.
pub mod prelude {
    pub use crate::{
        Bridge, BridgeConfig, CallbackDispatcher, CallbackPayload, EventKind, Forwarder,
        GameLobbyJoinRequested, GameOverlayActivated, GameRichPresenceJoinRequested,
        HandlerHandle, LobbyChatUpdate, LobbyCreated, LobbyDataUpdate, LobbyEnter, LobbyInvite,
        LobbywireError, LocalDispatcher, PumpConfig, SteamId, TrampolineTable,
    };
}
