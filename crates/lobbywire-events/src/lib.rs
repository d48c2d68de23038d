//! Event vocabulary for lobbywire.
//!
//! This crate defines everything the bridge needs to know about the SDK
//! events it relays, and nothing about how they are delivered:
//!
//! - **Kinds** ([`EventKind`], [`CallbackId`]): the eight supported
//!   events and the SDK callback id each one is registered under.
//! - **Payloads** ([`LobbyCreated`], [`LobbyInvite`], ...): `#[repr(C)]`
//!   mirrors of the SDK's callback structures. The bridge never copies or
//!   rewrites them; the layouts exist so Rust hosts and tests can build
//!   and read them.
//! - **Errors** ([`EventError`]).
//!
//! # Architecture
//!
//! ```text
//! Dispatch (SDK subscription) → Events (kind + payload) → Adapter (forwarding)
//! ```

mod error;
mod payload;
mod types;

pub use error::EventError;
pub use payload::{
    CallbackPayload, ChatMemberStateChange, GameLobbyJoinRequested,
    GameOverlayActivated, GameRichPresenceJoinRequested, LobbyChatUpdate,
    LobbyCreated, LobbyDataUpdate, LobbyEnter, LobbyInvite,
    RICH_PRESENCE_CONNECT_LEN,
};
pub use types::{CallbackId, EventKind, SteamId};
