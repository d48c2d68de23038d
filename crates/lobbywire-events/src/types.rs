//! Identity types for the events lobbywire relays.
//!
//! The SDK identifies every callback structure by a small integer (its
//! "callback id"), and every user, lobby or friend by a 64-bit Steam ID.
//! Both get newtype wrappers here so they can't be mixed up with the
//! other integers flowing through the bridge.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EventError;

// ---------------------------------------------------------------------------
// SteamId
// ---------------------------------------------------------------------------

/// A 64-bit Steam ID (user, lobby, or friend).
///
/// `#[repr(transparent)]` guarantees the same layout as a bare `u64`, so
/// a `SteamId` can sit inside the `#[repr(C)]` payload structs exactly
/// where the SDK puts its `CSteamID` / `uint64` fields. Serializes as the
/// bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SteamId(pub u64);

impl SteamId {
    /// Returns the raw 64-bit value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The SDK uses an all-zero ID for "no lobby" / "no user".
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steam:{}", self.0)
    }
}

impl From<u64> for SteamId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// CallbackId
// ---------------------------------------------------------------------------

/// The integer the SDK registers a callback structure under.
///
/// Values are `k_iCallbacks` base + offset, e.g. friends callbacks start
/// at 300 and matchmaking callbacks at 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CallbackId(pub i32);

impl CallbackId {
    /// Returns the raw id as the SDK's `int`.
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The eight SDK events the bridge can subscribe to.
///
/// Each kind maps to exactly one payload type (see
/// [`CallbackPayload::KIND`](crate::CallbackPayload::KIND)) and one SDK
/// callback id. Serializes as its [`name`](Self::name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// `LobbyCreated_t`: result of a create-lobby request.
    LobbyCreated,
    /// `LobbyEnter_t`: the local user entered a lobby.
    LobbyEnter,
    /// `LobbyChatUpdate_t`: a member joined, left, or was kicked.
    LobbyChatUpdate,
    /// `LobbyDataUpdate_t`: lobby or member metadata changed.
    LobbyDataUpdate,
    /// `LobbyInvite_t`: someone invited the local user.
    LobbyInvite,
    /// `GameLobbyJoinRequested_t`: "join game" from the friends list.
    JoinRequested,
    /// `GameRichPresenceJoinRequested_t`: join via rich presence connect string.
    #[serde(rename = "game_rich_presence_join_requested")]
    RichPresenceJoinRequested,
    /// `GameOverlayActivated_t`: the overlay opened or closed.
    #[serde(rename = "game_overlay_activated")]
    OverlayActivated,
}

impl EventKind {
    /// Every kind, in a fixed order matching [`index`](Self::index).
    pub const ALL: [EventKind; 8] = [
        Self::LobbyCreated,
        Self::LobbyEnter,
        Self::LobbyChatUpdate,
        Self::LobbyDataUpdate,
        Self::LobbyInvite,
        Self::JoinRequested,
        Self::RichPresenceJoinRequested,
        Self::OverlayActivated,
    ];

    /// The SDK callback id this kind is registered under.
    pub const fn callback_id(self) -> CallbackId {
        match self {
            Self::LobbyCreated => CallbackId(513),
            Self::LobbyEnter => CallbackId(504),
            Self::LobbyChatUpdate => CallbackId(506),
            Self::LobbyDataUpdate => CallbackId(505),
            Self::LobbyInvite => CallbackId(503),
            Self::JoinRequested => CallbackId(333),
            Self::RichPresenceJoinRequested => CallbackId(337),
            Self::OverlayActivated => CallbackId(331),
        }
    }

    /// Snake-case name, also the suffix of this kind's C entry points
    /// (`lobbywire_new_<name>_handler`, `lobbywire_forward_<name>`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::LobbyCreated => "lobby_created",
            Self::LobbyEnter => "lobby_enter",
            Self::LobbyChatUpdate => "lobby_chat_update",
            Self::LobbyDataUpdate => "lobby_data_update",
            Self::LobbyInvite => "lobby_invite",
            Self::JoinRequested => "join_requested",
            Self::RichPresenceJoinRequested => {
                "game_rich_presence_join_requested"
            }
            Self::OverlayActivated => "game_overlay_activated",
        }
    }

    /// Position of this kind in [`ALL`](Self::ALL). Handy for per-kind
    /// tables and counters.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up the kind registered under an SDK callback id.
    ///
    /// # Errors
    /// Returns [`EventError::UnknownCallbackId`] for ids outside the
    /// eight supported kinds.
    pub fn from_callback_id(id: CallbackId) -> Result<Self, EventError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.callback_id() == id)
            .ok_or(EventError::UnknownCallbackId(id.0))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =========================================================================
// Tests
// =========================================================================
