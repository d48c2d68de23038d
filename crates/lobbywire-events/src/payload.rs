//! `#[repr(C)]` mirrors of the SDK callback structures.
//!
//! The bridge treats payloads as opaque: it receives a pointer from the
//! SDK and hands the same pointer to the forwarder. These definitions
//! exist so that Rust code (hosts, tests, the local dispatcher) can build
//! and inspect payloads with the exact byte layout the SDK uses.
//!
//! The SDK packs its callback structs to 4 bytes on Linux and macOS and
//! to 8 bytes everywhere else, so `u64` fields are only 4-aligned on the
//! former. Packed fields must be read by value (`{ ev.lobby }`), never
//! borrowed.

use std::fmt;
use std::mem;

use crate::{CallbackId, EventKind, SteamId};

/// Size of the connect string buffer in `GameRichPresenceJoinRequested_t`.
pub const RICH_PRESENCE_CONNECT_LEN: usize = 256;

/// A payload type the SDK delivers for exactly one [`EventKind`].
///
/// This is the compile-time half of the kind ↔ payload mapping: generic
/// code parameterized over `P: CallbackPayload` gets the kind tag and the
/// SDK callback id from the type alone.
pub trait CallbackPayload: Copy + fmt::Debug + Send + 'static {
    /// The event kind this payload belongs to.
    const KIND: EventKind;

    /// The SDK callback id (derived from [`KIND`](Self::KIND)).
    const CALLBACK_ID: CallbackId = Self::KIND.callback_id();

    /// Payload size as reported to the SDK through the callback object's
    /// size slot.
    fn size_bytes() -> i32 {
        mem::size_of::<Self>() as i32
    }
}

/// Declares one SDK callback struct with the SDK's packing rules and ties
/// it to its event kind.
macro_rules! sdk_callback {
    (
        $(#[$meta:meta])*
        pub struct $name:ident => $kind:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty, )*
        }
    ) => {
        #[cfg_attr(any(target_os = "linux", target_os = "macos"), repr(C, packed(4)))]
        #[cfg_attr(not(any(target_os = "linux", target_os = "macos")), repr(C))]
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl CallbackPayload for $name {
            const KIND: EventKind = EventKind::$kind;
        }
    };
}

// ---------------------------------------------------------------------------
// Matchmaking callbacks
// ---------------------------------------------------------------------------

sdk_callback! {
    /// Result of `ISteamMatchmaking::CreateLobby`.
    #[derive(Debug, PartialEq, Eq)]
    pub struct LobbyCreated => LobbyCreated {
        /// `EResult`; 1 is `k_EResultOK`.
        pub result: i32,
        /// The new lobby, nil on failure.
        pub lobby: SteamId,
    }
}

impl LobbyCreated {
    /// `true` if the SDK reported `k_EResultOK`.
    pub fn is_ok(&self) -> bool {
        self.result == 1
    }
}

sdk_callback! {
    /// The local user entered a lobby (created or joined).
    #[derive(Debug, PartialEq, Eq)]
    pub struct LobbyEnter => LobbyEnter {
        pub lobby: SteamId,
        /// Unused by the SDK, always zero.
        pub chat_permissions: u32,
        /// Only invited users may join.
        pub locked: bool,
        /// `EChatRoomEnterResponse`; 1 is success.
        pub enter_response: u32,
    }
}

sdk_callback! {
    /// A lobby member's state changed (joined, left, disconnected, ...).
    #[derive(Debug, PartialEq, Eq)]
    pub struct LobbyChatUpdate => LobbyChatUpdate {
        pub lobby: SteamId,
        /// The user whose state changed.
        pub user_changed: SteamId,
        /// The user who caused the change (e.g. the kicker).
        pub making_change: SteamId,
        /// Bit set of [`ChatMemberStateChange`] flags.
        pub member_state_change: u32,
    }
}

impl LobbyChatUpdate {
    /// The member state change flags.
    pub fn state_change(&self) -> ChatMemberStateChange {
        ChatMemberStateChange(self.member_state_change)
    }
}

sdk_callback! {
    /// Lobby metadata, or one member's metadata, changed.
    #[derive(Debug, PartialEq, Eq)]
    pub struct LobbyDataUpdate => LobbyDataUpdate {
        pub lobby: SteamId,
        /// Equals `lobby` when the lobby's own data changed.
        pub member: SteamId,
        /// Non-zero on success.
        pub success: u8,
    }
}

impl LobbyDataUpdate {
    /// `true` when the update is about the lobby rather than a member.
    pub fn is_lobby_update(&self) -> bool {
        let (lobby, member) = (self.lobby, self.member);
        lobby == member
    }

    pub fn succeeded(&self) -> bool {
        self.success != 0
    }
}

sdk_callback! {
    /// Someone invited the local user to a lobby.
    #[derive(Debug, PartialEq, Eq)]
    pub struct LobbyInvite => LobbyInvite {
        /// The inviting user.
        pub user: SteamId,
        pub lobby: SteamId,
        /// Game the lobby belongs to.
        pub game_id: u64,
    }
}

// ---------------------------------------------------------------------------
// Friends callbacks
// ---------------------------------------------------------------------------

sdk_callback! {
    /// The user picked "Join Game" on a friend in the friends list.
    #[derive(Debug, PartialEq, Eq)]
    pub struct GameLobbyJoinRequested => JoinRequested {
        pub lobby: SteamId,
        pub friend: SteamId,
    }
}

sdk_callback! {
    /// The user accepted a join through a friend's rich presence.
    #[derive(PartialEq, Eq)]
    pub struct GameRichPresenceJoinRequested => RichPresenceJoinRequested {
        pub friend: SteamId,
        /// NUL-terminated connect string set by the friend's game.
        pub connect: [u8; RICH_PRESENCE_CONNECT_LEN],
    }
}

impl GameRichPresenceJoinRequested {
    /// Builds a payload, truncating `connect` so the buffer stays
    /// NUL-terminated.
    pub fn new(friend: SteamId, connect: &str) -> Self {
        let mut buf = [0u8; RICH_PRESENCE_CONNECT_LEN];
        let bytes = connect.as_bytes();
        let len = bytes.len().min(RICH_PRESENCE_CONNECT_LEN - 1);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            friend,
            connect: buf,
        }
    }

    /// The connect string up to the first NUL, lossily decoded.
    pub fn connect_str(&self) -> String {
        let buf = self.connect;
        let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..end]).into_owned()
    }
}

impl fmt::Debug for GameRichPresenceJoinRequested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameRichPresenceJoinRequested")
            .field("friend", &{ self.friend })
            .field("connect", &self.connect_str())
            .finish()
    }
}

sdk_callback! {
    /// The in-game overlay was opened or closed.
    #[derive(Debug, PartialEq, Eq)]
    pub struct GameOverlayActivated => OverlayActivated {
        /// Non-zero while the overlay is shown.
        pub active: u8,
        /// The user opened it (as opposed to the game).
        pub user_initiated: bool,
        pub app_id: u32,
        pub overlay_pid: u32,
    }
}

impl GameOverlayActivated {
    pub fn is_active(&self) -> bool {
        self.active != 0
    }
}

// ---------------------------------------------------------------------------
// ChatMemberStateChange
// ---------------------------------------------------------------------------

/// `EChatMemberStateChange` bit set carried by [`LobbyChatUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChatMemberStateChange(pub u32);

impl ChatMemberStateChange {
    pub const ENTERED: Self = Self(0x0001);
    pub const LEFT: Self = Self(0x0002);
    pub const DISCONNECTED: Self = Self(0x0004);
    pub const KICKED: Self = Self(0x0008);
    pub const BANNED: Self = Self(0x0010);

    /// `true` if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// `true` if the member is no longer in the lobby.
    pub fn is_departure(self) -> bool {
        self.0
            & (Self::LEFT.0 | Self::DISCONNECTED.0 | Self::KICKED.0 | Self::BANNED.0)
            != 0
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Layout tests. The sizes below are what the SDK's own headers
    //! produce; a mismatch would make the SDK copy the wrong number of
    //! bytes into our structs.

    use super::*;

    const PACK4: bool = cfg!(any(target_os = "linux", target_os = "macos"));

    fn expect(pack4: usize, pack8: usize) -> usize {
        if PACK4 { pack4 } else { pack8 }
    }

    #[test]
    fn test_payload_sizes_match_sdk_packing() {
        assert_eq!(mem::size_of::<LobbyCreated>(), expect(12, 16));
        assert_eq!(mem::size_of::<LobbyEnter>(), expect(20, 24));
        assert_eq!(mem::size_of::<LobbyChatUpdate>(), expect(28, 32));
        assert_eq!(mem::size_of::<LobbyDataUpdate>(), expect(20, 24));
        assert_eq!(mem::size_of::<LobbyInvite>(), 24);
        assert_eq!(mem::size_of::<GameLobbyJoinRequested>(), 16);
        assert_eq!(mem::size_of::<GameRichPresenceJoinRequested>(), 264);
        assert_eq!(mem::size_of::<GameOverlayActivated>(), 12);
    }

    #[test]
    fn test_size_bytes_reports_struct_size() {
        assert_eq!(
            LobbyInvite::size_bytes() as usize,
            mem::size_of::<LobbyInvite>()
        );
        assert_eq!(
            LobbyCreated::size_bytes() as usize,
            mem::size_of::<LobbyCreated>()
        );
    }

    #[test]
    fn test_payload_kinds_and_ids() {
        assert_eq!(LobbyCreated::KIND, EventKind::LobbyCreated);
        assert_eq!(LobbyCreated::CALLBACK_ID, CallbackId(513));
        assert_eq!(GameLobbyJoinRequested::KIND, EventKind::JoinRequested);
        assert_eq!(
            GameRichPresenceJoinRequested::CALLBACK_ID,
            CallbackId(337)
        );
        assert_eq!(GameOverlayActivated::KIND, EventKind::OverlayActivated);
    }

    #[test]
    fn test_lobby_created_is_ok() {
        let ok = LobbyCreated {
            result: 1,
            lobby: SteamId(109775241021923328),
        };
        let failed = LobbyCreated {
            result: 2,
            lobby: SteamId(0),
        };
        assert!(ok.is_ok());
        assert!(!failed.is_ok());
    }

    #[test]
    fn test_lobby_data_update_distinguishes_lobby_and_member() {
        let lobby_update = LobbyDataUpdate {
            lobby: SteamId(7),
            member: SteamId(7),
            success: 1,
        };
        let member_update = LobbyDataUpdate {
            lobby: SteamId(7),
            member: SteamId(8),
            success: 0,
        };
        assert!(lobby_update.is_lobby_update());
        assert!(lobby_update.succeeded());
        assert!(!member_update.is_lobby_update());
        assert!(!member_update.succeeded());
    }

    #[test]
    fn test_rich_presence_connect_string_roundtrip() {
        let ev = GameRichPresenceJoinRequested::new(SteamId(5), "+connect 10.0.0.1");
        assert_eq!(ev.connect_str(), "+connect 10.0.0.1");
        assert_eq!({ ev.friend }, SteamId(5));
    }

    #[test]
    fn test_rich_presence_connect_string_truncates_and_stays_terminated() {
        let long = "x".repeat(400);
        let ev = GameRichPresenceJoinRequested::new(SteamId(1), &long);
        assert_eq!(ev.connect_str().len(), RICH_PRESENCE_CONNECT_LEN - 1);
        assert_eq!(ev.connect[RICH_PRESENCE_CONNECT_LEN - 1], 0);
    }

    #[test]
    fn test_chat_member_state_change_flags() {
        let ev = LobbyChatUpdate {
            lobby: SteamId(1),
            user_changed: SteamId(2),
            making_change: SteamId(3),
            member_state_change: 0x0002 | 0x0008,
        };
        let change = ev.state_change();
        assert!(change.contains(ChatMemberStateChange::LEFT));
        assert!(change.contains(ChatMemberStateChange::KICKED));
        assert!(!change.contains(ChatMemberStateChange::ENTERED));
        assert!(change.is_departure());
        assert!(!ChatMemberStateChange::ENTERED.is_departure());
    }

    #[test]
    fn test_overlay_activated_is_active() {
        let shown = GameOverlayActivated {
            active: 1,
            user_initiated: true,
            app_id: 480,
            overlay_pid: 4242,
        };
        assert!(shown.is_active());
        assert!(!GameOverlayActivated { active: 0, ..shown }.is_active());
    }
}
