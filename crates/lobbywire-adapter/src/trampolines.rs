//! The eight forwarders the extension module provides.

#[cfg(feature = "linked-trampolines")]
use std::ffi::c_void;

use lobbywire_events::{
    EventKind, GameLobbyJoinRequested, GameOverlayActivated, GameRichPresenceJoinRequested,
    LobbyChatUpdate, LobbyCreated, LobbyDataUpdate, LobbyEnter, LobbyInvite,
};

use crate::Forwarder;

/// One optional forwarder per event kind.
///
/// `#[repr(C)]` with nullable function pointers, so the extension module
/// can fill it in from C and hand it over with
/// `lobbywire_install_trampolines`. A kind whose slot is empty cannot have
/// handlers created for it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrampolineTable {
    pub lobby_created: Option<Forwarder<LobbyCreated>>,
    pub lobby_enter: Option<Forwarder<LobbyEnter>>,
    pub lobby_chat_update: Option<Forwarder<LobbyChatUpdate>>,
    pub lobby_data_update: Option<Forwarder<LobbyDataUpdate>>,
    pub lobby_invite: Option<Forwarder<LobbyInvite>>,
    pub join_requested: Option<Forwarder<GameLobbyJoinRequested>>,
    pub game_rich_presence_join_requested: Option<Forwarder<GameRichPresenceJoinRequested>>,
    pub game_overlay_activated: Option<Forwarder<GameOverlayActivated>>,
}

impl TrampolineTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if a forwarder is installed for `kind`.
    pub fn has(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::LobbyCreated => self.lobby_created.is_some(),
            EventKind::LobbyEnter => self.lobby_enter.is_some(),
            EventKind::LobbyChatUpdate => self.lobby_chat_update.is_some(),
            EventKind::LobbyDataUpdate => self.lobby_data_update.is_some(),
            EventKind::LobbyInvite => self.lobby_invite.is_some(),
            EventKind::JoinRequested => self.join_requested.is_some(),
            EventKind::RichPresenceJoinRequested => {
                self.game_rich_presence_join_requested.is_some()
            }
            EventKind::OverlayActivated => self.game_overlay_activated.is_some(),
        }
    }

    /// Kinds without a forwarder.
    pub fn missing(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| !self.has(*kind))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        EventKind::ALL.iter().all(|kind| self.has(*kind))
    }

    /// Fills empty slots from `other`, keeping forwarders already set.
    pub fn merge(&mut self, other: &TrampolineTable) {
        self.lobby_created = self.lobby_created.or(other.lobby_created);
        self.lobby_enter = self.lobby_enter.or(other.lobby_enter);
        self.lobby_chat_update = self.lobby_chat_update.or(other.lobby_chat_update);
        self.lobby_data_update = self.lobby_data_update.or(other.lobby_data_update);
        self.lobby_invite = self.lobby_invite.or(other.lobby_invite);
        self.join_requested = self.join_requested.or(other.join_requested);
        self.game_rich_presence_join_requested = self
            .game_rich_presence_join_requested
            .or(other.game_rich_presence_join_requested);
        self.game_overlay_activated = self.game_overlay_activated.or(other.game_overlay_activated);
    }
}

#[cfg(feature = "linked-trampolines")]
unsafe extern "C" {
    fn lobbywire_forward_lobby_created(context: *mut c_void, payload: *mut LobbyCreated);
    fn lobbywire_forward_lobby_enter(context: *mut c_void, payload: *mut LobbyEnter);
    fn lobbywire_forward_lobby_chat_update(context: *mut c_void, payload: *mut LobbyChatUpdate);
    fn lobbywire_forward_lobby_data_update(context: *mut c_void, payload: *mut LobbyDataUpdate);
    fn lobbywire_forward_lobby_invite(context: *mut c_void, payload: *mut LobbyInvite);
    fn lobbywire_forward_join_requested(context: *mut c_void, payload: *mut GameLobbyJoinRequested);
    fn lobbywire_forward_game_rich_presence_join_requested(
        context: *mut c_void,
        payload: *mut GameRichPresenceJoinRequested,
    );
    fn lobbywire_forward_game_overlay_activated(
        context: *mut c_void,
        payload: *mut GameOverlayActivated,
    );
}

#[cfg(feature = "linked-trampolines")]
impl TrampolineTable {
    /// A complete table bound to the `lobbywire_forward_<kind>` symbols
    /// the extension module exports. The final link fails if any is
    /// missing.
    pub fn linked() -> Self {
        Self {
            lobby_created: Some(lobbywire_forward_lobby_created),
            lobby_enter: Some(lobbywire_forward_lobby_enter),
            lobby_chat_update: Some(lobbywire_forward_lobby_chat_update),
            lobby_data_update: Some(lobbywire_forward_lobby_data_update),
            lobby_invite: Some(lobbywire_forward_lobby_invite),
            join_requested: Some(lobbywire_forward_join_requested),
            game_rich_presence_join_requested: Some(
                lobbywire_forward_game_rich_presence_join_requested,
            ),
            game_overlay_activated: Some(lobbywire_forward_game_overlay_activated),
        }
    }
}
