//! Integration tests for the adapter using the in-process dispatcher.
//!
//! Forwarders here are `extern "C"` functions that record every call into
//! a thread-local log, so each test sees only its own deliveries.

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::Arc;

use lobbywire_adapter::{AdapterError, HandlerHandle, HandlerManager, TrampolineTable};
use lobbywire_dispatch::LocalDispatcher;
use lobbywire_events::{
    CallbackPayload, EventKind, GameLobbyJoinRequested, GameOverlayActivated,
    GameRichPresenceJoinRequested, LobbyChatUpdate, LobbyCreated, LobbyDataUpdate, LobbyEnter,
    LobbyInvite, SteamId,
};
use lobbywire_registry::RegistryError;

// =========================================================================
// Recording forwarders
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Call {
    kind: EventKind,
    context: usize,
    payload: usize,
}

thread_local! {
    static CALLS: RefCell<Vec<Call>> = const { RefCell::new(Vec::new()) };
    static MANAGER: RefCell<Option<HandlerManager>> = const { RefCell::new(None) };
    static SELF_HANDLE: RefCell<Option<HandlerHandle>> = const { RefCell::new(None) };
}

fn record(kind: EventKind, context: *mut c_void, payload: usize) {
    CALLS.with(|c| {
        c.borrow_mut().push(Call {
            kind,
            context: context as usize,
            payload,
        })
    });
}

fn take_calls() -> Vec<Call> {
    CALLS.with(|c| std::mem::take(&mut *c.borrow_mut()))
}

macro_rules! recorder {
    ($name:ident, $payload:ty) => {
        unsafe extern "C" fn $name(context: *mut c_void, payload: *mut $payload) {
            record(<$payload as CallbackPayload>::KIND, context, payload as usize);
        }
    };
}

recorder!(on_lobby_created, LobbyCreated);
recorder!(on_lobby_enter, LobbyEnter);
recorder!(on_lobby_chat_update, LobbyChatUpdate);
recorder!(on_lobby_data_update, LobbyDataUpdate);
recorder!(on_lobby_invite, LobbyInvite);
recorder!(on_join_requested, GameLobbyJoinRequested);
recorder!(on_rich_presence_join_requested, GameRichPresenceJoinRequested);
recorder!(on_overlay_activated, GameOverlayActivated);

fn full_table() -> TrampolineTable {
    TrampolineTable {
        lobby_created: Some(on_lobby_created),
        lobby_enter: Some(on_lobby_enter),
        lobby_chat_update: Some(on_lobby_chat_update),
        lobby_data_update: Some(on_lobby_data_update),
        lobby_invite: Some(on_lobby_invite),
        join_requested: Some(on_join_requested),
        game_rich_presence_join_requested: Some(on_rich_presence_join_requested),
        game_overlay_activated: Some(on_overlay_activated),
    }
}

fn setup() -> (Arc<LocalDispatcher>, HandlerManager) {
    take_calls();
    let dispatcher = Arc::new(LocalDispatcher::new());
    let manager = HandlerManager::new(dispatcher.clone());
    (dispatcher, manager)
}

fn ctx(value: usize) -> *mut c_void {
    value as *mut c_void
}

fn invite() -> LobbyInvite {
    LobbyInvite {
        user: SteamId(76561197960287930),
        lobby: SteamId(109775241021923456),
        game_id: 480,
    }
}

fn overlay() -> GameOverlayActivated {
    GameOverlayActivated {
        active: 1,
        user_initiated: true,
        app_id: 480,
        overlay_pid: 0,
    }
}

/// Fires `kind` with an opaque payload pointer the recorders never read.
fn fire_opaque(dispatcher: &LocalDispatcher, kind: EventKind, payload: usize) -> usize {
    // SAFETY: the recording forwarders only store the pointer value.
    unsafe { dispatcher.fire_raw(kind.callback_id(), payload as *mut c_void) }
}

// =========================================================================
// Forwarding
// =========================================================================

#[test]
fn test_create_kind_every_kind_forwards_exactly_once() {
    let (dispatcher, mut manager) = setup();
    let table = full_table();

    for (i, kind) in EventKind::ALL.into_iter().enumerate() {
        let context = 0x1000 + i;
        let payload = 0x9000 + i;
        manager.create_kind(kind, ctx(context), &table).unwrap();

        assert_eq!(fire_opaque(&dispatcher, kind, payload), 1);
        assert_eq!(
            take_calls(),
            vec![Call {
                kind,
                context,
                payload
            }],
            "{kind} should forward once with its own context"
        );
    }
    assert_eq!(manager.len(), EventKind::ALL.len());
}

#[test]
fn test_fire_lobby_invite_forwards_context_and_payload_untouched() {
    let (dispatcher, mut manager) = setup();
    manager
        .create::<LobbyInvite>(ctx(0xAAAA), on_lobby_invite)
        .unwrap();

    fire_opaque(&dispatcher, EventKind::LobbyInvite, 0xBBBB);

    assert_eq!(
        take_calls(),
        vec![Call {
            kind: EventKind::LobbyInvite,
            context: 0xAAAA,
            payload: 0xBBBB
        }]
    );
}

#[test]
fn test_fire_typed_payload_preserves_pointer_identity() {
    let (dispatcher, mut manager) = setup();
    manager
        .create::<LobbyInvite>(ctx(0x10), on_lobby_invite)
        .unwrap();

    let mut payload = invite();
    let address = &mut payload as *mut LobbyInvite as usize;
    dispatcher.fire(&mut payload);

    assert_eq!(take_calls()[0].payload, address);
}

#[test]
fn test_destroy_stops_forwarding() {
    let (dispatcher, mut manager) = setup();
    let handle = manager
        .create::<LobbyInvite>(ctx(0x10), on_lobby_invite)
        .unwrap();
    dispatcher.fire(&mut invite());
    assert_eq!(take_calls().len(), 1);

    manager.destroy(handle).unwrap();
    dispatcher.fire(&mut invite());

    assert!(take_calls().is_empty());
    assert_eq!(dispatcher.registration_count(), 0);
}

#[test]
fn test_create_then_destroy_overlay_fire_forwards_nothing() {
    let (dispatcher, mut manager) = setup();
    let handle = manager
        .create_kind(EventKind::OverlayActivated, ctx(0x10), &full_table())
        .unwrap();
    manager
        .destroy_kind(EventKind::OverlayActivated, handle)
        .unwrap();

    assert_eq!(dispatcher.fire(&mut overlay()), 0);
    assert!(take_calls().is_empty());
}

#[test]
fn test_two_contexts_same_kind_each_get_one_call() {
    let (dispatcher, mut manager) = setup();
    manager
        .create::<LobbyInvite>(ctx(0xA), on_lobby_invite)
        .unwrap();
    manager
        .create::<LobbyInvite>(ctx(0xB), on_lobby_invite)
        .unwrap();

    fire_opaque(&dispatcher, EventKind::LobbyInvite, 0x77);

    let mut contexts: Vec<usize> = take_calls().iter().map(|c| c.context).collect();
    contexts.sort_unstable();
    assert_eq!(contexts, vec![0xA, 0xB]);
}

#[test]
fn test_destroying_one_context_leaves_the_other() {
    let (dispatcher, mut manager) = setup();
    let a = manager
        .create::<LobbyInvite>(ctx(0xA), on_lobby_invite)
        .unwrap();
    manager
        .create::<LobbyInvite>(ctx(0xB), on_lobby_invite)
        .unwrap();
    manager.destroy(a).unwrap();

    fire_opaque(&dispatcher, EventKind::LobbyInvite, 0x77);

    let calls = take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].context, 0xB);
}

#[test]
fn test_kinds_are_independent() {
    let (dispatcher, mut manager) = setup();
    manager
        .create::<LobbyInvite>(ctx(0xA), on_lobby_invite)
        .unwrap();
    manager
        .create::<GameOverlayActivated>(ctx(0xB), on_overlay_activated)
        .unwrap();

    dispatcher.fire(&mut overlay());

    let calls = take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, EventKind::OverlayActivated);
    assert_eq!(calls[0].context, 0xB);
}

#[test]
fn test_posted_events_forward_on_run_callbacks() {
    use lobbywire_dispatch::CallbackDispatcher;

    let (dispatcher, mut manager) = setup();
    manager
        .create::<LobbyEnter>(ctx(0xC), on_lobby_enter)
        .unwrap();
    dispatcher.post(LobbyEnter {
        lobby: SteamId(1),
        chat_permissions: 0,
        locked: false,
        enter_response: 1,
    });
    assert!(take_calls().is_empty());

    dispatcher.run_callbacks();

    assert_eq!(take_calls().len(), 1);
}

// =========================================================================
// Misuse is reported, not undefined
// =========================================================================

#[test]
fn test_create_null_context_returns_error() {
    let (dispatcher, mut manager) = setup();
    let result = manager.create::<LobbyInvite>(std::ptr::null_mut(), on_lobby_invite);
    assert!(matches!(result, Err(AdapterError::NullContext)));
    assert!(manager.is_empty());
    assert_eq!(dispatcher.registration_count(), 0);
}

#[test]
fn test_create_kind_missing_forwarder_returns_error() {
    let (_dispatcher, mut manager) = setup();
    let result = manager.create_kind(EventKind::LobbyInvite, ctx(1), &TrampolineTable::new());
    assert!(matches!(
        result,
        Err(AdapterError::MissingForwarder(EventKind::LobbyInvite))
    ));
}

#[test]
fn test_destroy_twice_returns_stale_and_keeps_others() {
    let (dispatcher, mut manager) = setup();
    let a = manager
        .create::<LobbyInvite>(ctx(0xA), on_lobby_invite)
        .unwrap();
    let b = manager
        .create::<LobbyInvite>(ctx(0xB), on_lobby_invite)
        .unwrap();
    manager.destroy(a).unwrap();

    let second = manager.destroy(a);

    assert!(matches!(
        second,
        Err(AdapterError::Registry(RegistryError::StaleHandle(h))) if h == a
    ));
    assert!(manager.get(b).is_ok());
    assert_eq!(dispatcher.registered(LobbyInvite::CALLBACK_ID), 1);
}

#[test]
fn test_destroy_kind_wrong_kind_returns_mismatch_and_keeps_handler() {
    let (dispatcher, mut manager) = setup();
    let handle = manager
        .create::<LobbyEnter>(ctx(0xA), on_lobby_enter)
        .unwrap();

    let result = manager.destroy_kind(EventKind::OverlayActivated, handle);

    assert!(matches!(
        result,
        Err(AdapterError::KindMismatch {
            expected: EventKind::OverlayActivated,
            found: EventKind::LobbyEnter,
            ..
        })
    ));
    assert_eq!(manager.len(), 1);
    assert_eq!(dispatcher.registered(LobbyEnter::CALLBACK_ID), 1);
}

#[test]
fn test_detach_kind_keeps_registration_until_handler_dropped() {
    let (dispatcher, mut manager) = setup();
    let handle = manager
        .create::<LobbyInvite>(ctx(0xA), on_lobby_invite)
        .unwrap();

    let (info, handler) = manager.detach_kind(EventKind::LobbyInvite, handle).unwrap();

    assert_eq!(info.kind, EventKind::LobbyInvite);
    assert!(manager.is_empty());
    assert!(manager.get(handle).is_err());
    assert_eq!(dispatcher.registered(LobbyInvite::CALLBACK_ID), 1);
    drop(handler);
    assert_eq!(dispatcher.registered(LobbyInvite::CALLBACK_ID), 0);
}

#[test]
fn test_stale_handle_after_slot_reuse_is_rejected() {
    let (_dispatcher, mut manager) = setup();
    let old = manager
        .create::<LobbyInvite>(ctx(0xA), on_lobby_invite)
        .unwrap();
    manager.destroy(old).unwrap();
    let new = manager
        .create::<LobbyInvite>(ctx(0xB), on_lobby_invite)
        .unwrap();
    assert_eq!(old.index(), new.index());

    assert!(manager.destroy(old).is_err());
    assert_eq!(manager.get(new).unwrap().context, ctx(0xB));
}

// =========================================================================
// Bookkeeping
// =========================================================================

#[test]
fn test_count_by_kind_and_destroy_all() {
    let (dispatcher, mut manager) = setup();
    let table = full_table();
    manager
        .create_kind(EventKind::LobbyInvite, ctx(1), &table)
        .unwrap();
    manager
        .create_kind(EventKind::LobbyInvite, ctx(2), &table)
        .unwrap();
    manager
        .create_kind(EventKind::LobbyChatUpdate, ctx(3), &table)
        .unwrap();

    assert_eq!(manager.count_by_kind(EventKind::LobbyInvite), 2);
    assert_eq!(manager.count_by_kind(EventKind::LobbyChatUpdate), 1);
    assert_eq!(manager.count_by_kind(EventKind::LobbyDataUpdate), 0);

    assert_eq!(manager.destroy_all(), 3);
    assert!(manager.is_empty());
    assert_eq!(dispatcher.registration_count(), 0);
}

#[test]
fn test_dropping_manager_unregisters_everything() {
    let (dispatcher, mut manager) = setup();
    manager
        .create::<LobbyInvite>(ctx(1), on_lobby_invite)
        .unwrap();
    manager
        .create::<GameOverlayActivated>(ctx(2), on_overlay_activated)
        .unwrap();

    drop(manager);

    assert_eq!(dispatcher.registration_count(), 0);
}

// =========================================================================
// Re-entrancy
// =========================================================================

unsafe extern "C" fn destroy_self(context: *mut c_void, payload: *mut LobbyCreated) {
    record(EventKind::LobbyCreated, context, payload as usize);
    let handle = SELF_HANDLE.with(|h| h.borrow_mut().take());
    if let Some(handle) = handle {
        MANAGER.with(|m| {
            if let Some(manager) = m.borrow_mut().as_mut() {
                manager.destroy(handle).unwrap();
            }
        });
    }
}

#[test]
fn test_forwarder_destroying_its_own_handler_is_safe() {
    let (dispatcher, mut manager) = setup();
    let handle = manager
        .create::<LobbyCreated>(ctx(0xD), destroy_self)
        .unwrap();
    manager
        .create::<LobbyCreated>(ctx(0xE), on_lobby_created)
        .unwrap();
    SELF_HANDLE.with(|h| *h.borrow_mut() = Some(handle));
    MANAGER.with(|m| *m.borrow_mut() = Some(manager));

    let mut payload = LobbyCreated {
        result: 1,
        lobby: SteamId(42),
    };
    assert_eq!(dispatcher.fire(&mut payload), 2);
    assert_eq!(dispatcher.fire(&mut payload), 1);

    let contexts: Vec<usize> = take_calls().iter().map(|c| c.context).collect();
    assert_eq!(contexts.iter().filter(|c| **c == 0xD).count(), 1);
    assert_eq!(contexts.iter().filter(|c| **c == 0xE).count(), 2);

    let manager = MANAGER.with(|m| m.borrow_mut().take()).unwrap();
    assert_eq!(manager.len(), 1);
}
