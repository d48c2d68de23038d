//! Handler manager: creates, tracks, and destroys handlers of every kind.

use std::ffi::c_void;
use std::sync::Arc;

use lobbywire_dispatch::CallbackDispatcher;
use lobbywire_events::{
    CallbackPayload, EventKind, GameLobbyJoinRequested, GameOverlayActivated,
    GameRichPresenceJoinRequested, LobbyChatUpdate, LobbyCreated, LobbyDataUpdate, LobbyEnter,
    LobbyInvite,
};
use lobbywire_registry::{HandleRegistry, HandlerHandle};

use crate::{AdapterError, AnyHandler, CallbackHandler, Forwarder, TrampolineTable};

/// What a live handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerInfo {
    pub handle: HandlerHandle,
    pub kind: EventKind,
    pub context: *mut c_void,
}

/// Owns every live handler, keyed by [`HandlerHandle`].
///
/// This is the entry point for handler operations from higher layers
/// (the bridge and its C surface). All handlers share one dispatcher.
///
/// Not thread-safe by itself; the bridge keeps it behind a mutex. That
/// mutex must not be held while the dispatcher pumps, since forwarders
/// are allowed to come back and destroy handlers. Nor may it be held
/// while a handler drops: unregistering waits for a delivery running on
/// another thread, whose forwarder may be waiting for the same mutex.
/// Callers sharing a manager use the `detach*` methods and drop the
/// returned handler after releasing their lock.
pub struct HandlerManager {
    dispatcher: Arc<dyn CallbackDispatcher>,
    handlers: HandleRegistry<Box<dyn AnyHandler>>,
}

impl HandlerManager {
    /// Creates an empty manager registering with `dispatcher`.
    pub fn new(dispatcher: Arc<dyn CallbackDispatcher>) -> Self {
        Self {
            dispatcher,
            handlers: HandleRegistry::new(),
        }
    }

    /// Subscribes `forward` to `P`'s event kind on behalf of `context`.
    ///
    /// # Errors
    /// - [`AdapterError::NullContext`] if `context` is null.
    /// - [`AdapterError::Registry`] if the registry is full.
    pub fn create<P: CallbackPayload>(
        &mut self,
        context: *mut c_void,
        forward: Forwarder<P>,
    ) -> Result<HandlerHandle, AdapterError> {
        let handler = CallbackHandler::<P>::new(Arc::clone(&self.dispatcher), context, forward)?;
        // If the insert fails the handler drops here and unregisters.
        let handle = self.handlers.insert(Box::new(handler))?;
        tracing::debug!(kind = %P::KIND, %handle, ?context, "handler created");
        Ok(handle)
    }

    /// Subscribes to `kind` using the forwarder installed in `table`.
    ///
    /// # Errors
    /// [`AdapterError::MissingForwarder`] if `table` has no forwarder for
    /// `kind`, plus everything [`create`](Self::create) returns.
    pub fn create_kind(
        &mut self,
        kind: EventKind,
        context: *mut c_void,
        table: &TrampolineTable,
    ) -> Result<HandlerHandle, AdapterError> {
        fn installed<P>(
            slot: Option<Forwarder<P>>,
            kind: EventKind,
        ) -> Result<Forwarder<P>, AdapterError> {
            slot.ok_or(AdapterError::MissingForwarder(kind))
        }

        match kind {
            EventKind::LobbyCreated => {
                self.create::<LobbyCreated>(context, installed(table.lobby_created, kind)?)
            }
            EventKind::LobbyEnter => {
                self.create::<LobbyEnter>(context, installed(table.lobby_enter, kind)?)
            }
            EventKind::LobbyChatUpdate => {
                self.create::<LobbyChatUpdate>(context, installed(table.lobby_chat_update, kind)?)
            }
            EventKind::LobbyDataUpdate => {
                self.create::<LobbyDataUpdate>(context, installed(table.lobby_data_update, kind)?)
            }
            EventKind::LobbyInvite => {
                self.create::<LobbyInvite>(context, installed(table.lobby_invite, kind)?)
            }
            EventKind::JoinRequested => self
                .create::<GameLobbyJoinRequested>(context, installed(table.join_requested, kind)?),
            EventKind::RichPresenceJoinRequested => self.create::<GameRichPresenceJoinRequested>(
                context,
                installed(table.game_rich_presence_join_requested, kind)?,
            ),
            EventKind::OverlayActivated => self.create::<GameOverlayActivated>(
                context,
                installed(table.game_overlay_activated, kind)?,
            ),
        }
    }

    /// Removes the handler behind `handle`, whatever its kind, without
    /// unregistering it. Dropping the returned handler unregisters it.
    pub fn detach(
        &mut self,
        handle: HandlerHandle,
    ) -> Result<(HandlerInfo, Box<dyn AnyHandler>), AdapterError> {
        let handler = self.handlers.remove(handle)?;
        let info = HandlerInfo {
            handle,
            kind: handler.kind(),
            context: handler.context(),
        };
        tracing::debug!(kind = %info.kind, %handle, "handler detached");
        Ok((info, handler))
    }

    /// Like [`detach`](Self::detach), but only if `handle` is a `kind`
    /// handler. A mismatch leaves the handler in place.
    pub fn detach_kind(
        &mut self,
        kind: EventKind,
        handle: HandlerHandle,
    ) -> Result<(HandlerInfo, Box<dyn AnyHandler>), AdapterError> {
        let found = self.handlers.get(handle)?.kind();
        if found != kind {
            return Err(AdapterError::KindMismatch {
                handle,
                expected: kind,
                found,
            });
        }
        self.detach(handle)
    }

    /// Removes every handler without unregistering any of them.
    pub fn detach_all(&mut self) -> Vec<Box<dyn AnyHandler>> {
        self.handlers
            .drain()
            .into_iter()
            .map(|(_, handler)| handler)
            .collect()
    }

    /// Destroys the handler behind `handle`, whatever its kind. Once this
    /// returns its forwarder is never called again.
    pub fn destroy(&mut self, handle: HandlerHandle) -> Result<HandlerInfo, AdapterError> {
        let (info, handler) = self.detach(handle)?;
        drop(handler);
        Ok(info)
    }

    /// Destroys the handler behind `handle` only if it is a `kind`
    /// handler. A mismatch leaves the handler alive.
    pub fn destroy_kind(
        &mut self,
        kind: EventKind,
        handle: HandlerHandle,
    ) -> Result<HandlerInfo, AdapterError> {
        let (info, handler) = self.detach_kind(kind, handle)?;
        drop(handler);
        Ok(info)
    }

    /// Looks up a live handler.
    pub fn get(&self, handle: HandlerHandle) -> Result<HandlerInfo, AdapterError> {
        let handler = self.handlers.get(handle)?;
        Ok(HandlerInfo {
            handle,
            kind: handler.kind(),
            context: handler.context(),
        })
    }

    /// Number of live handlers of `kind`.
    pub fn count_by_kind(&self, kind: EventKind) -> usize {
        self.handlers
            .iter()
            .filter(|(_, handler)| handler.kind() == kind)
            .count()
    }

    /// Info for every live handler, in handle index order.
    pub fn handlers(&self) -> Vec<HandlerInfo> {
        self.handlers
            .iter()
            .map(|(handle, handler)| HandlerInfo {
                handle,
                kind: handler.kind(),
                context: handler.context(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Destroys every handler. Returns how many there were.
    pub fn destroy_all(&mut self) -> usize {
        let detached = self.detach_all();
        let count = detached.len();
        drop(detached);
        if count > 0 {
            tracing::debug!(count, "all handlers destroyed");
        }
        count
    }

    /// The dispatcher handlers register with.
    pub fn dispatcher(&self) -> &Arc<dyn CallbackDispatcher> {
        &self.dispatcher
    }
}

impl std::fmt::Debug for HandlerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerManager")
            .field("dispatcher", &self.dispatcher.name())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
