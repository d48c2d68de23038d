//! `Bridge` builder and the operations the C surface forwards to.
//!
//! A bridge ties the layers together: one dispatcher (local or SDK), the
//! handler manager registered with it, the trampolines handlers forward
//! to, and the pump that drives delivery.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use lobbywire_adapter::{Forwarder, HandlerInfo, HandlerManager, TrampolineTable};
use lobbywire_dispatch::{CallbackDispatcher, LocalDispatcher};
#[cfg(feature = "steam")]
use lobbywire_dispatch::{SteamConfig, SteamDispatcher};
use lobbywire_events::{CallbackPayload, EventKind};
use lobbywire_pump::{CallbackPump, PumpConfig, PumpInfo, PumpMetrics};
use lobbywire_registry::HandlerHandle;

use crate::{BridgeConfig, LobbywireError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Backend {
    Local(Arc<LocalDispatcher>),
    Custom(Arc<dyn CallbackDispatcher>),
    #[cfg(feature = "steam")]
    Steam,
}

/// Builder for configuring a [`Bridge`].
///
/// # Example
///
/// ```rust,no_run
/// use lobbywire::prelude::*;
///
/// # fn main() -> Result<(), LobbywireError> {
/// let bridge = Bridge::builder()
///     .pump(PumpConfig::with_rate(60))
///     .build()?;
/// bridge.run_callbacks();
/// # Ok(())
/// # }
/// ```
pub struct BridgeBuilder {
    backend: Backend,
    #[cfg(feature = "steam")]
    steam: SteamConfig,
    trampolines: TrampolineTable,
    pump: PumpConfig,
}

impl BridgeBuilder {
    /// A builder for an in-process bridge with no trampolines.
    pub fn new() -> Self {
        Self {
            backend: Backend::Local(Arc::new(LocalDispatcher::new())),
            #[cfg(feature = "steam")]
            steam: SteamConfig::default(),
            trampolines: TrampolineTable::default(),
            pump: PumpConfig::default(),
        }
    }

    /// Applies a parsed configuration. Does not pick the backend.
    pub fn config(mut self, config: &BridgeConfig) -> Self {
        self.pump = config.pump.clone();
        #[cfg(feature = "steam")]
        {
            self.steam = config.steam.clone();
        }
        self
    }

    /// Delivers through `dispatcher`, which the caller keeps a handle to
    /// for posting events.
    pub fn local(mut self, dispatcher: Arc<LocalDispatcher>) -> Self {
        self.backend = Backend::Local(dispatcher);
        self
    }

    /// Delivers through any dispatcher implementation.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn CallbackDispatcher>) -> Self {
        self.backend = Backend::Custom(dispatcher);
        self
    }

    /// Loads and initialises the SDK at build time.
    #[cfg(feature = "steam")]
    pub fn steam(mut self, config: SteamConfig) -> Self {
        self.steam = config;
        self.backend = Backend::Steam;
        self
    }

    pub fn trampolines(mut self, table: TrampolineTable) -> Self {
        self.trampolines = table;
        self
    }

    pub fn pump(mut self, config: PumpConfig) -> Self {
        self.pump = config;
        self
    }

    /// Builds the bridge.
    ///
    /// # Errors
    /// With the SDK backend, [`LobbywireError::Dispatch`] when the library
    /// cannot be loaded or `SteamAPI_Init` fails.
    pub fn build(self) -> Result<Bridge, LobbywireError> {
        let mut local = None;
        #[cfg(feature = "steam")]
        let mut steam = None;

        let dispatcher: Arc<dyn CallbackDispatcher> = match self.backend {
            Backend::Local(dispatcher) => {
                local = Some(Arc::clone(&dispatcher));
                dispatcher
            }
            Backend::Custom(dispatcher) => dispatcher,
            #[cfg(feature = "steam")]
            Backend::Steam => {
                let dispatcher = Arc::new(SteamDispatcher::start(&self.steam)?);
                steam = Some(Arc::clone(&dispatcher));
                dispatcher
            }
        };

        let missing = self.trampolines.missing();
        if !missing.is_empty() {
            tracing::debug!(?missing, "bridge built without some trampolines");
        }
        tracing::info!(dispatcher = dispatcher.name(), "bridge ready");

        Ok(Bridge {
            handlers: Mutex::new(HandlerManager::new(Arc::clone(&dispatcher))),
            dispatcher,
            local,
            #[cfg(feature = "steam")]
            steam,
            trampolines: RwLock::new(self.trampolines),
            pump: Mutex::new(CallbackPump::new(self.pump)),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running bridge between SDK callbacks and extension-module trampolines.
///
/// All operations take `&self` and are safe to call from forwarders and
/// from other threads. No internal lock is held while callbacks are
/// delivered or while handlers unregister.
pub struct Bridge {
    handlers: Mutex<HandlerManager>,
    dispatcher: Arc<dyn CallbackDispatcher>,
    local: Option<Arc<LocalDispatcher>>,
    #[cfg(feature = "steam")]
    steam: Option<Arc<SteamDispatcher>>,
    trampolines: RwLock<TrampolineTable>,
    pump: Mutex<CallbackPump>,
    shut_down: AtomicBool,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    fn ensure_running(&self) -> Result<(), LobbywireError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(LobbywireError::NotInitialized);
        }
        Ok(())
    }

    /// Creates a handler for `kind` forwarding to the installed trampoline.
    ///
    /// # Errors
    /// - [`LobbywireError::NotInitialized`] after [`shutdown`](Self::shutdown).
    /// - [`LobbywireError::Adapter`] for a null context or a kind with no
    ///   trampoline installed.
    pub fn create(
        &self,
        kind: EventKind,
        context: *mut c_void,
    ) -> Result<HandlerHandle, LobbywireError> {
        self.ensure_running()?;
        let table = self.trampolines();
        lock(&self.handlers)
            .create_kind(kind, context, &table)
            .map_err(|e| {
                tracing::warn!(%kind, ?context, error = %e, "handler creation refused");
                e.into()
            })
    }

    /// Creates a handler for `P` forwarding to `forward`, bypassing the
    /// trampoline table.
    pub fn subscribe<P: CallbackPayload>(
        &self,
        context: *mut c_void,
        forward: Forwarder<P>,
    ) -> Result<HandlerHandle, LobbywireError> {
        self.ensure_running()?;
        lock(&self.handlers)
            .create::<P>(context, forward)
            .map_err(|e| {
                tracing::warn!(kind = %P::KIND, ?context, error = %e, "handler creation refused");
                e.into()
            })
    }

    /// Destroys a `kind` handler. A handle of another kind is refused and
    /// left alive.
    ///
    /// If another thread is delivering to this handler, waits for that
    /// delivery to return.
    pub fn destroy(&self, kind: EventKind, handle: HandlerHandle) -> Result<(), LobbywireError> {
        self.ensure_running()?;
        let detached = lock(&self.handlers).detach_kind(kind, handle);
        match detached {
            // Unregisters with the manager lock released.
            Ok((_, handler)) => {
                drop(handler);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%kind, %handle, error = %e, "handler destruction refused");
                Err(e.into())
            }
        }
    }

    /// Destroys a handler of any kind.
    pub fn destroy_any(&self, handle: HandlerHandle) -> Result<EventKind, LobbywireError> {
        self.ensure_running()?;
        let detached = lock(&self.handlers).detach(handle);
        match detached {
            Ok((info, handler)) => {
                drop(handler);
                Ok(info.kind)
            }
            Err(e) => {
                tracing::warn!(%handle, error = %e, "handler destruction refused");
                Err(e.into())
            }
        }
    }

    /// Looks up a live handler.
    pub fn handler(&self, handle: HandlerHandle) -> Result<HandlerInfo, LobbywireError> {
        Ok(lock(&self.handlers).get(handle)?)
    }

    /// Pumps the dispatcher if the pump says a delivery is due.
    ///
    /// Forwarders run inside this call, on this thread.
    pub fn run_callbacks(&self) -> Option<PumpInfo> {
        if self.ensure_running().is_err() {
            return None;
        }
        // Both locks are released while callbacks run.
        let ticket = lock(&self.pump).due(Instant::now())?;
        let start = Instant::now();
        self.dispatcher.run_callbacks();
        let elapsed = start.elapsed();
        Some(lock(&self.pump).record(ticket, elapsed))
    }

    /// Destroys every handler and, with the SDK backend, shuts the SDK
    /// down. Every later operation fails with `NotInitialized`. Returns
    /// the number of handlers destroyed.
    pub fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let detached = lock(&self.handlers).detach_all();
        let destroyed = detached.len();
        drop(detached);
        #[cfg(feature = "steam")]
        {
            if let Some(steam) = &self.steam {
                steam.shutdown();
            }
        }
        tracing::info!(destroyed, "bridge shut down");
        destroyed
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Number of live handlers.
    pub fn active_handlers(&self) -> usize {
        lock(&self.handlers).len()
    }

    /// Number of live handlers of `kind`.
    pub fn count_by_kind(&self, kind: EventKind) -> usize {
        lock(&self.handlers).count_by_kind(kind)
    }

    /// Replaces the trampoline table. Existing handlers keep the
    /// forwarder they were created with.
    pub fn install_trampolines(&self, table: TrampolineTable) {
        *self
            .trampolines
            .write()
            .unwrap_or_else(PoisonError::into_inner) = table;
        tracing::debug!(missing = ?table.missing(), "trampolines installed");
    }

    /// A copy of the current trampoline table.
    pub fn trampolines(&self) -> TrampolineTable {
        *self
            .trampolines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dispatcher(&self) -> &Arc<dyn CallbackDispatcher> {
        &self.dispatcher
    }

    /// The in-process dispatcher, when the bridge uses one.
    pub fn local_dispatcher(&self) -> Option<&Arc<LocalDispatcher>> {
        self.local.as_ref()
    }

    pub fn pause_pump(&self) {
        lock(&self.pump).pause();
    }

    pub fn resume_pump(&self) {
        lock(&self.pump).resume();
    }

    pub fn pump_metrics(&self) -> PumpMetrics {
        lock(&self.pump).metrics().clone()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("dispatcher", &self.dispatcher.name())
            .field("handlers", &self.active_handlers())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
