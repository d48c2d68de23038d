//! The real SDK, loaded at runtime with `libloading`.
//!
//! The game ships the SDK's shared library next to its executable. We
//! look for it in a list of candidate locations, bind the flat C entry
//! points we need, and forward registrations to
//! `SteamAPI_RegisterCallback` / `SteamAPI_UnregisterCallback`.
//!
//! `SteamAPI_Init` should run before the game creates its window so the
//! overlay can hook the renderer.

use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use libloading::Library;
use lobbywire_events::CallbackId;
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};

use crate::{CallbackBase, CallbackDispatcher, DispatchError};

/// File name of the SDK library on this platform.
pub const fn default_library_name() -> &'static str {
    if cfg!(windows) {
        if cfg!(target_pointer_width = "64") {
            "steam_api64.dll"
        } else {
            "steam_api.dll"
        }
    } else if cfg!(target_os = "macos") {
        "libsteam_api.dylib"
    } else {
        "libsteam_api.so"
    }
}

// ---------------------------------------------------------------------------
// SteamConfig
// ---------------------------------------------------------------------------

/// Where to find the SDK library and how to initialise it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamConfig {
    /// Extra candidate paths, tried before the defaults. Each entry may be
    /// a file or a directory containing [`default_library_name`].
    pub library_paths: Vec<PathBuf>,

    /// Use `SteamAPI_InitSafe` when the library exports it, falling back
    /// to `SteamAPI_Init`.
    pub prefer_init_safe: bool,

    /// Also try the bare library name, letting the platform loader search
    /// its usual paths.
    pub search_system_paths: bool,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            library_paths: Vec::new(),
            prefer_init_safe: true,
            search_system_paths: false,
        }
    }
}

impl SteamConfig {
    /// Candidate paths in the order they are tried: configured paths,
    /// the executable's directory, then the working directory.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let name = default_library_name();
        let mut out: Vec<PathBuf> = self
            .library_paths
            .iter()
            .map(|p| if p.is_dir() { p.join(name) } else { p.clone() })
            .collect();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            out.push(dir.join(name));
        }
        if let Ok(cwd) = std::env::current_dir() {
            out.push(cwd.join(name));
        }
        out.dedup();
        out
    }
}

// ---------------------------------------------------------------------------
// Bound entry points
// ---------------------------------------------------------------------------

type InitFn = unsafe extern "C" fn() -> bool;
type VoidFn = unsafe extern "C" fn();
type RegisterFn = unsafe extern "C" fn(*mut CallbackBase, i32);
type UnregisterFn = unsafe extern "C" fn(*mut CallbackBase);

struct SteamApi {
    init: InitFn,
    shutdown: VoidFn,
    run_callbacks: VoidFn,
    register: RegisterFn,
    unregister: UnregisterFn,
    // Keeps the function pointers above valid; dropped last.
    _library: Library,
}

/// Copies a function pointer out of `library`.
///
/// # Safety
/// `T` must be the symbol's real signature.
unsafe fn bind<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, DispatchError> {
    let name = format!("{symbol}\0");
    // SAFETY: forwarded to the caller.
    let sym = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|source| DispatchError::MissingSymbol { symbol, source })?;
    Ok(*sym)
}

impl SteamApi {
    fn bind(library: Library, prefer_init_safe: bool) -> Result<Self, DispatchError> {
        // SAFETY: signatures below are the SDK's flat C declarations.
        unsafe {
            let init = if prefer_init_safe {
                bind::<InitFn>(&library, "SteamAPI_InitSafe")
                    .or_else(|_| bind::<InitFn>(&library, "SteamAPI_Init"))?
            } else {
                bind::<InitFn>(&library, "SteamAPI_Init")?
            };
            Ok(Self {
                init,
                shutdown: bind(&library, "SteamAPI_Shutdown")?,
                run_callbacks: bind(&library, "SteamAPI_RunCallbacks")?,
                register: bind(&library, "SteamAPI_RegisterCallback")?,
                unregister: bind(&library, "SteamAPI_UnregisterCallback")?,
                _library: library,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// SteamDispatcher
// ---------------------------------------------------------------------------

/// [`CallbackDispatcher`] backed by the SDK library.
///
/// One per process. `init` and `shutdown` are idempotent, and dropping
/// the dispatcher shuts the SDK down if it is still running.
pub struct SteamDispatcher {
    api: SteamApi,
    path: PathBuf,
    initialized: AtomicBool,
    /// Held across `SteamAPI_RunCallbacks` and every unregistration, so
    /// no other thread frees an object the SDK is calling into.
    delivering: ReentrantMutex<()>,
}

impl SteamDispatcher {
    /// Loads the SDK library from the first candidate that opens and
    /// binds its entry points. Does not initialise the SDK.
    pub fn load(config: &SteamConfig) -> Result<Self, DispatchError> {
        let mut tried = config.candidates();
        if config.search_system_paths {
            tried.push(PathBuf::from(default_library_name()));
        }

        for path in &tried {
            let is_bare = path.components().count() == 1;
            if !is_bare && !path.exists() {
                continue;
            }
            // SAFETY: loading the SDK runs its initialisers, which have no
            // preconditions beyond being loaded once per path.
            match unsafe { Library::new(path) } {
                Ok(library) => {
                    let api = SteamApi::bind(library, config.prefer_init_safe)?;
                    tracing::info!(path = %path.display(), "SDK library loaded");
                    return Ok(Self {
                        api,
                        path: path.clone(),
                        initialized: AtomicBool::new(false),
                        delivering: ReentrantMutex::new(()),
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        error = %e,
                        "SDK library failed to load"
                    );
                }
            }
        }

        Err(DispatchError::LibraryNotFound { tried })
    }

    /// Loads the library and initialises the SDK in one step.
    pub fn start(config: &SteamConfig) -> Result<Self, DispatchError> {
        let dispatcher = Self::load(config)?;
        dispatcher.init()?;
        Ok(dispatcher)
    }

    /// Initialises the SDK. Does nothing if already initialised.
    pub fn init(&self) -> Result<(), DispatchError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        // SAFETY: bound from the loaded library with the SDK's signature.
        let ok = unsafe { (self.api.init)() };
        if !ok {
            tracing::warn!("SteamAPI_Init returned false");
            return Err(DispatchError::InitFailed);
        }
        self.initialized.store(true, Ordering::Release);
        tracing::info!("SDK initialised");
        Ok(())
    }

    /// Shuts the SDK down. Does nothing if not initialised.
    pub fn shutdown(&self) {
        if self.initialized.swap(false, Ordering::AcqRel) {
            // SAFETY: bound from the loaded library with the SDK's signature.
            unsafe { (self.api.shutdown)() };
            tracing::info!("SDK shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The library file that was loaded.
    pub fn library_path(&self) -> &Path {
        &self.path
    }
}

impl CallbackDispatcher for SteamDispatcher {
    unsafe fn register(&self, base: NonNull<CallbackBase>, callback_id: CallbackId) {
        // SAFETY: the caller upholds the register contract, which is the
        // SDK's own contract for `SteamAPI_RegisterCallback`.
        unsafe { (self.api.register)(base.as_ptr(), callback_id.raw()) };
    }

    unsafe fn unregister(&self, base: NonNull<CallbackBase>) {
        let _delivering = self.delivering.lock();
        // SAFETY: as for `register`.
        unsafe { (self.api.unregister)(base.as_ptr()) };
    }

    fn run_callbacks(&self) {
        if self.is_initialized() {
            let _delivering = self.delivering.lock();
            // SAFETY: bound from the loaded library with the SDK's signature.
            unsafe { (self.api.run_callbacks)() };
        }
    }

    fn name(&self) -> &'static str {
        "steam"
    }
}

impl Drop for SteamDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SteamDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteamDispatcher")
            .field("path", &self.path)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_prefer_init_safe() {
        let config = SteamConfig::default();
        assert!(config.prefer_init_safe);
        assert!(config.library_paths.is_empty());
        assert!(!config.search_system_paths);
    }

    #[test]
    fn test_config_deserializes_with_missing_fields() {
        let config: SteamConfig =
            serde_json::from_str(r#"{ "library_paths": ["sdk/bin"] }"#).unwrap();
        assert_eq!(config.library_paths, vec![PathBuf::from("sdk/bin")]);
        assert!(config.prefer_init_safe);
    }

    #[test]
    fn test_candidates_put_configured_paths_first() {
        let config = SteamConfig {
            library_paths: vec![PathBuf::from("/nonexistent/custom_steam_api.so")],
            ..SteamConfig::default()
        };
        let candidates = config.candidates();
        assert_eq!(
            candidates[0],
            PathBuf::from("/nonexistent/custom_steam_api.so")
        );
        assert!(candidates.len() >= 2);
    }

    #[test]
    fn test_load_missing_library_reports_tried_paths() {
        let config = SteamConfig {
            library_paths: vec![PathBuf::from("/nonexistent/dir/libsteam_api.so")],
            ..SteamConfig::default()
        };
        match SteamDispatcher::load(&config) {
            Err(DispatchError::LibraryNotFound { tried }) => {
                assert!(tried.contains(&PathBuf::from("/nonexistent/dir/libsteam_api.so")));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("no SDK library should be found under /nonexistent"),
        }
    }
}
