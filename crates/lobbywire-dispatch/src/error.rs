//! Error types for the dispatch layer.

use std::path::PathBuf;

/// Errors that can occur while bringing up an SDK dispatcher.
///
/// Registration itself never fails: the SDK's register/unregister calls
/// return nothing, and the local dispatcher mirrors that.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// None of the candidate library paths could be loaded.
    #[error("SDK library not found (tried: {})", join_paths(.tried))]
    LibraryNotFound { tried: Vec<PathBuf> },

    /// The library loaded but lacks a required entry point.
    #[cfg(feature = "steam")]
    #[error("SDK library is missing `{symbol}`: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// `SteamAPI_Init` returned false: the client isn't running, the user
    /// isn't logged in, or the app id file is missing.
    #[error("SDK initialisation failed (is the Steam client running and steam_appid.txt present?)")]
    InitFailed,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_not_found_lists_every_path() {
        let err = DispatchError::LibraryNotFound {
            tried: vec![PathBuf::from("a/steam_api64.dll"), PathBuf::from("b/steam_api64.dll")],
        };
        let msg = err.to_string();
        assert!(msg.contains("a/steam_api64.dll"));
        assert!(msg.contains("b/steam_api64.dll"));
    }
}
