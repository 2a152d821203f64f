use std::path::PathBuf;

use crate::symbols::Operation;

/// Result alias that carries the custom [`BindingError`] type.
pub type Result<T> = std::result::Result<T, BindingError>;

/// Error taxonomy for the native binding.
///
/// Only [`BindingError::LibraryNotFound`] and the host-side I/O variants are
/// ever returned as `Err`. The remaining variants are absorbed by the
/// lifecycle and delivered to the observer instead.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// No candidate path yielded a loadable library.
    #[error("projectM library not found (searched {} path(s)): {reason}", .searched.len())]
    LibraryNotFound {
        searched: Vec<PathBuf>,
        reason: String,
    },
    /// None of the candidate symbol names for an operation are exported.
    #[error("no symbol for `{operation}` among {candidates:?}")]
    SymbolNotFound {
        operation: Operation,
        candidates: Vec<String>,
    },
    /// A resolved symbol was invoked but reported failure or unwound.
    #[error("native call `{symbol}` for `{operation}` failed: {reason}")]
    NativeCallFailure {
        operation: Operation,
        symbol: String,
        reason: String,
    },
    /// A configuration value was missing or malformed and got replaced.
    #[error("configuration value `{key}` is invalid: {reason}")]
    ConfigValueInvalid { key: String, reason: String },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON handed in by the host.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BindingError {
    /// Returns `true` for errors that abort construction of a binding.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LibraryNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_library_not_found_is_fatal() {
        let missing = BindingError::LibraryNotFound {
            searched: vec![PathBuf::from("/nope/libprojectM.so")],
            reason: "no such file".into(),
        };
        assert!(missing.is_fatal());
        assert!(format!("{missing}").contains("1 path(s)"));

        let absent = BindingError::SymbolNotFound {
            operation: Operation::RenderFrame,
            candidates: vec!["renderFrame".into()],
        };
        assert!(!absent.is_fatal());
        assert!(format!("{absent}").contains("render_frame"));
    }
}
