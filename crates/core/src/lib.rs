//! Runtime binding for the projectM visualization library.
//!
//! The crate finds the shared library on disk, resolves each logical
//! operation against an ordered list of candidate symbol names (plain C
//! wrapper names and C++ mangled variants), and drives the library through a
//! lifecycle that degrades instead of failing when symbols are missing or
//! native calls misbehave. Only locating the library can fail; every
//! operation on a constructed [`LifecycleController`] is infallible.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod locator;
pub mod observer;
pub mod presets;
pub mod symbols;

#[cfg(test)]
mod testing;

pub use config::{ConfigAdapter, VisualizationConfig};
pub use error::{BindingError, Result};
pub use lifecycle::{DegradationTier, LifecycleController, LifecycleState, ProjectMBinding};
pub use locator::{default_search_paths, locate, NativeLibrary};
pub use observer::{BindingEvent, BindingObserver, RecordingObserver, TracingObserver};
pub use presets::{Navigation, PresetState, PresetStateTracker};
pub use symbols::{
    Callable, Operation, Signature, SymbolCandidates, SymbolEntry, SymbolProvider, SymbolTable,
};
