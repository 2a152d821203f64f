//! Observer seam for everything the binding wants to report.
//!
//! Lifecycle code never logs directly. It emits [`BindingEvent`]s to the
//! observer handed in at construction; [`TracingObserver`] forwards them to
//! `tracing` and [`RecordingObserver`] keeps them in memory.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::lifecycle::{DegradationTier, LifecycleState};
use crate::symbols::Operation;
use crate::BindingError;

/// Something noteworthy that happened inside the binding.
#[derive(Debug)]
pub enum BindingEvent {
    /// The shared library was opened from `path`.
    LibraryLoaded { path: PathBuf },
    /// A candidate path existed but could not be loaded.
    LibraryRejected { path: PathBuf, reason: String },
    /// A logical operation was bound to a native symbol.
    SymbolResolved {
        operation: Operation,
        symbol: String,
    },
    /// The lifecycle entered a new state.
    StateChanged {
        from: LifecycleState,
        to: LifecycleState,
    },
    /// The tier dropped after a native failure.
    TierDemoted {
        from: DegradationTier,
        to: DegradationTier,
    },
    /// A non-fatal error was absorbed and converted into degraded behavior.
    Absorbed(BindingError),
    /// A capability call was skipped because its symbol is absent.
    Skipped { operation: Operation },
    /// An operation was called in a state that does not accept it.
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
    /// A host operation that only touches local state.
    PassThrough {
        operation: &'static str,
        detail: String,
    },
    /// The library handle was dropped.
    LibraryReleased,
}

/// Receives events from the binding.
pub trait BindingObserver {
    fn on_event(&self, event: BindingEvent);
}

/// Default observer that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BindingObserver for TracingObserver {
    fn on_event(&self, event: BindingEvent) {
        match event {
            BindingEvent::LibraryLoaded { path } => {
                tracing::info!(path = %path.display(), "loaded projectM library")
            }
            BindingEvent::LibraryRejected { path, reason } => {
                tracing::warn!(path = %path.display(), %reason, "candidate library failed to load")
            }
            BindingEvent::SymbolResolved { operation, symbol } => {
                tracing::debug!(%operation, %symbol, "resolved native symbol")
            }
            BindingEvent::StateChanged { from, to } => {
                tracing::info!(?from, ?to, "lifecycle transition")
            }
            BindingEvent::TierDemoted { from, to } => {
                tracing::warn!(?from, ?to, "degradation tier demoted")
            }
            BindingEvent::Absorbed(error) => tracing::warn!(%error, "absorbed binding error"),
            BindingEvent::Skipped { operation } => {
                tracing::trace!(%operation, "symbol absent, call skipped")
            }
            BindingEvent::InvalidState { operation, state } => {
                tracing::warn!(operation, ?state, "operation ignored in current state")
            }
            BindingEvent::PassThrough { operation, detail } => {
                tracing::debug!(operation, %detail, "local-only operation")
            }
            BindingEvent::LibraryReleased => tracing::info!("released projectM library"),
        }
    }
}

/// Observer that stores every event, handy for tests and for probing.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BindingEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks and returns the recorded events.
    pub fn events(&self) -> MutexGuard<'_, Vec<BindingEvent>> {
        // A poisoned log is still a readable log.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&BindingEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }
}

impl BindingObserver for RecordingObserver {
    fn on_event(&self, event: BindingEvent) {
        self.events().push(event);
    }
}

impl<T: BindingObserver + ?Sized> BindingObserver for std::sync::Arc<T> {
    fn on_event(&self, event: BindingEvent) {
        (**self).on_event(event)
    }
}

impl<T: BindingObserver + ?Sized> BindingObserver for Box<T> {
    fn on_event(&self, event: BindingEvent) {
        (**self).on_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_events_in_order() {
        let observer = RecordingObserver::new();
        observer.on_event(BindingEvent::LibraryReleased);
        observer.on_event(BindingEvent::PassThrough {
            operation: "set_window_size",
            detail: "800x600".into(),
        });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], BindingEvent::LibraryReleased));
        assert!(matches!(
            events[1],
            BindingEvent::PassThrough {
                operation: "set_window_size",
                ..
            }
        ));
    }

    #[test]
    fn tracing_observer_accepts_every_event() {
        let observer = TracingObserver;
        observer.on_event(BindingEvent::StateChanged {
            from: LifecycleState::Uninitialized,
            to: LifecycleState::Initializing,
        });
        observer.on_event(BindingEvent::Absorbed(BindingError::ConfigValueInvalid {
            key: "fps".into(),
            reason: "negative".into(),
        }));
    }
}
