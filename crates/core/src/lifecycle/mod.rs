//! Degradation-tier lifecycle for a loaded projectM library.
//!
//! ```text
//! Uninitialized --init--> Initializing --> Ready(Full | Reduced) --uninitialize--> Released
//! ```
//!
//! Once a [`LifecycleController`] exists none of its operations return an
//! error. Missing symbols and failing native calls are reported to the
//! observer and turned into no-ops or a one-way demotion from
//! [`DegradationTier::Full`] to [`DegradationTier::Reduced`].

use std::any::Any;
use std::fmt;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::config::VisualizationConfig;
use crate::locator::{self, NativeLibrary};
use crate::observer::{BindingEvent, BindingObserver};
use crate::presets::{Navigation, PresetStateTracker};
use crate::symbols::{
    Callable, Operation, SymbolCandidates, SymbolEntry, SymbolProvider, SymbolTable,
};
use crate::{BindingError, Result};

/// Capability level the binding currently runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationTier {
    /// Init succeeded and render/reset are resolved.
    Full,
    /// Library loaded, but something is missing or init failed. Calls are
    /// attempted opportunistically.
    Reduced,
    /// The library could not be loaded. No controller exists in this tier;
    /// hosts use it to describe a failed construction.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready(DegradationTier),
    /// Terminal state reached through `uninitialize`; the library is gone.
    Released,
}

/// Controller backed by a real shared library.
pub type ProjectMBinding = LifecycleController<NativeLibrary>;

pub struct LifecycleController<P: SymbolProvider> {
    table: SymbolTable,
    provider: Option<P>,
    candidates: SymbolCandidates,
    state: LifecycleState,
    config: Option<VisualizationConfig>,
    presets: PresetStateTracker,
    window_size: Option<(u32, u32)>,
    beat_sensitivity: f32,
    observer: Box<dyn BindingObserver>,
}

impl LifecycleController<NativeLibrary> {
    /// Locates the library and wraps it in a controller.
    ///
    /// This is the only fallible step: if no path loads, no binding exists.
    pub fn open<S: AsRef<Path>>(
        search_paths: &[S],
        candidates: SymbolCandidates,
        observer: Box<dyn BindingObserver>,
    ) -> Result<Self> {
        let library = locator::locate(search_paths, &*observer)?;
        Ok(Self::new(library, candidates, observer))
    }
}

impl<P: SymbolProvider> LifecycleController<P> {
    pub fn new(provider: P, candidates: SymbolCandidates, observer: Box<dyn BindingObserver>) -> Self {
        Self {
            table: SymbolTable::new(),
            provider: Some(provider),
            candidates,
            state: LifecycleState::Uninitialized,
            config: None,
            presets: PresetStateTracker::new(),
            window_size: None,
            beat_sensitivity: 1.0,
            observer,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn tier(&self) -> Option<DegradationTier> {
        match self.state {
            LifecycleState::Ready(tier) => Some(tier),
            _ => None,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.table
    }

    pub fn candidates(&self) -> &SymbolCandidates {
        &self.candidates
    }

    /// Configuration the last successful `init` ran with.
    pub fn config(&self) -> Option<&VisualizationConfig> {
        self.config.as_ref()
    }

    pub fn library(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    /// Resolves every operation and runs the native init call.
    pub fn init(&mut self, config: VisualizationConfig) -> LifecycleState {
        if self.state != LifecycleState::Uninitialized {
            self.reject("init");
            return self.state;
        }

        self.transition(LifecycleState::Initializing);
        self.config = Some(config);
        for operation in Operation::ALL {
            self.callable(operation);
        }

        let tier = match self.callable(Operation::Init) {
            Some(Callable::Init(init)) => {
                let [width, height, mesh_x, mesh_y, fps, texture] = config.init_args();
                // SAFETY: the symbol was bound to the init signature.
                let outcome = guarded(|| unsafe { init(width, height, mesh_x, mesh_y, fps, texture) });
                match outcome {
                    Ok(0) if self.is_resolved(Operation::RenderFrame) && self.is_resolved(Operation::Reset) => {
                        DegradationTier::Full
                    }
                    Ok(0) => DegradationTier::Reduced,
                    Ok(status) => {
                        self.call_failed(Operation::Init, format!("returned status {status}"));
                        DegradationTier::Reduced
                    }
                    Err(reason) => {
                        self.call_failed(Operation::Init, reason);
                        DegradationTier::Reduced
                    }
                }
            }
            _ => DegradationTier::Reduced,
        };

        self.transition(LifecycleState::Ready(tier));
        self.state
    }

    /// Draws one frame. Never fails; a native failure in `Full` demotes the tier.
    pub fn render_frame(&mut self) {
        self.run_void(Operation::RenderFrame);
    }

    /// Resets the engine with the same policy as [`Self::render_frame`].
    pub fn reset(&mut self) {
        self.run_void(Operation::Reset);
    }

    /// Forwards interleaved samples. `channel_count` splits the buffer into
    /// frames; the native side receives the per-channel sample count.
    pub fn add_samples(&mut self, samples: &[f32], channel_count: usize) {
        if !self.require_ready("add_samples") {
            return;
        }
        let pcm = match self.callable(Operation::AddPcm) {
            Some(Callable::Pcm(pcm)) => pcm,
            _ => return self.skipped(Operation::AddPcm),
        };
        if samples.is_empty() {
            return;
        }

        let count = match frame_count(samples.len(), channel_count) {
            Ok(count) => count,
            Err(reason) => return self.call_failed(Operation::AddPcm, reason),
        };

        // SAFETY: `samples` outlives the call and holds at least `count` floats.
        if let Err(reason) = guarded(|| unsafe { pcm(samples.as_ptr(), count) }) {
            self.call_failed(Operation::AddPcm, reason);
        }
    }

    /// Asks the engine for its mesh dimensions, if it can tell.
    pub fn mesh_size(&mut self) -> Option<(i32, i32)> {
        if !self.require_ready("mesh_size") {
            return None;
        }
        let Some(Callable::MeshSize(query)) = self.callable(Operation::MeshSize) else {
            self.skipped(Operation::MeshSize);
            return None;
        };

        let mut x: c_int = 0;
        let mut y: c_int = 0;
        // SAFETY: both out-pointers are valid for the duration of the call.
        match guarded(|| unsafe { query(&mut x, &mut y) }) {
            Ok(()) => Some((x, y)),
            Err(reason) => {
                self.call_failed(Operation::MeshSize, reason);
                None
            }
        }
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        if self.require_alive("set_window_size") {
            self.window_size = Some((width, height));
            self.pass_through("set_window_size", format!("{width}x{height}"));
        }
    }

    pub fn window_size(&self) -> Option<(u32, u32)> {
        self.window_size
    }

    pub fn display_initial_preset(&mut self) {
        self.navigate("display_initial_preset", Navigation::Initial);
    }

    pub fn next_preset(&mut self) {
        self.navigate("next_preset", Navigation::Next);
    }

    pub fn previous_preset(&mut self) {
        self.navigate("previous_preset", Navigation::Previous);
    }

    /// No native preset store exists, so deletion is only recorded.
    pub fn delete_preset(&mut self, physical: bool) {
        if self.require_alive("delete_preset") {
            self.pass_through("delete_preset", format!("physical={physical}"));
        }
    }

    pub fn change_beat_sensitivity(&mut self, delta: f32) {
        if !self.require_alive("change_beat_sensitivity") {
            return;
        }
        if delta.is_finite() {
            self.beat_sensitivity = (self.beat_sensitivity + delta).max(0.0);
        }
        self.pass_through(
            "change_beat_sensitivity",
            format!("delta={delta} now={}", self.beat_sensitivity),
        );
    }

    pub fn beat_sensitivity(&self) -> f32 {
        self.beat_sensitivity
    }

    pub fn lock_preset(&mut self, locked: bool) {
        self.presets.lock_preset(locked);
    }

    pub fn preset_locked(&self) -> bool {
        self.presets.preset_locked()
    }

    pub fn shuffle_playlist(&mut self, on: bool) {
        self.presets.shuffle_playlist(on);
    }

    pub fn preset_shuffle(&self) -> bool {
        self.presets.preset_shuffle()
    }

    pub fn presets(&self) -> &PresetStateTracker {
        &self.presets
    }

    /// Tears the binding down. Safe to call from any state, any number of times.
    pub fn uninitialize(&mut self) {
        if self.state == LifecycleState::Released {
            return;
        }

        if matches!(self.state, LifecycleState::Ready(_)) {
            let teardown = match self.callable(Operation::Cleanup) {
                Some(callable) => Some((Operation::Cleanup, callable)),
                None => self.callable(Operation::Reset).map(|c| (Operation::Reset, c)),
            };
            if let Some((operation, Callable::Void(teardown))) = teardown {
                // SAFETY: bound to the no-argument signature.
                if let Err(reason) = guarded(|| unsafe { teardown() }) {
                    self.call_failed(operation, reason);
                }
            }
        }

        // Pointers in the table die with the library.
        self.table.clear();
        if self.provider.take().is_some() {
            self.observer.on_event(BindingEvent::LibraryReleased);
        }
        self.transition(LifecycleState::Released);
    }

    fn run_void(&mut self, operation: Operation) {
        let LifecycleState::Ready(tier) = self.state else {
            return self.reject(operation.as_str());
        };
        let Some(Callable::Void(call)) = self.callable(operation) else {
            return self.skipped(operation);
        };

        // SAFETY: bound to the no-argument signature.
        if let Err(reason) = guarded(|| unsafe { call() }) {
            self.call_failed(operation, reason);
            if tier == DegradationTier::Full {
                self.demote();
            }
        }
    }

    fn navigate(&mut self, name: &'static str, direction: Navigation) {
        if self.require_alive(name) {
            self.presets.navigate(direction);
            self.pass_through(name, format!("{direction:?}"));
        }
    }

    /// Cached callable for `operation`, resolving it on first use.
    fn callable(&mut self, operation: Operation) -> Option<Callable> {
        let provider = self.provider.as_ref()?;
        match self
            .table
            .resolve(provider, &self.candidates, operation, &*self.observer)
        {
            SymbolEntry::Resolved { callable, .. } => Some(*callable),
            SymbolEntry::Absent => None,
        }
    }

    fn is_resolved(&self, operation: Operation) -> bool {
        self.table
            .get(operation)
            .is_some_and(SymbolEntry::is_resolved)
    }

    fn demote(&mut self) {
        if self.state == LifecycleState::Ready(DegradationTier::Full) {
            self.observer.on_event(BindingEvent::TierDemoted {
                from: DegradationTier::Full,
                to: DegradationTier::Reduced,
            });
            self.transition(LifecycleState::Ready(DegradationTier::Reduced));
        }
    }

    fn transition(&mut self, to: LifecycleState) {
        let from = std::mem::replace(&mut self.state, to);
        self.observer.on_event(BindingEvent::StateChanged { from, to });
    }

    fn require_ready(&self, operation: &'static str) -> bool {
        let ready = matches!(self.state, LifecycleState::Ready(_));
        if !ready {
            self.reject(operation);
        }
        ready
    }

    fn require_alive(&self, operation: &'static str) -> bool {
        let alive = self.state != LifecycleState::Released;
        if !alive {
            self.reject(operation);
        }
        alive
    }

    fn reject(&self, operation: &'static str) {
        self.observer.on_event(BindingEvent::InvalidState {
            operation,
            state: self.state,
        });
    }

    fn skipped(&self, operation: Operation) {
        self.observer.on_event(BindingEvent::Skipped { operation });
    }

    fn pass_through(&self, operation: &'static str, detail: String) {
        self.observer
            .on_event(BindingEvent::PassThrough { operation, detail });
    }

    fn call_failed(&self, operation: Operation, reason: String) {
        let symbol = self
            .table
            .get(operation)
            .and_then(SymbolEntry::symbol)
            .unwrap_or("<unresolved>")
            .to_string();
        self.observer
            .on_event(BindingEvent::Absorbed(BindingError::NativeCallFailure {
                operation,
                symbol,
                reason,
            }));
    }
}

impl<P: SymbolProvider> Drop for LifecycleController<P> {
    fn drop(&mut self) {
        self.uninitialize();
    }
}

impl<P: SymbolProvider> fmt::Debug for LifecycleController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("state", &self.state)
            .field("symbols", &self.table)
            .field("config", &self.config)
            .field("presets", &self.presets)
            .field("window_size", &self.window_size)
            .field("beat_sensitivity", &self.beat_sensitivity)
            .finish()
    }
}

/// Runs a native call, turning an unwind across the boundary into an error.
fn guarded<R>(call: impl FnOnce() -> R) -> std::result::Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "native call unwound".to_string()
    }
}

fn frame_count(len: usize, channel_count: usize) -> std::result::Result<c_int, String> {
    if channel_count == 0 {
        return Err("channel count must be at least 1".to_string());
    }
    c_int::try_from(len / channel_count)
        .map_err(|_| format!("{} frames do not fit a native int", len / channel_count))
}
