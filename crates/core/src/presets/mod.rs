use std::time::Instant;

/// Snapshot of the preset navigation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetState {
    /// No native preset enumeration exists, so this is only set by the host.
    pub current_preset_id: Option<String>,
    pub last_navigation: Option<Instant>,
    pub locked: bool,
    pub shuffle: bool,
}

/// Direction of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Initial,
    Next,
    Previous,
}

/// Pure in-process preset bookkeeping. Never touches the native library.
#[derive(Debug, Default, Clone)]
pub struct PresetStateTracker {
    state: PresetState,
}

impl PresetStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PresetState {
        &self.state
    }

    pub fn lock_preset(&mut self, locked: bool) {
        self.state.locked = locked;
    }

    pub fn preset_locked(&self) -> bool {
        self.state.locked
    }

    pub fn shuffle_playlist(&mut self, on: bool) {
        self.state.shuffle = on;
    }

    pub fn preset_shuffle(&self) -> bool {
        self.state.shuffle
    }

    pub fn display_initial_preset(&mut self) -> Instant {
        self.navigate(Navigation::Initial)
    }

    pub fn next_preset(&mut self) -> Instant {
        self.navigate(Navigation::Next)
    }

    pub fn previous_preset(&mut self) -> Instant {
        self.navigate(Navigation::Previous)
    }

    /// Stamps the navigation time. The direction does not change the current
    /// preset because nothing can enumerate presets natively.
    pub fn navigate(&mut self, _direction: Navigation) -> Instant {
        let now = Instant::now();
        // Never move backwards.
        let stamp = match self.state.last_navigation {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        self.state.last_navigation = Some(stamp);
        stamp
    }

    pub fn last_navigation(&self) -> Option<Instant> {
        self.state.last_navigation
    }

    pub fn current_preset_id(&self) -> Option<&str> {
        self.state.current_preset_id.as_deref()
    }

    /// Records which preset the host believes is on screen.
    pub fn set_current_preset_id(&mut self, id: Option<String>) {
        self.state.current_preset_id = id;
    }
}
