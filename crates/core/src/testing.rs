//! In-crate stand-in for the projectM library used by unit tests.
//!
//! The fake exports `extern "C-unwind"` functions that bump thread-local
//! counters, so each test observes only its own calls.

use std::cell::RefCell;
use std::collections::HashMap;
use std::os::raw::{c_float, c_int};

use crate::symbols::{Callable, Signature, SymbolProvider};

pub mod calls {
    use std::cell::{Cell, RefCell};

    thread_local! {
        pub(super) static INIT: Cell<usize> = const { Cell::new(0) };
        pub(super) static INIT_ARGS: RefCell<Option<[i32; 6]>> = const { RefCell::new(None) };
        pub(super) static RENDER: Cell<usize> = const { Cell::new(0) };
        pub(super) static RESET: Cell<usize> = const { Cell::new(0) };
        pub(super) static CLEANUP: Cell<usize> = const { Cell::new(0) };
        pub(super) static PCM: RefCell<Vec<(f32, i32)>> = const { RefCell::new(Vec::new()) };
    }

    pub fn init() -> usize {
        INIT.with(Cell::get)
    }

    pub fn init_args() -> Option<[i32; 6]> {
        INIT_ARGS.with(|args| *args.borrow())
    }

    pub fn render() -> usize {
        RENDER.with(Cell::get)
    }

    pub fn reset() -> usize {
        RESET.with(Cell::get)
    }

    pub fn cleanup() -> usize {
        CLEANUP.with(Cell::get)
    }

    /// `(first sample, count argument)` for every PCM call.
    pub fn pcm() -> Vec<(f32, i32)> {
        PCM.with(|calls| calls.borrow().clone())
    }
}

fn bump(counter: &'static std::thread::LocalKey<std::cell::Cell<usize>>) {
    counter.with(|c| c.set(c.get() + 1));
}

extern "C-unwind" fn init_ok(w: c_int, h: c_int, mx: c_int, my: c_int, fps: c_int, tex: c_int) -> c_int {
    bump(&calls::INIT);
    calls::INIT_ARGS.with(|args| *args.borrow_mut() = Some([w, h, mx, my, fps, tex]));
    0
}

extern "C-unwind" fn init_fails(_: c_int, _: c_int, _: c_int, _: c_int, _: c_int, _: c_int) -> c_int {
    bump(&calls::INIT);
    -1
}

extern "C-unwind" fn init_panics(_: c_int, _: c_int, _: c_int, _: c_int, _: c_int, _: c_int) -> c_int {
    bump(&calls::INIT);
    panic!("projectM constructor threw");
}

extern "C-unwind" fn render_ok() {
    bump(&calls::RENDER);
}

extern "C-unwind" fn render_panics() {
    bump(&calls::RENDER);
    panic!("render blew up");
}

extern "C-unwind" fn reset_ok() {
    bump(&calls::RESET);
}

extern "C-unwind" fn reset_panics() {
    bump(&calls::RESET);
    panic!("reset blew up");
}

extern "C-unwind" fn cleanup_ok() {
    bump(&calls::CLEANUP);
}

/// # Safety
/// `samples` must be null or point at one readable float.
unsafe extern "C-unwind" fn add_pcm_ok(samples: *const c_float, count: c_int) {
    let first = if samples.is_null() { f32::NAN } else { *samples };
    calls::PCM.with(|calls| calls.borrow_mut().push((first, count)));
}

/// # Safety
/// Both pointers must be writable.
unsafe extern "C-unwind" fn mesh_size_ok(x: *mut c_int, y: *mut c_int) {
    *x = 48;
    *y = 24;
}

/// Symbol provider backed by the functions above.
#[derive(Default)]
pub struct FakeLibrary {
    exports: HashMap<String, Callable>,
    lookups: RefCell<HashMap<String, usize>>,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation exported under its C wrapper name, all succeeding.
    pub fn complete() -> Self {
        Self::new()
            .with_init("projectm_init")
            .with_render("projectm_render_frame")
            .with_reset("projectm_reset")
            .with_pcm("projectm_add_pcm_float")
            .with_cleanup("projectm_cleanup")
            .with_mesh_size("getMeshSize")
    }

    pub fn with(mut self, name: &str, callable: Callable) -> Self {
        self.exports.insert(name.to_string(), callable);
        self
    }

    pub fn with_init(self, name: &str) -> Self {
        self.with(name, Callable::Init(init_ok))
    }

    pub fn with_failing_init(self, name: &str) -> Self {
        self.with(name, Callable::Init(init_fails))
    }

    pub fn with_panicking_init(self, name: &str) -> Self {
        self.with(name, Callable::Init(init_panics))
    }

    pub fn with_render(self, name: &str) -> Self {
        self.with(name, Callable::Void(render_ok))
    }

    pub fn with_panicking_render(self, name: &str) -> Self {
        self.with(name, Callable::Void(render_panics))
    }

    pub fn with_reset(self, name: &str) -> Self {
        self.with(name, Callable::Void(reset_ok))
    }

    pub fn with_panicking_reset(self, name: &str) -> Self {
        self.with(name, Callable::Void(reset_panics))
    }

    pub fn with_cleanup(self, name: &str) -> Self {
        self.with(name, Callable::Void(cleanup_ok))
    }

    pub fn with_pcm(self, name: &str) -> Self {
        self.with(name, Callable::Pcm(add_pcm_ok))
    }

    pub fn with_mesh_size(self, name: &str) -> Self {
        self.with(name, Callable::MeshSize(mesh_size_ok))
    }

    pub fn without(mut self, name: &str) -> Self {
        self.exports.remove(name);
        self
    }

    /// How many times `name` was looked up.
    pub fn lookups(&self, name: &str) -> usize {
        self.lookups.borrow().get(name).copied().unwrap_or(0)
    }
}

impl SymbolProvider for FakeLibrary {
    fn lookup(&self, name: &str, signature: Signature) -> Option<Callable> {
        *self.lookups.borrow_mut().entry(name.to_string()).or_default() += 1;
        self.exports
            .get(name)
            .copied()
            .filter(|callable| callable.signature() == signature)
    }
}
