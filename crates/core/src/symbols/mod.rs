//! Symbol resolution against ordered candidate names, cached per instance.
//!
//! projectM builds disagree on how they export their entry points: the C
//! wrapper uses `projectm_*` names, the C++ library exports Itanium-mangled
//! members, and some builds export nothing usable at all. Each logical
//! [`Operation`] therefore carries an ordered list of candidate names and the
//! first one that exists wins. Results, including misses, are cached in a
//! [`SymbolTable`] and never looked up again.

use std::collections::BTreeMap;
use std::fmt;
use std::os::raw::{c_float, c_int};

use serde::{Deserialize, Serialize};

use crate::observer::{BindingEvent, BindingObserver};
use crate::BindingError;

/// `int init(int width, int height, int mesh_x, int mesh_y, int fps, int texture_size)`
pub type InitFn = unsafe extern "C-unwind" fn(c_int, c_int, c_int, c_int, c_int, c_int) -> c_int;
/// `void op(void)`, used by render, reset and cleanup.
pub type VoidFn = unsafe extern "C-unwind" fn();
/// `void add_pcm(const float *samples, int count)`
pub type PcmFn = unsafe extern "C-unwind" fn(*const c_float, c_int);
/// `void get_mesh_size(int *x, int *y)`
pub type MeshSizeFn = unsafe extern "C-unwind" fn(*mut c_int, *mut c_int);

/// Logical operations the binding knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Init,
    RenderFrame,
    Reset,
    AddPcm,
    Cleanup,
    MeshSize,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Init,
        Operation::RenderFrame,
        Operation::Reset,
        Operation::AddPcm,
        Operation::Cleanup,
        Operation::MeshSize,
    ];

    /// The native type signature the operation is bound to.
    pub fn signature(self) -> Signature {
        match self {
            Operation::Init => Signature::Init,
            Operation::RenderFrame | Operation::Reset | Operation::Cleanup => Signature::Void,
            Operation::AddPcm => Signature::Pcm,
            Operation::MeshSize => Signature::MeshSize,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::RenderFrame => "render_frame",
            Operation::Reset => "reset",
            Operation::AddPcm => "add_pcm",
            Operation::Cleanup => "cleanup",
            Operation::MeshSize => "mesh_size",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared argument/return shape of a native entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Init,
    Void,
    Pcm,
    MeshSize,
}

/// A native function pointer tagged with its signature.
#[derive(Clone, Copy)]
pub enum Callable {
    Init(InitFn),
    Void(VoidFn),
    Pcm(PcmFn),
    MeshSize(MeshSizeFn),
}

impl Callable {
    pub fn signature(&self) -> Signature {
        match self {
            Callable::Init(_) => Signature::Init,
            Callable::Void(_) => Signature::Void,
            Callable::Pcm(_) => Signature::Pcm,
            Callable::MeshSize(_) => Signature::MeshSize,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callable").field(&self.signature()).finish()
    }
}

/// Cached outcome of resolving one logical operation.
#[derive(Debug, Clone)]
pub enum SymbolEntry {
    Resolved { symbol: String, callable: Callable },
    Absent,
}

impl SymbolEntry {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SymbolEntry::Resolved { .. })
    }

    /// Name of the native symbol backing the entry, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            SymbolEntry::Resolved { symbol, .. } => Some(symbol),
            SymbolEntry::Absent => None,
        }
    }
}

/// Source of native function pointers, usually a loaded shared library.
///
/// Implementations return `None` when `name` is not exported. They must not
/// check that the exported symbol really has `signature`; that contract
/// belongs to whoever supplies the candidate names.
pub trait SymbolProvider {
    fn lookup(&self, name: &str, signature: Signature) -> Option<Callable>;
}

/// Ordered candidate symbol names per logical operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SymbolCandidates {
    pub init: Vec<String>,
    pub render_frame: Vec<String>,
    pub reset: Vec<String>,
    pub add_pcm: Vec<String>,
    pub cleanup: Vec<String>,
    pub mesh_size: Vec<String>,
}

impl Default for SymbolCandidates {
    /// C wrapper names first, then projectM 3.x mangled members, then the
    /// bare member names some stripped builds export.
    fn default() -> Self {
        Self {
            init: names(&[
                "projectm_init",
                "_ZN8projectM13projectM_initEiiiiii",
                "projectM_init",
            ]),
            render_frame: names(&[
                "projectm_render_frame",
                "_ZN8projectM11renderFrameEv",
                "renderFrame",
            ]),
            reset: names(&[
                "projectm_reset",
                "_ZN8projectM14projectM_resetEv",
                "projectM_reset",
            ]),
            add_pcm: names(&[
                "projectm_add_pcm_float",
                "_ZN3PCM11addPCMfloatEPKfi",
                "addPCMfloat",
            ]),
            cleanup: names(&["projectm_cleanup"]),
            mesh_size: names(&["projectm_get_mesh_size", "_ZN8projectM11getMeshSizeEPiS0_", "getMeshSize"]),
        }
    }
}

impl SymbolCandidates {
    /// Candidate list with nothing in it, for building overrides by hand.
    pub fn empty() -> Self {
        Self {
            init: Vec::new(),
            render_frame: Vec::new(),
            reset: Vec::new(),
            add_pcm: Vec::new(),
            cleanup: Vec::new(),
            mesh_size: Vec::new(),
        }
    }

    pub fn for_operation(&self, operation: Operation) -> &[String] {
        match operation {
            Operation::Init => &self.init,
            Operation::RenderFrame => &self.render_frame,
            Operation::Reset => &self.reset,
            Operation::AddPcm => &self.add_pcm,
            Operation::Cleanup => &self.cleanup,
            Operation::MeshSize => &self.mesh_size,
        }
    }

    pub fn set(&mut self, operation: Operation, candidates: Vec<String>) {
        let slot = match operation {
            Operation::Init => &mut self.init,
            Operation::RenderFrame => &mut self.render_frame,
            Operation::Reset => &mut self.reset,
            Operation::AddPcm => &mut self.add_pcm,
            Operation::Cleanup => &mut self.cleanup,
            Operation::MeshSize => &mut self.mesh_size,
        };
        *slot = candidates;
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

/// Walks `candidates` in order and returns the first one `provider` exports.
pub fn resolve(
    provider: &dyn SymbolProvider,
    operation: Operation,
    candidates: &[String],
) -> SymbolEntry {
    let signature = operation.signature();
    candidates
        .iter()
        .find_map(|name| {
            provider
                .lookup(name, signature)
                .map(|callable| SymbolEntry::Resolved {
                    symbol: name.clone(),
                    callable,
                })
        })
        .unwrap_or(SymbolEntry::Absent)
}

/// Write-once cache of resolution results.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: BTreeMap<Operation, SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `operation`, if it was resolved already.
    pub fn get(&self, operation: Operation) -> Option<&SymbolEntry> {
        self.entries.get(&operation)
    }

    /// Returns the cached entry, resolving and caching it on first use.
    pub fn resolve(
        &mut self,
        provider: &dyn SymbolProvider,
        candidates: &SymbolCandidates,
        operation: Operation,
        observer: &dyn BindingObserver,
    ) -> &SymbolEntry {
        self.entries.entry(operation).or_insert_with(|| {
            let list = candidates.for_operation(operation);
            let entry = resolve(provider, operation, list);
            match &entry {
                SymbolEntry::Resolved { symbol, .. } => {
                    observer.on_event(BindingEvent::SymbolResolved {
                        operation,
                        symbol: symbol.clone(),
                    })
                }
                SymbolEntry::Absent => {
                    observer.on_event(BindingEvent::Absorbed(BindingError::SymbolNotFound {
                        operation,
                        candidates: list.to_vec(),
                    }))
                }
            }
            entry
        })
    }

    /// Every cached entry in operation order.
    pub fn entries(&self) -> impl Iterator<Item = (Operation, &SymbolEntry)> {
        self.entries.iter().map(|(operation, entry)| (*operation, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached pointer. Only valid right before the library goes away.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::testing::{calls, FakeLibrary};

    fn list(items: &[&str]) -> Vec<String> {
        names(items)
    }

    #[test]
    fn picks_first_existing_candidate_in_order() {
        let library = FakeLibrary::new().with_render("B").with_render("C");
        let entry = resolve(&library, Operation::RenderFrame, &list(&["A", "B", "C"]));

        assert_eq!(entry.symbol(), Some("B"));
    }

    #[test]
    fn absent_when_no_candidate_exists() {
        let library = FakeLibrary::new();
        let entry = resolve(&library, Operation::Init, &list(&["A", "B"]));

        assert!(!entry.is_resolved());
    }

    #[test]
    fn signature_mismatch_is_not_a_match() {
        let library = FakeLibrary::new().with_render("projectm_init");
        let entry = resolve(&library, Operation::Init, &list(&["projectm_init"]));

        assert!(!entry.is_resolved());
    }

    #[test]
    fn table_caches_hits_and_misses() {
        let library = FakeLibrary::new().with_render("renderFrame");
        let candidates = SymbolCandidates::default();
        let observer = RecordingObserver::new();
        let mut table = SymbolTable::new();

        table.resolve(&library, &candidates, Operation::RenderFrame, &observer);
        table.resolve(&library, &candidates, Operation::Reset, &observer);
        table.resolve(&library, &candidates, Operation::RenderFrame, &observer);
        table.resolve(&library, &candidates, Operation::Reset, &observer);

        assert_eq!(library.lookups("renderFrame"), 1);
        assert_eq!(library.lookups("projectm_reset"), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(observer.events().len(), 2);
        assert_eq!(
            table.get(Operation::RenderFrame).and_then(SymbolEntry::symbol),
            Some("renderFrame")
        );
        assert!(!table.get(Operation::Reset).unwrap().is_resolved());
        assert_eq!(calls::render(), 0);
    }

    #[test]
    fn default_candidates_cover_every_operation() {
        let candidates = SymbolCandidates::default();
        for operation in Operation::ALL {
            assert!(!candidates.for_operation(operation).is_empty(), "{operation}");
        }
        assert_eq!(candidates.init[0], "projectm_init");
    }

    #[test]
    fn candidates_deserialize_with_partial_overrides() {
        let parsed: SymbolCandidates =
            serde_json::from_str(r#"{ "render_frame": ["custom_render"] }"#).unwrap();

        assert_eq!(parsed.render_frame, vec!["custom_render".to_string()]);
        assert_eq!(parsed.init, SymbolCandidates::default().init);
    }
}
