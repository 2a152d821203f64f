use std::fmt;
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::observer::{BindingEvent, BindingObserver};
use crate::symbols::{
    Callable, InitFn, MeshSizeFn, PcmFn, Signature, SymbolProvider, VoidFn,
};
use crate::{BindingError, Result};

/// The loaded projectM shared object. Exactly one exists per binding.
pub struct NativeLibrary {
    path: PathBuf,
    library: Library,
}

impl NativeLibrary {
    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .finish()
    }
}

impl SymbolProvider for NativeLibrary {
    fn lookup(&self, name: &str, signature: Signature) -> Option<Callable> {
        let name = name.as_bytes();
        // SAFETY: the pointer types mirror the declared ABI for each signature.
        // Pointers stay valid for as long as `self.library` is loaded, which
        // the lifecycle guarantees by clearing its table before dropping us.
        unsafe {
            match signature {
                Signature::Init => self.library.get::<InitFn>(name).ok().map(|s| Callable::Init(*s)),
                Signature::Void => self.library.get::<VoidFn>(name).ok().map(|s| Callable::Void(*s)),
                Signature::Pcm => self.library.get::<PcmFn>(name).ok().map(|s| Callable::Pcm(*s)),
                Signature::MeshSize => self
                    .library
                    .get::<MeshSizeFn>(name)
                    .ok()
                    .map(|s| Callable::MeshSize(*s)),
            }
        }
    }
}

/// Probes `candidates` in order and loads the first path that exists and opens.
pub fn locate<P: AsRef<Path>>(
    candidates: &[P],
    observer: &dyn BindingObserver,
) -> Result<NativeLibrary> {
    let mut reason = String::from("no candidate path exists");

    for candidate in candidates {
        let path = candidate.as_ref();
        if !path.exists() {
            continue;
        }

        // SAFETY: loading runs the library's initialisers; the host chose the path.
        match unsafe { Library::new(path) } {
            Ok(library) => {
                observer.on_event(BindingEvent::LibraryLoaded {
                    path: path.to_path_buf(),
                });
                return Ok(NativeLibrary {
                    path: path.to_path_buf(),
                    library,
                });
            }
            Err(err) => {
                reason = format!("{}: {err}", path.display());
                observer.on_event(BindingEvent::LibraryRejected {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Err(BindingError::LibraryNotFound {
        searched: candidates.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        reason,
    })
}

/// Where projectM usually lives on the current platform, most specific first.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(target_os = "macos") {
        for dir in ["/opt/homebrew/lib", "/usr/local/lib"] {
            for file in ["libprojectM.dylib", "libprojectM-4.dylib"] {
                paths.push(Path::new(dir).join(file));
            }
        }
    } else if cfg!(target_os = "windows") {
        for file in ["projectM.dll", "projectM-4.dll"] {
            paths.push(PathBuf::from(file));
        }
    } else {
        let dirs = [
            "/usr/lib/aarch64-linux-gnu",
            "/usr/lib/arm-linux-gnueabihf",
            "/usr/lib/x86_64-linux-gnu",
            "/usr/local/lib",
            "/usr/lib",
            "/app/lib",
        ];
        for dir in dirs {
            for file in ["libprojectM.so", "libprojectM.so.3", "libprojectM-4.so"] {
                paths.push(Path::new(dir).join(file));
            }
        }
    }

    paths
}
