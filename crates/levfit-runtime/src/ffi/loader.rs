//! Dynamic library loading for fit functions
//!
//! Opens a shared library by name or path with immediate symbol binding,
//! resolves named fit functions to raw pointers, and closes the library,
//! reporting every failure through [`ErrorRecord`] instead of aborting.
//! Built on `libloading` for cross-platform loading and platform-specific
//! naming conventions.
//!
//! The platform loader's handle table and last-error state are process
//! wide, so all loader operations are serialized behind one process-wide
//! mutex; a [`LoaderSession`] is an explicitly owned entry point, not a
//! global.

use crate::ffi::error_channel::ErrorRecord;
use libloading::Library;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Serializes open/resolve/close against the process-wide loader state.
static LOADER_GATE: Mutex<()> = Mutex::new(());

/// Library loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Library file not found in search paths
    LibraryNotFound(String),
    /// Failed to load library
    LoadFailed { library: String, detail: String },
    /// Symbol not found in library
    SymbolNotFound { library: String, symbol: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::LibraryNotFound(name) => write!(f, "Library not found: {}", name),
            LoadError::LoadFailed { library, detail } => {
                write!(f, "Failed to load library '{}': {}", library, detail)
            }
            LoadError::SymbolNotFound { library, symbol } => {
                write!(f, "Symbol '{}' not found in library '{}'", symbol, library)
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Outcome of a [`LoaderSession::close`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    /// The library handle was open and has been closed.
    Closed,
    /// The loader reported an error while closing; see the record.
    Failed,
    /// The handle was already closed — a clean no-op.
    AlreadyClosed,
}

/// An open shared library.
///
/// Owns the platform handle between open and close. Dropping an open
/// handle closes the library silently; use [`LoaderSession::close`] to
/// observe close diagnostics. Function pointers resolved from this handle
/// are valid only while it stays open — calling one after close is the
/// caller's contract violation and cannot be detected here.
pub struct LibraryHandle {
    lib: Option<Library>,
    path: PathBuf,
}

impl LibraryHandle {
    /// Absolute path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the handle still owns an open library.
    pub fn is_open(&self) -> bool {
        self.lib.is_some()
    }

    /// Resolve another symbol from this library.
    ///
    /// A fit library typically exports a model/Jacobian pair, so a handle
    /// supports repeated resolution. On failure the record carries the
    /// diagnostic and `None` is returned; the library stays open.
    ///
    /// # Safety
    ///
    /// `F` must be the function-pointer type of the actual exported
    /// symbol; there is no way to verify the signature at runtime.
    pub unsafe fn resolve<F: Copy>(
        &self,
        symbol: &str,
        record: &mut ErrorRecord,
    ) -> Option<ResolvedFunction<F>> {
        let lib = match &self.lib {
            Some(lib) => lib,
            None => {
                record.set(format!(
                    "Library '{}' is already closed",
                    self.path.display()
                ));
                return None;
            }
        };

        let _gate = LOADER_GATE.lock().unwrap_or_else(|e| e.into_inner());
        match lib.get::<F>(symbol.as_bytes()) {
            Ok(sym) => {
                record.clear();
                Some(ResolvedFunction {
                    func: *sym,
                    symbol: symbol.to_string(),
                    library: self.path.clone(),
                })
            }
            Err(e) => {
                record.set(format!(
                    "Symbol '{}' not found in library '{}': {}",
                    symbol,
                    self.path.display(),
                    e
                ));
                None
            }
        }
    }
}

/// A typed function pointer plus the name and library it was resolved
/// from. The provenance exists for diagnostics only; the pointer's
/// lifetime is bounded by the owning [`LibraryHandle`].
#[derive(Clone)]
pub struct ResolvedFunction<F> {
    func: F,
    symbol: String,
    library: PathBuf,
}

impl<F: Copy> ResolvedFunction<F> {
    /// The raw function pointer.
    pub fn get(&self) -> F {
        self.func
    }

    /// Name the pointer was resolved under.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Library path the pointer came from.
    pub fn library(&self) -> &Path {
        &self.library
    }
}

/// Owned loader entry point with platform search-path resolution.
///
/// # Safety
///
/// Loading a dynamic library executes its initialization code in this
/// process. The caller must ensure the library is trusted.
pub struct LoaderSession {
    search_paths: Vec<PathBuf>,
}

impl LoaderSession {
    /// Create a session with the platform's default search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
        }
    }

    /// Platform library directories, current directory first.
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            if let Ok(system_root) = std::env::var("SystemRoot") {
                paths.push(PathBuf::from(format!("{}\\System32", system_root)));
            }
        }

        if let Ok(cwd) = std::env::current_dir() {
            paths.insert(0, cwd);
        }

        paths
    }

    /// Add a custom search path (highest priority).
    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.insert(0, path);
    }

    /// Locate a library without opening it.
    ///
    /// Applies the same name resolution as [`open_and_resolve`]
    /// (existing path as given, otherwise platform naming against the
    /// search paths).
    ///
    /// [`open_and_resolve`]: Self::open_and_resolve
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        self.resolve_library_path(name)
    }

    /// Resolve a library name to a full path.
    ///
    /// An existing path is used as given; otherwise the platform naming
    /// conventions (`lib{name}.so`, `lib{name}.dylib`, `{name}.dll`) are
    /// tried against every search path.
    fn resolve_library_path(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.exists() {
            return Some(direct.to_path_buf());
        }

        let extensions: &[&str] = if cfg!(target_os = "windows") {
            &["dll"]
        } else if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else {
            &["so"]
        };
        let prefixes: &[&str] = if cfg!(target_os = "windows") {
            &["", "lib"]
        } else {
            &["lib", ""]
        };

        for search_path in &self.search_paths {
            for prefix in prefixes {
                for ext in extensions {
                    let candidate = search_path.join(format!("{}{}.{}", prefix, name, ext));
                    if candidate.exists() {
                        return Some(candidate);
                    }
                }
            }
        }

        None
    }

    /// Open a library and resolve one symbol from it.
    ///
    /// The library is opened with immediate (non-lazy) binding. Outcomes:
    ///
    /// - open failed: `(None, None)`, record carries the loader diagnostic
    /// - symbol absent: `(Some(handle), None)`, record carries the
    ///   resolution diagnostic; the caller decides whether to close
    /// - both succeeded: `(Some(handle), Some(func))`, record cleared
    ///
    /// No failure aborts the process.
    ///
    /// # Safety
    ///
    /// `F` must be the function-pointer type of the exported symbol, and
    /// the library's initialization code runs in this process.
    pub unsafe fn open_and_resolve<F: Copy>(
        &self,
        library: &str,
        symbol: &str,
        record: &mut ErrorRecord,
    ) -> (Option<LibraryHandle>, Option<ResolvedFunction<F>>) {
        let path = match self.resolve_library_path(library) {
            Some(path) => path,
            None => {
                record.set(format!("Library not found: {}", library));
                return (None, None);
            }
        };

        let lib = {
            let _gate = LOADER_GATE.lock().unwrap_or_else(|e| e.into_inner());
            match open_now(&path) {
                Ok(lib) => lib,
                Err(e) => {
                    record.set(format!(
                        "Failed to load library '{}': {}",
                        path.display(),
                        e
                    ));
                    return (None, None);
                }
            }
        };

        let handle = LibraryHandle {
            lib: Some(lib),
            path,
        };
        let resolved = handle.resolve::<F>(symbol, record);
        (Some(handle), resolved)
    }

    /// Close a library handle.
    ///
    /// Closing an already-closed handle is a clean no-op reporting no
    /// error. A loader failure during close is surfaced through the
    /// record and [`CloseStatus::Failed`]; it is not fatal, but indicates
    /// the library may still be resident.
    pub fn close(&self, handle: &mut LibraryHandle, record: &mut ErrorRecord) -> CloseStatus {
        let lib = match handle.lib.take() {
            Some(lib) => lib,
            None => {
                record.clear();
                return CloseStatus::AlreadyClosed;
            }
        };

        let _gate = LOADER_GATE.lock().unwrap_or_else(|e| e.into_inner());
        match lib.close() {
            Ok(()) => {
                record.clear();
                CloseStatus::Closed
            }
            Err(e) => {
                record.set(format!(
                    "Failed to close library '{}': {}",
                    handle.path.display(),
                    e
                ));
                CloseStatus::Failed
            }
        }
    }
}

impl Default for LoaderSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Open with immediate binding, matching the contract that a missing
/// transitive symbol fails at open time rather than first call.
#[cfg(unix)]
fn open_now(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
    // SAFETY: delegated to the caller of open_and_resolve; the library's
    // initializers run here.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL).map(Into::into) }
}

#[cfg(not(unix))]
fn open_now(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: as above.
    unsafe { Library::new(path) }
}
