//! Foreign-function plumbing for fit models
//!
//! Everything that touches raw pointers or the platform loader lives in
//! this module, behind safe-by-contract wrappers:
//! - Bounded error transport ([`error_channel`])
//! - Dynamic library loading and symbol resolution ([`loader`])
//! - Zero-copy array views over solver buffers ([`view`])
//! - The host-callable capability interface ([`host`])
//! - The per-run callback context ([`context`])
//! - Native-vs-callback dispatch ([`dispatch`])
//!
//! # Safety
//!
//! FFI operations involve `unsafe` code and careful lifetime reasoning.
//! All unsafe code is isolated in this module; the `fit` module exposes
//! the safe high-level entry points.

pub mod context;
pub mod dispatch;
pub mod error_channel;
pub mod host;
pub mod loader;
pub mod view;

pub use context::{CallbackContext, CallbackError};
pub use dispatch::{ModelDispatch, SolverHook};
pub use error_channel::{ErrorRecord, DEFAULT_ERROR_CAPACITY};
pub use host::{CallArgs, FnCallable, HostCallError, HostCallable};
pub use loader::{CloseStatus, LibraryHandle, LoadError, LoaderSession, ResolvedFunction};
pub use view::{ArrayView, ShapeError, Teardown};
