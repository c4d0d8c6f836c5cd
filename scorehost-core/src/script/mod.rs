//! User script loading.
//!
//! - [`module`]: script modules, driver indirection and registration
//! - [`descriptor`]: `run()` declarations and their validated form
//! - [`loader`]: entry-script resolution and the loaded [`UserScript`]

pub mod descriptor;
mod error;
pub mod loader;
pub mod module;

pub use descriptor::{
    HandlerDescriptor, ParamKind, ParamSpec, REQUEST_HEADERS_PARAM, RunCallable, RunFunction,
};
pub use error::{HANDLER_EXCEPTION_MESSAGE, ScriptError};
pub use loader::{HandlerLoader, UserScript};
pub use module::{HandlerSource, InitFn, ScriptModule, ScriptRegistration, registered_scripts};

/// Process exit status for a deployment that can never serve: bad script,
/// failed `init()`, or unusable configuration.
pub const FATAL_EXIT_CODE: i32 = 3;
