// Resolves the configured entry script and validates its entry points

use super::descriptor::{HandlerDescriptor, RunCallable};
use super::module::{HandlerSource, InitFn, ScriptModule, registered_scripts};
use super::ScriptError;
use crate::binding::{self, InputBindingStrategy};
use crate::input::{InputError, RunArgs};
use crate::invoke::{DeadlineInvoker, TimedResult};
use crate::HttpRequest;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Looks up the entry script among registered scripts and turns it into a
/// ready-to-call [`UserScript`].
#[derive(Debug, Clone, Default)]
pub struct HandlerLoader {
    entry_script: Option<String>,
}

impl HandlerLoader {
    /// Script name used when no entry script is configured.
    pub const DEFAULT_ENTRY_SCRIPT: &'static str = "main";

    pub fn new(entry_script: Option<String>) -> Self {
        Self { entry_script }
    }

    /// Configured name, or `main`.
    pub fn entry_script(&self) -> &str {
        self.entry_script
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_ENTRY_SCRIPT)
    }

    /// Find and load the registered script.
    ///
    /// The entry script may be given as a path (`src/score.py`); a
    /// registration matching the full value wins, otherwise the file stem
    /// is tried.
    pub fn load(&self) -> Result<UserScript, ScriptError> {
        let wanted = self.entry_script();
        let stem = Path::new(wanted)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(wanted);

        let registration = registered_scripts()
            .find(|r| r.name == wanted)
            .or_else(|| registered_scripts().find(|r| r.name == stem));

        let Some(registration) = registration else {
            let available: Vec<_> = registered_scripts().map(|r| r.name).collect();
            debug!(?available, "Registered scripts");
            return Err(ScriptError::ImportFailure {
                location: wanted.to_string(),
                source: format!(
                    "no script is registered under '{}' (available: [{}])",
                    wanted,
                    available.join(", ")
                )
                .into(),
            });
        };

        debug!(name = registration.name, file = registration.file, "Importing user script");

        let module = match panic::catch_unwind(registration.load) {
            Ok(Ok(module)) => module,
            Ok(Err(source)) => {
                return Err(ScriptError::ImportFailure {
                    location: registration.file.to_string(),
                    source,
                });
            }
            Err(payload) => {
                return Err(ScriptError::ImportFailure {
                    location: registration.file.to_string(),
                    source: format!(
                        "loader panicked: {}",
                        super::error::panic_message(payload.as_ref())
                    )
                    .into(),
                });
            }
        };

        Self::load_module(module)
    }

    /// Validate a module and build the adapter state for it.
    pub fn load_module(module: ScriptModule) -> Result<UserScript, ScriptError> {
        if module.init.is_none() {
            return Err(ScriptError::MissingEntryPoint(format!(
                "User script at {} does not have a init() function defined.",
                module.location
            )));
        }
        if module.run.is_none() {
            return Err(ScriptError::MissingEntryPoint(format!(
                "User script at {} does not have a run() function defined.",
                module.location
            )));
        }

        let source = HandlerSource::resolve(module);
        match &source {
            HandlerSource::DriverThenTarget { driver, target } => info!(
                "Found driver script at {} and the score script at {}",
                driver.location, target.location
            ),
            HandlerSource::Inline(module) => info!("Found user script at {}", module.location),
        }

        let (Some(init), Some(run)) = (&source.init_module().init, &source.run_module().run)
        else {
            return Err(ScriptError::MissingEntryPoint(format!(
                "User script at {} does not expose both init() and run().",
                source.run_module().location
            )));
        };

        let descriptor = HandlerDescriptor::analyze("run", run)?;
        let strategy = binding::select(&descriptor)?;

        Ok(UserScript {
            init_location: source.init_module().location.clone(),
            run_location: source.run_module().location.clone(),
            init: init.clone(),
            run: run.callable(),
            descriptor: Arc::new(descriptor),
            strategy,
        })
    }
}

/// A loaded script: entry points plus the binding chosen for `run()`.
///
/// Shared read-only by every request once built.
#[derive(Clone)]
pub struct UserScript {
    init_location: String,
    run_location: String,
    init: InitFn,
    run: RunCallable,
    descriptor: Arc<HandlerDescriptor>,
    strategy: InputBindingStrategy,
}

impl UserScript {
    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    /// Shared handle for consumers that outlive a borrow, like the schema
    /// registry.
    pub fn shared_descriptor(&self) -> Arc<HandlerDescriptor> {
        Arc::clone(&self.descriptor)
    }

    pub fn strategy(&self) -> &InputBindingStrategy {
        &self.strategy
    }

    pub fn init_location(&self) -> &str {
        &self.init_location
    }

    pub fn run_location(&self) -> &str {
        &self.run_location
    }

    /// Run `init()` once. Errors and panics both come back as
    /// `ScriptError::Exception`.
    pub fn invoke_init(&self) -> Result<(), ScriptError> {
        info!("Invoking user's init function");
        match panic::catch_unwind(AssertUnwindSafe(|| (self.init)())) {
            Ok(Ok(())) => {
                info!("User's init has completed successfully");
                Ok(())
            }
            Ok(Err(source)) => Err(ScriptError::exception(source)),
            Err(payload) => Err(ScriptError::from_panic("init()", payload)),
        }
    }

    /// Translate a request into `run()` arguments.
    pub fn bind(&self, request: HttpRequest) -> Result<RunArgs, InputError> {
        self.strategy.bind(&self.descriptor, request)
    }

    /// Call `run()` under the invoker's deadline.
    pub async fn invoke_run(
        &self,
        args: RunArgs,
        invoker: &DeadlineInvoker,
    ) -> Result<TimedResult, ScriptError> {
        invoker.invoke(self.run.clone(), args).await
    }
}

impl std::fmt::Debug for UserScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserScript")
            .field("init_location", &self.init_location)
            .field("run_location", &self.run_location)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
