//! Script modules and compile-time script registration.
//!
//! A scoring script is a [`ScriptModule`]: a named location exposing an
//! `init` entry point and a `run` entry point. Scripts are linked into the
//! server binary and announce themselves with [`register_script!`]; the
//! loader picks one by name at startup.
//!
//! [`register_script!`]: crate::register_script

use super::descriptor::RunFunction;
use crate::BoxError;
use std::fmt;
use std::sync::Arc;

/// Callable behind `init()`.
pub type InitFn = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Entry points exposed by one script.
///
/// Either entry point may be absent here; the loader reports the missing
/// one. A module may also point at a `driver_target`, the script it
/// forwards scoring calls to.
#[derive(Clone)]
pub struct ScriptModule {
    pub location: String,
    pub init: Option<InitFn>,
    pub run: Option<RunFunction>,
    pub driver_target: Option<Box<ScriptModule>>,
}

impl ScriptModule {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            init: None,
            run: None,
            driver_target: None,
        }
    }

    pub fn with_init<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(f));
        self
    }

    pub fn with_run(mut self, run: RunFunction) -> Self {
        self.run = Some(run);
        self
    }

    pub fn with_driver_target(mut self, target: ScriptModule) -> Self {
        self.driver_target = Some(Box::new(target));
        self
    }
}

impl fmt::Debug for ScriptModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptModule")
            .field("location", &self.location)
            .field("init", &self.init.is_some())
            .field("run", &self.run)
            .field("driver_target", &self.driver_target)
            .finish()
    }
}

/// Where `init` and `run` come from once indirection is resolved.
#[derive(Debug, Clone)]
pub enum HandlerSource {
    /// Both entry points come from the loaded module.
    Inline(ScriptModule),
    /// `init` comes from the driver, `run` from the script it forwards to.
    DriverThenTarget {
        driver: ScriptModule,
        target: ScriptModule,
    },
}

impl HandlerSource {
    /// A driver target only counts when it exposes its own `run`.
    pub fn resolve(mut module: ScriptModule) -> Self {
        match module.driver_target.take() {
            Some(target) if target.run.is_some() => HandlerSource::DriverThenTarget {
                driver: module,
                target: *target,
            },
            _ => HandlerSource::Inline(module),
        }
    }

    pub fn init_module(&self) -> &ScriptModule {
        match self {
            HandlerSource::Inline(module) => module,
            HandlerSource::DriverThenTarget { driver, .. } => driver,
        }
    }

    pub fn run_module(&self) -> &ScriptModule {
        match self {
            HandlerSource::Inline(module) => module,
            HandlerSource::DriverThenTarget { target, .. } => target,
        }
    }
}

/// A script linked into the binary, collected via inventory.
pub struct ScriptRegistration {
    /// Name the entry-script setting refers to.
    pub name: &'static str,
    /// Source file that registered the script.
    pub file: &'static str,
    pub load: fn() -> Result<ScriptModule, BoxError>,
}

inventory::collect!(ScriptRegistration);

/// All registered scripts.
pub fn registered_scripts() -> impl Iterator<Item = &'static ScriptRegistration> {
    inventory::iter::<ScriptRegistration>.into_iter()
}

/// Register a scoring script under a name.
///
/// ```rust,ignore
/// fn load() -> Result<ScriptModule, BoxError> {
///     Ok(ScriptModule::new("score").with_init(|| Ok(())).with_run(run_fn()))
/// }
///
/// scorehost_core::register_script!("score", load);
/// ```
#[macro_export]
macro_rules! register_script {
    ($name:expr, $load:path) => {
        $crate::inventory::submit! {
            $crate::script::ScriptRegistration {
                name: $name,
                file: file!(),
                load: $load,
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::RunOutput;
    use serde_json::Value;

    fn run_fn() -> RunFunction {
        RunFunction::new(|_| Ok(RunOutput::from(Value::Null)))
    }

    #[test]
    fn test_inline_without_target() {
        let source = HandlerSource::resolve(ScriptModule::new("score").with_run(run_fn()));
        assert!(matches!(source, HandlerSource::Inline(_)));
        assert_eq!(source.run_module().location, "score");
    }

    #[test]
    fn test_driver_with_runnable_target() {
        let module = ScriptModule::new("driver")
            .with_init(|| Ok(()))
            .with_run(run_fn())
            .with_driver_target(ScriptModule::new("score").with_run(run_fn()));

        let source = HandlerSource::resolve(module);
        assert_eq!(source.init_module().location, "driver");
        assert_eq!(source.run_module().location, "score");
    }

    #[test]
    fn test_target_without_run_is_ignored() {
        let module = ScriptModule::new("driver")
            .with_run(run_fn())
            .with_driver_target(ScriptModule::new("helpers"));

        let source = HandlerSource::resolve(module);
        assert!(matches!(source, HandlerSource::Inline(_)));
        assert_eq!(source.run_module().location, "driver");
    }
}
