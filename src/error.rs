// Startup errors

use scorehost_config::ConfigError;
use scorehost_core::script::{FATAL_EXIT_CODE, ScriptError};
use scorehost_log::LogError;
use thiserror::Error;

/// Exit status for failures that are not the deployment's fault.
pub const GENERIC_EXIT_CODE: i32 = 1;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Log(#[from] LogError),

    /// The scoring script could not be loaded or is unusable.
    #[error(transparent)]
    Script(ScriptError),

    #[error("User's init function failed: {0}")]
    Init(ScriptError),

    #[error("Server error: {0}")]
    Server(#[from] scorehost_core::Error),
}

impl StartupError {
    /// Bad deployment artifacts get [`FATAL_EXIT_CODE`] so a supervisor can
    /// tell them from crashes.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Config(_) | StartupError::Script(_) | StartupError::Init(_) => {
                FATAL_EXIT_CODE
            }
            StartupError::Log(_) | StartupError::Server(_) => GENERIC_EXIT_CODE,
        }
    }
}
