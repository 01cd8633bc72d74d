use thiserror::Error;

use crate::types::DynError;

/// Errors caused by invalid declarations - always fatal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The module name is reserved
    #[error("'{0}' is not a valid module name")]
    InvalidModuleName(String),
    /// The requested module was never declared
    #[error("Module '{0}' is not available")]
    ModuleNotFound(String),
    /// A constant or provider was registered under a reserved name
    #[error("'{0}' is not a valid name for a registration")]
    InvalidRegistrationName(String),
    /// An injection token which cannot name a dependency
    #[error("Incorrect injection token {0:?}, expected a service name")]
    InvalidToken(String),
    /// Strict mode requires an explicit annotation
    #[error("'{0}' is not using explicit annotation and cannot be invoked in strict mode")]
    StrictAnnotation(String),
    /// A provider constructor built something that is not a provider
    #[error("Provider constructor for '{name}' returned '{actual_type}' which is not a provider")]
    NotAProvider {
        name: String,
        actual_type: &'static str,
    },
}

/// Errors while resolving or invoking
#[derive(Error, Debug)]
pub enum InjectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Neither an instance nor a provider is registered under the name
    #[error("Unknown provider: {}", path.join(" <- "))]
    UnknownProvider { name: String, path: Vec<String> },

    /// The name was requested while it was still being constructed
    #[error("Circular dependency found {}", path.join(" <- "))]
    CircularDependency { path: Vec<String> },

    /// A `$get`, constructor or invoked function failed
    #[error("{source}")]
    ConstructionFailed { name: String, source: DynError },

    #[error("Failed to downcast '{name}', required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        name: String,
        required_type: &'static str,
        actual_type: &'static str,
    },

    /// An invocation body asked for an argument it was not given
    #[error("Argument {index} was not injected")]
    MissingArgument { index: usize },
}

impl InjectError {
    /// Unwraps a user error that was itself raised by the injector,
    /// so nested failures propagate unchanged
    pub(crate) fn from_dyn(name: &str, error: DynError) -> Self {
        match error.downcast::<InjectError>() {
            Ok(inject_error) => *inject_error,
            Err(source) => InjectError::ConstructionFailed {
                name: name.to_string(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, InjectError::UnknownProvider { .. })
    }
}
