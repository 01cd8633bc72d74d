//! Weave DI: a name based dependency injection container
//!
//! Registrations are recorded on modules in a [`ModuleRegistry`]. An [`InjectorBuilder`] loads
//! those modules into two cooperating injectors sharing one set of caches:
//!
//! 1. The provider injector sees constants and `<name>Provider` objects. Provider constructors
//!    and config blocks are invoked through it, and it exposes `$provide`.
//! 2. The instance injector sees constants and instances, building each instance lazily from its
//!    provider's `$get` on first use. This is the injector handed to clients.

pub mod builder;
pub(crate) mod container;
pub mod errors;
pub mod factories;
pub(crate) mod initiator;
pub mod injector;
pub mod invokable;
pub mod module;
pub mod provide;
pub mod types;

pub use builder::InjectorBuilder;
pub use errors::{ConfigError, InjectError};
pub use factories::{FactoryProvider, Provider, ProviderInstance, ProviderSource};
pub use injector::{Injector, InjectorKind};
pub use invokable::{Invocation, Invokable};
pub use module::{Module, ModuleRegistry, Registration};
pub use provide::Provide;
pub use types::{DynError, Injectable, Instance, Locals, TypeInfo};

/// Name under which each injector view resolves itself
pub const INJECTOR: &str = "$injector";
/// Name of the [`Provide`] service, provider injector only
pub const PROVIDE: &str = "$provide";
/// Local holding the original instance while a decorator runs
pub const DELEGATE: &str = "$delegate";
/// Suffix separating the provider namespace from the instance namespace
pub const PROVIDER_SUFFIX: &str = "Provider";
/// Name that can never be used for a module or a registration
pub const RESERVED_NAME: &str = "hasOwnProperty";
