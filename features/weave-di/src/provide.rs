use crate::{
    errors::{ConfigError, InjectError},
    factories::{FactoryProvider, Provider, ProviderInstance, ProviderSource},
    injector::{Injector, InjectorKind},
    invokable::Invokable,
    module::Registration,
    types::{Injectable, Instance},
};

/// The `$provide` service
///
/// Only resolvable through the provider injector. Registrations take effect immediately.
#[derive(Clone, Debug)]
pub struct Provide {
    injector: Injector,
}

impl Provide {
    pub(crate) fn new(injector: Injector) -> Self {
        debug_assert_eq!(injector.kind(), InjectorKind::Provider);
        Provide { injector }
    }

    pub fn constant<T: Injectable>(&self, name: &str, value: T) -> Result<(), InjectError> {
        self.register(Registration::Constant {
            name: name.to_string(),
            value: Instance::new(value),
        })
    }

    pub fn provider<P: Provider>(&self, name: &str, provider: P) -> Result<(), InjectError> {
        self.register(Registration::Provider {
            name: name.to_string(),
            source: ProviderSource::Object(ProviderInstance::new(provider)),
        })
    }

    pub fn provider_constructor(
        &self,
        name: &str,
        constructor: Invokable,
    ) -> Result<(), InjectError> {
        self.register(Registration::Provider {
            name: name.to_string(),
            source: ProviderSource::Constructor(constructor),
        })
    }

    pub fn factory(&self, name: &str, factory: Invokable) -> Result<(), InjectError> {
        self.register(Registration::Factory {
            name: name.to_string(),
            factory,
        })
    }

    pub fn value<T: Injectable>(&self, name: &str, value: T) -> Result<(), InjectError> {
        self.register(Registration::Value {
            name: name.to_string(),
            value: Instance::new(value),
        })
    }

    pub fn service(&self, name: &str, constructor: Invokable) -> Result<(), InjectError> {
        self.register(Registration::Service {
            name: name.to_string(),
            constructor,
        })
    }

    pub fn decorator(&self, name: &str, decorator: Invokable) -> Result<(), InjectError> {
        self.register(Registration::Decorator {
            name: name.to_string(),
            decorator,
        })
    }

    /// Plays one queued registration
    pub(crate) fn register(&self, registration: Registration) -> Result<(), InjectError> {
        tracing::debug!(
            "$provide.{}('{}')",
            registration.method(),
            registration.name()
        );
        let core = self.injector.core();

        match registration {
            Registration::Constant { name, value } => core.register_constant(&name, value)?,
            Registration::Provider { name, source } => {
                let provider = match source {
                    ProviderSource::Object(provider) => provider,
                    ProviderSource::Constructor(constructor) => {
                        let built = self.injector.instantiate(&constructor, None)?;
                        built
                            .downcast::<ProviderInstance>()
                            .map(|provider| (*provider).clone())
                            .map_err(|actual_type| ConfigError::NotAProvider {
                                name: name.clone(),
                                actual_type,
                            })?
                    }
                };
                core.register_provider(&name, provider)?;
            }
            Registration::Factory { name, factory } => {
                core.register_provider(&name, ProviderInstance::new(FactoryProvider::new(factory)))?
            }
            Registration::Value { name, value } => {
                core.register_provider(&name, ProviderInstance::new(FactoryProvider::value(value)))?
            }
            Registration::Service { name, constructor } => core.register_provider(
                &name,
                ProviderInstance::new(FactoryProvider::service(constructor)),
            )?,
            Registration::Decorator { name, decorator } => core.add_decorator(&name, decorator)?,
        }
        Ok(())
    }
}
