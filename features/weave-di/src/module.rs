//! Module registry
//!
//! A module records registrations for later: nothing is built until an injector loads it.
//! Constants are queued in front of every other registration so providers can depend on them.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    errors::ConfigError,
    factories::{Provider, ProviderInstance, ProviderSource},
    invokable::Invokable,
    types::{Injectable, Instance},
    RESERVED_NAME,
};

/// One queued `$provide` call
#[derive(Clone)]
pub enum Registration {
    Constant { name: String, value: Instance },
    Provider { name: String, source: ProviderSource },
    Factory { name: String, factory: Invokable },
    Value { name: String, value: Instance },
    Service { name: String, constructor: Invokable },
    Decorator { name: String, decorator: Invokable },
}

impl Registration {
    /// The `$provide` method this registration is played against
    pub fn method(&self) -> &'static str {
        match self {
            Registration::Constant { .. } => "constant",
            Registration::Provider { .. } => "provider",
            Registration::Factory { .. } => "factory",
            Registration::Value { .. } => "value",
            Registration::Service { .. } => "service",
            Registration::Decorator { .. } => "decorator",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Registration::Constant { name, .. }
            | Registration::Provider { name, .. }
            | Registration::Factory { name, .. }
            | Registration::Value { name, .. }
            | Registration::Service { name, .. }
            | Registration::Decorator { name, .. } => name,
        }
    }
}

struct ModuleRecord {
    name: String,
    requires: Vec<String>,
    provider_queue: Vec<Registration>,
    config_queue: Vec<Invokable>,
    run_queue: Vec<Invokable>,
}

/// Handle to a declared module
///
/// All registration methods append to the module and return the handle for chaining.
#[derive(Clone)]
pub struct Module(Rc<RefCell<ModuleRecord>>);

impl Module {
    fn new(name: String, requires: Vec<String>) -> Self {
        Module(Rc::new(RefCell::new(ModuleRecord {
            name,
            requires,
            provider_queue: Vec::new(),
            config_queue: Vec::new(),
            run_queue: Vec::new(),
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn requires(&self) -> Vec<String> {
        self.0.borrow().requires.clone()
    }

    pub fn provider_queue(&self) -> Vec<Registration> {
        self.0.borrow().provider_queue.clone()
    }

    pub fn config_queue(&self) -> Vec<Invokable> {
        self.0.borrow().config_queue.clone()
    }

    pub fn run_queue(&self) -> Vec<Invokable> {
        self.0.borrow().run_queue.clone()
    }

    pub fn constant<T: Injectable>(&self, name: impl Into<String>, value: T) -> &Self {
        self.0.borrow_mut().provider_queue.insert(
            0,
            Registration::Constant {
                name: name.into(),
                value: Instance::new(value),
            },
        );
        self
    }

    pub fn provider<P: Provider>(&self, name: impl Into<String>, provider: P) -> &Self {
        self.push(Registration::Provider {
            name: name.into(),
            source: ProviderSource::Object(ProviderInstance::new(provider)),
        })
    }

    /// `constructor` must return [`ProviderInstance::instance`]
    pub fn provider_constructor(&self, name: impl Into<String>, constructor: Invokable) -> &Self {
        self.push(Registration::Provider {
            name: name.into(),
            source: ProviderSource::Constructor(constructor),
        })
    }

    pub fn factory(&self, name: impl Into<String>, factory: Invokable) -> &Self {
        self.push(Registration::Factory {
            name: name.into(),
            factory,
        })
    }

    pub fn value<T: Injectable>(&self, name: impl Into<String>, value: T) -> &Self {
        self.push(Registration::Value {
            name: name.into(),
            value: Instance::new(value),
        })
    }

    pub fn service(&self, name: impl Into<String>, constructor: Invokable) -> &Self {
        self.push(Registration::Service {
            name: name.into(),
            constructor,
        })
    }

    pub fn decorator(&self, name: impl Into<String>, decorator: Invokable) -> &Self {
        self.push(Registration::Decorator {
            name: name.into(),
            decorator,
        })
    }

    /// Invoked through the provider injector once all modules are loaded
    pub fn config(&self, block: Invokable) -> &Self {
        self.0.borrow_mut().config_queue.push(block);
        self
    }

    /// Invoked through the instance injector after all config blocks
    pub fn run(&self, block: Invokable) -> &Self {
        self.0.borrow_mut().run_queue.push(block);
        self
    }

    fn push(&self, registration: Registration) -> &Self {
        self.0.borrow_mut().provider_queue.push(registration);
        self
    }
}

/// Registry of all declared modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a module, replacing any previous module of the same name
    pub fn declare<I, S>(
        &mut self,
        name: impl Into<String>,
        requires: I,
    ) -> Result<Module, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name == RESERVED_NAME {
            return Err(ConfigError::InvalidModuleName(name));
        }

        let module = Module::new(name.clone(), requires.into_iter().map(Into::into).collect());
        tracing::debug!("Declared module '{name}'");
        self.modules.insert(name, module.clone());
        Ok(module)
    }

    pub fn lookup(&self, name: &str) -> Result<Module, ConfigError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::ModuleNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Module> {
        self.modules.remove(name)
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }
}
