use std::{cell::RefCell, collections::HashMap, fmt::Debug};

use crate::{
    errors::{ConfigError, InjectError},
    factories::ProviderInstance,
    invokable::Invokable,
    types::Instance,
    PROVIDER_SUFFIX, RESERVED_NAME,
};

/// Entries visible to the provider injector
#[derive(Clone)]
enum ProviderEntry {
    Constant(Instance),
    Provider(ProviderRecord),
}

/// A registered provider and the decorators wrapping its `$get`
#[derive(Clone)]
pub(crate) struct ProviderRecord {
    pub provider: ProviderInstance,
    pub decorators: Vec<Invokable>,
}

enum Slot {
    /// `$get` is currently running for this name
    Constructing,
    Ready(Instance),
}

/// Caches shared by the provider and the instance injector
pub(crate) struct InjectorCore {
    /// Constants and `<name>Provider` entries
    provider_cache: RefCell<HashMap<String, ProviderEntry>>,
    instance_cache: RefCell<HashMap<String, Slot>>,
    /// Names currently being constructed, innermost first
    path: RefCell<Vec<String>>,
    strict_di: bool,
}

impl Debug for InjectorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.provider_cache.borrow().keys().cloned().collect();
        providers.sort();
        let mut instances: Vec<_> = self
            .instance_cache
            .borrow()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(name, _)| name.clone())
            .collect();
        instances.sort();

        f.debug_struct("InjectorCore")
            .field("providers", &providers)
            .field("instances", &instances)
            .field("strict_di", &self.strict_di)
            .finish()
    }
}

pub(crate) fn provider_name(name: &str) -> String {
    format!("{name}{PROVIDER_SUFFIX}")
}

fn check_name(name: &str) -> Result<(), ConfigError> {
    if name == RESERVED_NAME {
        return Err(ConfigError::InvalidRegistrationName(name.to_string()));
    }
    Ok(())
}

impl InjectorCore {
    pub(crate) fn new(strict_di: bool) -> Self {
        InjectorCore {
            provider_cache: RefCell::new(HashMap::new()),
            instance_cache: RefCell::new(HashMap::new()),
            path: RefCell::new(Vec::new()),
            strict_di,
        }
    }

    pub(crate) fn strict_di(&self) -> bool {
        self.strict_di
    }

    /// Constants are visible to both injectors
    pub(crate) fn register_constant(&self, name: &str, value: Instance) -> Result<(), ConfigError> {
        check_name(name)?;
        self.provider_cache
            .borrow_mut()
            .insert(name.to_string(), ProviderEntry::Constant(value.clone()));
        self.instance_cache
            .borrow_mut()
            .insert(name.to_string(), Slot::Ready(value));
        Ok(())
    }

    pub(crate) fn register_provider(
        &self,
        name: &str,
        provider: ProviderInstance,
    ) -> Result<(), ConfigError> {
        check_name(name)?;
        self.provider_cache.borrow_mut().insert(
            provider_name(name),
            ProviderEntry::Provider(ProviderRecord {
                provider,
                decorators: Vec::new(),
            }),
        );
        Ok(())
    }

    pub(crate) fn add_decorator(
        &self,
        name: &str,
        decorator: Invokable,
    ) -> Result<(), InjectError> {
        let key = provider_name(name);
        match self.provider_cache.borrow_mut().get_mut(&key) {
            Some(ProviderEntry::Provider(record)) => {
                record.decorators.push(decorator);
                Ok(())
            }
            _ => Err(self.unknown_provider(&key, &[])),
        }
    }

    /// Lookup used by the provider injector
    pub(crate) fn provider_entry(&self, name: &str) -> Option<Instance> {
        match self.provider_cache.borrow().get(name)? {
            ProviderEntry::Constant(value) => Some(value.clone()),
            ProviderEntry::Provider(record) => Some(record.provider.object.clone()),
        }
    }

    pub(crate) fn provider_record(&self, name: &str) -> Option<ProviderRecord> {
        match self.provider_cache.borrow().get(&provider_name(name))? {
            ProviderEntry::Provider(record) => Some(record.clone()),
            ProviderEntry::Constant(_) => None,
        }
    }

    pub(crate) fn has_provider_entry(&self, name: &str) -> bool {
        self.provider_cache.borrow().contains_key(name)
    }

    /// Returns a cached instance, failing if the name is still under construction
    pub(crate) fn cached_instance(&self, name: &str) -> Result<Option<Instance>, InjectError> {
        match self.instance_cache.borrow().get(name) {
            Some(Slot::Ready(instance)) => Ok(Some(instance.clone())),
            Some(Slot::Constructing) => {
                let mut path = vec![name.to_string()];
                path.extend(self.path.borrow().iter().cloned());
                Err(InjectError::CircularDependency { path })
            }
            None => Ok(None),
        }
    }

    pub(crate) fn has_ready_instance(&self, name: &str) -> bool {
        matches!(self.instance_cache.borrow().get(name), Some(Slot::Ready(_)))
    }

    /// Builds an `UnknownProvider` error for `names`, followed by the current resolution path
    pub(crate) fn unknown_provider(&self, name: &str, also: &[&str]) -> InjectError {
        let mut path = vec![name.to_string()];
        path.extend(also.iter().map(|n| n.to_string()));
        path.extend(self.path.borrow().iter().cloned());
        InjectError::UnknownProvider {
            name: name.to_string(),
            path,
        }
    }

    /// Marks `name` as under construction
    ///
    /// The mark is removed when the guard is dropped without being completed.
    pub(crate) fn begin_construction(&self, name: &str) -> ConstructionGuard<'_> {
        self.instance_cache
            .borrow_mut()
            .insert(name.to_string(), Slot::Constructing);
        self.path.borrow_mut().insert(0, name.to_string());

        ConstructionGuard {
            core: self,
            name: name.to_string(),
            completed: false,
        }
    }
}

/// RAII guard for one instance construction
pub(crate) struct ConstructionGuard<'a> {
    core: &'a InjectorCore,
    name: String,
    completed: bool,
}

impl ConstructionGuard<'_> {
    pub(crate) fn complete(mut self, instance: Instance) {
        self.core
            .instance_cache
            .borrow_mut()
            .insert(self.name.clone(), Slot::Ready(instance));
        self.completed = true;
    }
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        let mut path = self.core.path.borrow_mut();
        if let Some(pos) = path.iter().position(|n| *n == self.name) {
            path.remove(pos);
        }
        drop(path);

        if !self.completed {
            self.core.instance_cache.borrow_mut().remove(&self.name);
        }
    }
}
