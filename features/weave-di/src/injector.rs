use std::{any::type_name, fmt::Debug, rc::Rc};

use crate::{
    container::{provider_name, InjectorCore},
    errors::InjectError,
    invokable::{Invocation, Invokable},
    provide::Provide,
    types::{Injectable, Instance, Locals},
    DELEGATE, INJECTOR, PROVIDE, PROVIDER_SUFFIX,
};

/// Which of the two injector views a handle is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectorKind {
    /// Sees providers and constants; used while building providers and in config blocks
    Provider,
    /// Sees instances; the client facing injector
    Instance,
}

/// Handle to one view of an injector
///
/// Both views share the same caches. The instance injector returned by
/// [`InjectorBuilder::build`](crate::InjectorBuilder::build) builds instances lazily on first `get`
/// and hands out the same instance afterwards.
#[derive(Clone)]
pub struct Injector {
    core: Rc<InjectorCore>,
    kind: InjectorKind,
}

impl Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("kind", &self.kind)
            .field("core", &self.core)
            .finish()
    }
}

impl Injector {
    pub(crate) fn new(core: Rc<InjectorCore>, kind: InjectorKind) -> Self {
        Injector { core, kind }
    }

    pub fn kind(&self) -> InjectorKind {
        self.kind
    }

    pub fn strict_di(&self) -> bool {
        self.core.strict_di()
    }

    /// Resolves a single name
    pub fn get(&self, name: &str) -> Result<Instance, InjectError> {
        match self.kind {
            InjectorKind::Provider => self.get_provider_side(name),
            InjectorKind::Instance => self.get_instance_side(name),
        }
    }

    /// Resolves a single name, preferring `locals`
    pub fn get_with_locals(&self, name: &str, locals: &Locals) -> Result<Instance, InjectError> {
        match locals.get(name) {
            Some(local) => Ok(local.clone()),
            None => self.get(name),
        }
    }

    /// Resolves a name and downcasts it
    pub fn require<T: Injectable>(&self, name: &str) -> Result<Rc<T>, InjectError> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|actual_type| InjectError::DowncastFailed {
                name: name.to_string(),
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    /// True if `name` is registered for this view. Never fails.
    pub fn has(&self, name: &str) -> bool {
        if name == INJECTOR {
            return true;
        }
        match self.kind {
            InjectorKind::Provider => name == PROVIDE || self.core.has_provider_entry(name),
            InjectorKind::Instance => {
                !name.ends_with(PROVIDER_SUFFIX)
                    && (self.core.has_ready_instance(name)
                        || self.core.provider_record(name).is_some())
            }
        }
    }

    pub fn annotate(&self, function: &Invokable) -> Result<Vec<String>, InjectError> {
        Ok(function.annotate(self.core.strict_di())?)
    }

    /// Calls `function` with its dependencies resolved, `locals` taking precedence
    pub fn invoke(
        &self,
        function: &Invokable,
        context: Option<Instance>,
        locals: Option<&Locals>,
    ) -> Result<Instance, InjectError> {
        self.invoke_named("anonymous function", function, context, locals)
    }

    /// Calls `constructor` with its dependencies resolved and returns the object it builds
    pub fn instantiate(
        &self,
        constructor: &Invokable,
        locals: Option<&Locals>,
    ) -> Result<Instance, InjectError> {
        self.invoke_named("constructor", constructor, None, locals)
    }

    fn invoke_named(
        &self,
        label: &str,
        function: &Invokable,
        context: Option<Instance>,
        locals: Option<&Locals>,
    ) -> Result<Instance, InjectError> {
        let names = self.annotate(function)?;

        let args = names
            .iter()
            .map(|name| match locals.and_then(|locals| locals.get(name)) {
                Some(local) => Ok(local.clone()),
                None => self.get(name),
            })
            .collect::<Result<Vec<_>, _>>()?;

        function
            .call(Invocation { context, args })
            .map_err(|error| InjectError::from_dyn(label, error))
    }

    fn get_provider_side(&self, name: &str) -> Result<Instance, InjectError> {
        match name {
            INJECTOR => Ok(Instance::new(self.clone())),
            PROVIDE => Ok(Instance::new(Provide::new(self.clone()))),
            _ => self
                .core
                .provider_entry(name)
                .ok_or_else(|| self.core.unknown_provider(name, &[])),
        }
    }

    fn get_instance_side(&self, name: &str) -> Result<Instance, InjectError> {
        if name == INJECTOR {
            return Ok(Instance::new(self.clone()));
        }

        if let Some(instance) = self.core.cached_instance(name)? {
            return Ok(instance);
        }

        let key = provider_name(name);
        let record = match self.core.provider_record(name) {
            Some(record) if !name.ends_with(PROVIDER_SUFFIX) => record,
            _ => return Err(self.core.unknown_provider(&key, &[name])),
        };

        tracing::trace!("Constructing '{name}' from {}", record.provider.info);
        let guard = self.core.begin_construction(name);

        let get = record.provider.factory();
        let mut instance =
            self.invoke_named(name, &get, Some(record.provider.object.clone()), None)?;

        for decorator in &record.decorators {
            let locals = Locals::from([(DELEGATE.to_string(), instance)]);
            instance = self.invoke_named(name, decorator, None, Some(&locals))?;
        }

        guard.complete(instance.clone());
        Ok(instance)
    }

    pub(crate) fn core(&self) -> &InjectorCore {
        &self.core
    }
}
