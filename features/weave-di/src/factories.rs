use std::rc::Rc;

use crate::{
    injector::Injector,
    invokable::Invokable,
    types::{Injectable, Instance, TypeInfo},
    INJECTOR,
};

/// An object which knows how to build one named instance
///
/// The provider itself is available to other providers and config blocks as `<name>Provider`,
/// so any additional methods (e.g. setters) can be used to configure it before `$get` runs.
pub trait Provider: Injectable {
    /// Returns the `$get` factory, invoked through the instance injector
    fn get(&self) -> Invokable;
}

/// Type erased provider, as stored in the provider cache
#[derive(Clone)]
pub struct ProviderInstance {
    pub info: TypeInfo,
    /// The provider object, injected as `<name>Provider`
    pub object: Instance,
    getter: Rc<dyn Fn() -> Invokable>,
}

impl ProviderInstance {
    pub fn new<P: Provider>(provider: P) -> Self {
        Self::from_rc(Rc::new(provider))
    }

    pub fn from_rc<P: Provider>(provider: Rc<P>) -> Self {
        let object = Instance::from_rc(provider.clone());
        ProviderInstance {
            info: TypeInfo::of::<P>(),
            object,
            getter: Rc::new(move || provider.get()),
        }
    }

    /// Wraps a provider so it can be returned from a provider constructor
    pub fn instance<P: Provider>(provider: P) -> Instance {
        Instance::new(Self::new(provider))
    }

    /// The current `$get` of the provider
    pub fn factory(&self) -> Invokable {
        (self.getter)()
    }
}

/// How a provider is declared
#[derive(Clone)]
pub enum ProviderSource {
    /// An already built provider object
    Object(ProviderInstance),
    /// An invokable returning [`ProviderInstance::instance`], injected through the provider
    /// injector
    Constructor(Invokable),
}

/// Provider backing `factory` and `value` registrations
pub struct FactoryProvider {
    get: Invokable,
}

impl FactoryProvider {
    pub fn new(get: Invokable) -> Self {
        FactoryProvider { get }
    }

    pub fn value(value: Instance) -> Self {
        Self::new(Invokable::new(move |_| Ok(value.clone())))
    }

    /// `$get` instantiates the constructor through the instance injector
    pub fn service(constructor: Invokable) -> Self {
        Self::new(Invokable::array([INJECTOR], move |call| {
            let injector = call.arg::<Injector>(0)?;
            Ok(injector.instantiate(&constructor, None)?)
        }))
    }
}

impl Provider for FactoryProvider {
    fn get(&self) -> Invokable {
        self.get.clone()
    }
}
