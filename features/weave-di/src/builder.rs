use crate::{
    errors::InjectError, initiator::InjectorInitiator, injector::Injector, module::ModuleRegistry,
};

/// Creates an injector from modules declared in a [`ModuleRegistry`]
///
/// ```
/// use weave_di::{InjectorBuilder, ModuleRegistry};
///
/// let mut registry = ModuleRegistry::new();
/// registry.declare("app", Vec::<String>::new()).unwrap().constant("answer", 42);
///
/// let injector = InjectorBuilder::new(&registry).module("app").build().unwrap();
/// assert_eq!(*injector.require::<i32>("answer").unwrap(), 42);
/// ```
pub struct InjectorBuilder<'r> {
    registry: &'r ModuleRegistry,
    modules: Vec<String>,
    strict_di: bool,
}

impl<'r> InjectorBuilder<'r> {
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        InjectorBuilder {
            registry,
            modules: Vec::new(),
            strict_di: false,
        }
    }

    /// Adds a root module, loaded after the ones added before it
    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.modules.push(name.into());
        self
    }

    pub fn modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.extend(names.into_iter().map(Into::into));
        self
    }

    /// In strict mode every function must carry an explicit annotation
    pub fn strict_di(mut self, strict_di: bool) -> Self {
        self.strict_di = strict_di;
        self
    }

    pub fn build(self) -> Result<Injector, InjectError> {
        InjectorInitiator::new(self.registry).initiate(&self.modules, self.strict_di)
    }
}
