use std::{collections::HashSet, rc::Rc};

use crate::{
    container::InjectorCore,
    errors::InjectError,
    injector::{Injector, InjectorKind},
    invokable::Invokable,
    module::ModuleRegistry,
    provide::Provide,
};

/// Loads modules into a fresh injector
pub(crate) struct InjectorInitiator<'r> {
    registry: &'r ModuleRegistry,
    loaded: HashSet<String>,
    config_blocks: Vec<Invokable>,
    run_blocks: Vec<Invokable>,
}

impl<'r> InjectorInitiator<'r> {
    pub(crate) fn new(registry: &'r ModuleRegistry) -> Self {
        InjectorInitiator {
            registry,
            loaded: HashSet::new(),
            config_blocks: Vec::new(),
            run_blocks: Vec::new(),
        }
    }

    /// Loads `modules` and their requirements, then runs all config and run blocks
    ///
    /// Returns the instance injector
    pub(crate) fn initiate(
        mut self,
        modules: &[String],
        strict_di: bool,
    ) -> Result<Injector, InjectError> {
        let core = Rc::new(InjectorCore::new(strict_di));
        let provider_injector = Injector::new(core.clone(), InjectorKind::Provider);
        let instance_injector = Injector::new(core, InjectorKind::Instance);
        let provide = Provide::new(provider_injector.clone());

        for name in modules {
            self.load(name, &provide)?;
        }

        tracing::debug!(
            "Loaded {} modules, running {} config blocks and {} run blocks",
            self.loaded.len(),
            self.config_blocks.len(),
            self.run_blocks.len()
        );

        for block in &self.config_blocks {
            provider_injector.invoke(block, None, None)?;
        }
        for block in &self.run_blocks {
            instance_injector.invoke(block, None, None)?;
        }

        Ok(instance_injector)
    }

    /// Depth first - requirements are loaded before the module itself, every module at most once
    fn load(&mut self, name: &str, provide: &Provide) -> Result<(), InjectError> {
        if !self.loaded.insert(name.to_string()) {
            return Ok(());
        }

        let module = self.registry.lookup(name)?;
        for required in module.requires() {
            self.load(&required, provide)?;
        }

        tracing::debug!("Loading module '{name}'");
        for registration in module.provider_queue() {
            provide.register(registration)?;
        }

        self.config_blocks.extend(module.config_queue());
        self.run_blocks.extend(module.run_queue());
        Ok(())
    }
}
