//! `$rootScope` for the dependency injection container

use std::{cell::Cell, rc::Rc};

use futures::task::LocalSpawn;
use weave_di::{ConfigError, Instance, Invokable, Module, ModuleRegistry, Provider};

use crate::{config::DigestConfig, scope::Scope};

/// Module declared by [`register`]
pub const NG_MODULE: &str = "ng";
/// Name the root scope is resolvable under
pub const ROOT_SCOPE: &str = "$rootScope";

/// Provider of the root scope, injectable into config blocks as `$rootScopeProvider`
pub struct RootScopeProvider {
    spawner: Rc<dyn LocalSpawn>,
    ttl: Cell<usize>,
}

impl RootScopeProvider {
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        RootScopeProvider {
            spawner: Rc::new(spawner),
            ttl: Cell::new(DigestConfig::default().ttl),
        }
    }

    /// Sets the digest TTL of the root scope, which is created on first use
    pub fn digest_ttl(&self, ttl: usize) {
        self.ttl.set(ttl);
    }

    pub fn ttl(&self) -> usize {
        self.ttl.get()
    }
}

impl Provider for RootScopeProvider {
    fn get(&self) -> Invokable {
        let spawner = self.spawner.clone();
        let config = DigestConfig::default().ttl(self.ttl.get());
        Invokable::new(move |_| Ok(Instance::new(Scope::with_spawner(spawner.clone(), config))))
    }
}

/// Declares the `ng` module providing [`ROOT_SCOPE`]
///
/// Application modules list `ng` as a requirement to get a root scope injected.
pub fn register(
    registry: &mut ModuleRegistry,
    spawner: impl LocalSpawn + 'static,
) -> Result<Module, ConfigError> {
    let module = registry.declare(NG_MODULE, Vec::<String>::new())?;
    module.provider(ROOT_SCOPE, RootScopeProvider::new(spawner));
    Ok(module)
}
