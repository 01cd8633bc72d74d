use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    rc::Rc,
};

/// Error type returned by user supplied functions
pub type DynError = Box<dyn std::error::Error>;

/// The container is single threaded and cooperative,
/// so anything `'static` can be injected.
pub trait Injectable: 'static {}
impl<T: 'static> Injectable for T {}

/// Locals passed to `invoke` / `instantiate`, taking precedence over the container
pub type Locals = HashMap<String, Instance>;

/// A resolved value held by the injector caches
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Rc<dyn Any>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance: Rc::new(instance),
        }
    }

    /// Wraps an already shared value without moving it
    pub fn from_rc<T: Injectable>(instance: Rc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Rc<T>, &'static str> {
        match Rc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    pub fn is<T: Injectable>(&self) -> bool {
        self.info.type_id == TypeId::of::<T>()
    }

    /// True if both instances point at the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.instance, &other.instance)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}
