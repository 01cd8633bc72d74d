use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    fmt::Debug,
    rc::{Rc, Weak},
};

use futures::{future::AbortHandle, task::LocalSpawn};
use indexmap::IndexMap;
use weave_di::DynError;

use crate::{
    config::DigestConfig,
    digest::Watcher,
    errors::{Phase, ScopeError},
    events::ListenerSlot,
    value::Value,
};

pub(crate) type Expression = Box<dyn FnOnce(&Scope) -> Result<(), DynError>>;
pub(crate) type PostDigestFn = Box<dyn FnOnce() -> Result<(), DynError>>;

/// An expression queued for later evaluation on a specific scope
///
/// The scope is held weakly: the root owns the queue, and a task for a dropped scope is skipped.
pub(crate) struct AsyncTask {
    pub scope: Weak<ScopeInner>,
    pub expression: Expression,
}

/// State owned by the root and shared by every scope of the tree
pub(crate) struct RootState {
    root: Weak<ScopeInner>,
    phase: Cell<Option<Phase>>,
    pub async_queue: RefCell<VecDeque<AsyncTask>>,
    pub apply_async_queue: RefCell<VecDeque<AsyncTask>>,
    pub post_digest_queue: RefCell<VecDeque<PostDigestFn>>,
    /// Set while an applyAsync flush is scheduled
    pub apply_async_handle: RefCell<Option<AbortHandle>>,
    /// Id of the watcher that was dirty most recently
    pub last_dirty: Cell<Option<u64>>,
    next_id: Cell<u64>,
    pub spawner: Rc<dyn LocalSpawn>,
    pub config: DigestConfig,
}

impl RootState {
    pub fn phase(&self) -> Option<Phase> {
        self.phase.get()
    }

    pub fn begin_phase(&self, phase: Phase) -> Result<(), ScopeError> {
        if let Some(active) = self.phase.get() {
            return Err(ScopeError::PhaseInProgress(active));
        }
        self.phase.set(Some(phase));
        Ok(())
    }

    pub fn clear_phase(&self) {
        self.phase.set(None);
    }

    pub fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn root_scope(&self) -> Result<Scope, ScopeError> {
        self.root
            .upgrade()
            .map(|inner| Scope { inner })
            .ok_or(ScopeError::RootDropped)
    }

    pub fn weak_root(&self) -> Weak<ScopeInner> {
        self.root.clone()
    }
}

pub(crate) struct ScopeInner {
    pub id: u64,
    pub isolate: bool,
    /// Hierarchical parent, used for event propagation and tree traversal
    pub parent: Option<Weak<ScopeInner>>,
    /// Scope undeclared properties are read from
    prototype: Option<Weak<ScopeInner>>,
    /// Newest first
    pub watchers: RefCell<Vec<Rc<Watcher>>>,
    pub listeners: RefCell<HashMap<String, Vec<Option<ListenerSlot>>>>,
    pub children: RefCell<Vec<Scope>>,
    properties: RefCell<IndexMap<String, Value>>,
    pub root: Rc<RootState>,
}

/// A node of the scope tree
///
/// Handles are cheap to clone and compare by identity. The tree is owned by its root: children
/// are kept alive by their parents, while parents and the root are only referenced weakly.
#[derive(Clone)]
pub struct Scope {
    pub(crate) inner: Rc<ScopeInner>,
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("isolate", &self.inner.isolate)
            .field("watchers", &self.inner.watchers.borrow().len())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

impl Scope {
    /// Creates the root of a new scope tree
    ///
    /// Deferred work (`eval_async` fallbacks, `apply_async` flushes) is spawned on `spawner`.
    pub fn new_root(spawner: impl LocalSpawn + 'static) -> Self {
        Self::new_root_with_config(spawner, DigestConfig::default())
    }

    pub fn new_root_with_config(spawner: impl LocalSpawn + 'static, config: DigestConfig) -> Self {
        Self::with_spawner(Rc::new(spawner), config)
    }

    pub(crate) fn with_spawner(spawner: Rc<dyn LocalSpawn>, config: DigestConfig) -> Self {
        let inner = Rc::new_cyclic(|root| ScopeInner {
            id: 0,
            isolate: false,
            parent: None,
            prototype: None,
            watchers: RefCell::new(Vec::new()),
            listeners: RefCell::new(HashMap::new()),
            children: RefCell::new(Vec::new()),
            properties: RefCell::new(IndexMap::new()),
            root: Rc::new(RootState {
                root: root.clone(),
                phase: Cell::new(None),
                async_queue: RefCell::new(VecDeque::new()),
                apply_async_queue: RefCell::new(VecDeque::new()),
                post_digest_queue: RefCell::new(VecDeque::new()),
                apply_async_handle: RefCell::new(None),
                last_dirty: Cell::new(None),
                next_id: Cell::new(1),
                spawner,
                config,
            }),
        });
        tracing::debug!("Created root scope with {:?}", config);
        Scope { inner }
    }

    /// Creates a child attached to this scope
    ///
    /// A non-isolate child reads undeclared properties through to this scope.
    pub fn new_child(&self, isolate: bool) -> Scope {
        self.new_child_in(isolate, self)
    }

    /// Creates a child reading through to this scope but attached to `parent` in the tree
    pub fn new_child_in(&self, isolate: bool, parent: &Scope) -> Scope {
        let root = self.inner.root.clone();
        let child = Scope {
            inner: Rc::new(ScopeInner {
                id: root.next_id(),
                isolate,
                parent: Some(Rc::downgrade(&parent.inner)),
                prototype: (!isolate).then(|| Rc::downgrade(&self.inner)),
                watchers: RefCell::new(Vec::new()),
                listeners: RefCell::new(HashMap::new()),
                children: RefCell::new(Vec::new()),
                properties: RefCell::new(IndexMap::new()),
                root,
            }),
        };
        parent.inner.children.borrow_mut().push(child.clone());
        child
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_isolate(&self) -> bool {
        self.inner.isolate
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn parent(&self) -> Option<Scope> {
        let inner = self.inner.parent.as_ref()?.upgrade()?;
        Some(Scope { inner })
    }

    pub fn root(&self) -> Option<Scope> {
        self.inner.root.root_scope().ok()
    }

    pub fn children(&self) -> Vec<Scope> {
        self.inner.children.borrow().clone()
    }

    /// The phase of the whole tree
    pub fn phase(&self) -> Option<Phase> {
        self.inner.root.phase()
    }

    /// Reads a property, falling back to the prototype chain for non-isolate scopes
    pub fn get(&self, key: &str) -> Value {
        if let Some(value) = self.inner.properties.borrow().get(key) {
            return value.clone();
        }
        match self.inner.prototype.as_ref().and_then(Weak::upgrade) {
            Some(prototype) => Scope { inner: prototype }.get(key),
            None => Value::Undefined,
        }
    }

    /// Writes a property on this scope, shadowing any inherited one
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .properties
            .borrow_mut()
            .insert(key.into(), value.into());
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.inner.properties.borrow().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.properties.borrow_mut().shift_remove(key)
    }

    /// Evaluates `expr` against this scope
    pub fn eval<T>(&self, expr: impl FnOnce(&Scope) -> T) -> T {
        expr(self)
    }

    /// Visits this scope and its descendants in pre-order until `f` returns false
    ///
    /// Returns false if the traversal was cut short.
    pub(crate) fn every_scope(&self, f: &mut dyn FnMut(&Scope) -> bool) -> bool {
        if !f(self) {
            return false;
        }
        let children = self.children();
        for child in &children {
            if !child.every_scope(f) {
                return false;
            }
        }
        true
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<ScopeInner>) -> Scope {
        Scope { inner }
    }
}

/// Removes a watcher, an event listener or a group of them
///
/// Cancelling is idempotent. Dropping the handle does not cancel anything.
#[derive(Clone)]
pub struct Deregistration {
    cancel: Rc<dyn Fn()>,
}

impl Deregistration {
    pub(crate) fn new(cancel: impl Fn() + 'static) -> Self {
        Deregistration {
            cancel: Rc::new(cancel),
        }
    }

    pub(crate) fn all(handles: Vec<Deregistration>) -> Self {
        Self::new(move || handles.iter().for_each(Deregistration::cancel))
    }

    pub fn cancel(&self) {
        (self.cancel)()
    }
}

impl Debug for Deregistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Deregistration")
    }
}
