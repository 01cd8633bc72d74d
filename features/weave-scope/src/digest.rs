//! Dirty checking
//!
//! A digest repeatedly drains the evalAsync queue and evaluates every watcher of the (sub)tree
//! until a pass finds nothing dirty. Every dirty pass consumes one unit of the configured TTL and a
//! dirty pass with no TTL left aborts the digest with [`ScopeError::DigestOverrun`].

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::{
    future::{AbortHandle, Abortable},
    task::LocalSpawnExt,
};
use weave_di::DynError;

use crate::{
    errors::{Phase, ScopeError},
    scope::{AsyncTask, Deregistration, Scope},
    value::Value,
};

pub(crate) type WatchBox = Box<dyn FnMut(&Scope) -> Result<Value, DynError>>;
pub(crate) type ListenerBox = Box<dyn FnMut(&Value, &Value, &Scope) -> Result<(), DynError>>;

pub(crate) struct Watcher {
    id: u64,
    watch_fn: RefCell<WatchBox>,
    listener: RefCell<ListenerBox>,
    /// `None` until the first evaluation
    last: RefCell<Option<Value>>,
    value_eq: bool,
    active: Cell<bool>,
}

impl Watcher {
    /// Skipped by any digest pass still holding it
    pub(crate) fn deactivate(&self) {
        self.active.set(false);
    }

    fn is_equal(&self, new_value: &Value, last: &Value) -> bool {
        if self.value_eq {
            new_value.deep_eq(last)
        } else {
            new_value.identical(last)
        }
    }
}

enum Evaluation {
    Dirty,
    Clean,
    /// Clean, and nothing has changed since this watcher was last dirty
    Stable,
}

impl Scope {
    /// Registers a watcher on this scope
    ///
    /// `watch_fn` is evaluated on every digest pass. Whenever its result differs from the
    /// previous one, `listener` is called with the new and the old value. On the first call the
    /// old value is the new value. With `value_eq` the values are compared structurally and a
    /// deep copy is kept, so in-place mutations are detected too.
    pub fn watch<W, L>(&self, watch_fn: W, listener: L, value_eq: bool) -> Deregistration
    where
        W: FnMut(&Scope) -> Result<Value, DynError> + 'static,
        L: FnMut(&Value, &Value, &Scope) -> Result<(), DynError> + 'static,
    {
        let root = &self.inner.root;
        let watcher = Rc::new(Watcher {
            id: root.next_id(),
            watch_fn: RefCell::new(Box::new(watch_fn)),
            listener: RefCell::new(Box::new(listener)),
            last: RefCell::new(None),
            value_eq,
            active: Cell::new(true),
        });

        self.inner.watchers.borrow_mut().insert(0, watcher.clone());
        root.last_dirty.set(None);

        let scope = self.downgrade();
        let watcher = Rc::downgrade(&watcher);
        Deregistration::new(move || {
            let (Some(scope), Some(watcher)) = (scope.upgrade(), watcher.upgrade()) else {
                return;
            };
            let mut watchers = scope.watchers.borrow_mut();
            if let Some(index) = watchers.iter().position(|w| Rc::ptr_eq(w, &watcher)) {
                watchers.remove(index);
                watcher.deactivate();
                scope.root.last_dirty.set(None);
            }
        })
    }

    /// Runs the digest loop over this scope and its descendants
    pub fn digest(&self) -> Result<(), ScopeError> {
        let root = self.inner.root.clone();
        root.begin_phase(Phase::Digest)?;
        root.last_dirty.set(None);

        let pending_flush = root.apply_async_handle.borrow_mut().take();
        if let Some(handle) = pending_flush {
            handle.abort();
            self.flush_apply_async();
        }

        let ttl = root.config.ttl;
        let mut remaining = ttl;
        let mut passes = 0;
        loop {
            self.drain_async_queue();
            let dirty = self.digest_once();
            passes += 1;

            if !dirty && root.async_queue.borrow().is_empty() {
                break;
            }
            if remaining == 0 {
                root.clear_phase();
                tracing::error!("Digest aborted after {passes} passes");
                return Err(ScopeError::DigestOverrun { ttl });
            }
            remaining -= 1;
        }
        root.clear_phase();
        tracing::debug!("Digest of scope {} stable after {passes} passes", self.id());

        loop {
            let task = root.post_digest_queue.borrow_mut().pop_front();
            let Some(task) = task else { break };
            if let Err(error) = task() {
                tracing::error!("Post digest task failed: {error}");
            }
        }
        Ok(())
    }

    /// Evaluates every watcher of the subtree once. Returns true if any was dirty.
    fn digest_once(&self) -> bool {
        let mut dirty = false;
        self.every_scope(&mut |scope| {
            let watchers = scope.inner.watchers.borrow().clone();
            for watcher in watchers.iter().filter(|w| w.active.get()) {
                match scope.evaluate(watcher) {
                    Evaluation::Dirty => dirty = true,
                    Evaluation::Clean => {}
                    Evaluation::Stable => return false,
                }
            }
            true
        });
        dirty
    }

    fn evaluate(&self, watcher: &Watcher) -> Evaluation {
        let root = &self.inner.root;

        let result = (watcher.watch_fn.borrow_mut())(self);
        let new_value = match result {
            Ok(value) => value,
            Err(error) => {
                tracing::error!("Watch function on scope {} failed: {error}", self.id());
                return Evaluation::Clean;
            }
        };

        let changed = match &*watcher.last.borrow() {
            Some(last) => !watcher.is_equal(&new_value, last),
            None => true,
        };
        if !changed {
            return match root.last_dirty.get() == Some(watcher.id) {
                true => Evaluation::Stable,
                false => Evaluation::Clean,
            };
        }

        root.last_dirty.set(Some(watcher.id));
        let recorded = match watcher.value_eq {
            true => new_value.deep_copy(),
            false => new_value.clone(),
        };
        let old_value = watcher
            .last
            .replace(Some(recorded))
            .unwrap_or_else(|| new_value.clone());

        let result = (watcher.listener.borrow_mut())(&new_value, &old_value, self);
        if let Err(error) = result {
            tracing::error!("Watch listener on scope {} failed: {error}", self.id());
        }
        Evaluation::Dirty
    }

    fn drain_async_queue(&self) {
        let root = &self.inner.root;
        loop {
            let task = root.async_queue.borrow_mut().pop_front();
            let Some(AsyncTask { scope, expression }) = task else {
                break;
            };
            let Some(scope) = scope.upgrade().map(Scope::from_inner) else {
                tracing::trace!("Skipping async expression for a dropped scope");
                continue;
            };
            if let Err(error) = expression(&scope) {
                tracing::error!("Async expression on scope {} failed: {error}", scope.id());
            }
        }
    }

    /// Runs `expr` and then digests the whole tree, even if `expr` failed
    ///
    /// A digest failure takes precedence over the failure of `expr`.
    pub fn apply<T>(
        &self,
        expr: impl FnOnce(&Scope) -> Result<T, DynError>,
    ) -> Result<T, ScopeError> {
        let root = self.inner.root.clone();
        root.begin_phase(Phase::Apply)?;
        let result = self.eval(expr);
        root.clear_phase();

        root.root_scope()?.digest()?;
        result.map_err(ScopeError::Expression)
    }

    /// Evaluates `expr` on this scope later during the current digest, or in a digest scheduled
    /// on the executor when no digest is running
    pub fn eval_async(
        &self,
        expr: impl FnOnce(&Scope) -> Result<(), DynError> + 'static,
    ) -> Result<(), ScopeError> {
        let root = &self.inner.root;
        if root.phase().is_none() && root.async_queue.borrow().is_empty() {
            let weak_root = root.weak_root();
            root.spawner.spawn_local(async move {
                let Some(root) = weak_root.upgrade().map(Scope::from_inner) else {
                    return;
                };
                if root.inner.root.async_queue.borrow().is_empty() {
                    return;
                }
                if let Err(error) = root.digest() {
                    tracing::error!("Scheduled digest failed: {error}");
                }
            })?;
        }

        root.async_queue.borrow_mut().push_back(AsyncTask {
            scope: self.downgrade(),
            expression: Box::new(expr),
        });
        Ok(())
    }

    /// Queues `expr` for a single coalesced `apply` run on the executor
    ///
    /// A digest started before the flush runs cancels it and runs the queued expressions itself.
    pub fn apply_async(
        &self,
        expr: impl FnOnce(&Scope) -> Result<(), DynError> + 'static,
    ) -> Result<(), ScopeError> {
        let root = &self.inner.root;
        root.apply_async_queue.borrow_mut().push_back(AsyncTask {
            scope: self.downgrade(),
            expression: Box::new(expr),
        });

        if root.apply_async_handle.borrow().is_some() {
            return Ok(());
        }

        let (handle, registration) = AbortHandle::new_pair();
        let weak_root = root.weak_root();
        let flush = Abortable::new(
            async move {
                let Some(root) = weak_root.upgrade().map(Scope::from_inner) else {
                    return;
                };
                let result = root.apply(|root| {
                    root.flush_apply_async();
                    Ok(())
                });
                if let Err(error) = result {
                    tracing::error!("Apply async flush failed: {error}");
                }
            },
            registration,
        );
        root.spawner.spawn_local(async move {
            if flush.await.is_err() {
                tracing::trace!("Apply async flush was taken over by a digest");
            }
        })?;
        *root.apply_async_handle.borrow_mut() = Some(handle);
        Ok(())
    }

    fn flush_apply_async(&self) {
        let root = &self.inner.root;
        loop {
            let task = root.apply_async_queue.borrow_mut().pop_front();
            let Some(AsyncTask { scope, expression }) = task else {
                break;
            };
            let Some(scope) = scope.upgrade().map(Scope::from_inner) else {
                tracing::trace!("Skipping async expression for a dropped scope");
                continue;
            };
            if let Err(error) = expression(&scope) {
                tracing::error!("Apply async expression on scope {} failed: {error}", scope.id());
            }
        }
        root.apply_async_handle.borrow_mut().take();
    }

    /// Runs `task` once after the next digest has stabilized
    pub fn post_digest(&self, task: impl FnOnce() -> Result<(), DynError> + 'static) {
        self.inner
            .root
            .post_digest_queue
            .borrow_mut()
            .push_back(Box::new(task));
    }
}
