use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use weave_di::DynError;

use crate::{
    errors::ScopeError,
    scope::{Deregistration, Scope},
    value::Value,
};

type GroupListener = Box<dyn FnMut(&[Value], &[Value], &Scope) -> Result<(), DynError>>;

/// Boxes a watch function for [`Scope::watch_group`]
pub fn watch_fn(f: impl FnMut(&Scope) -> Result<Value, DynError> + 'static) -> WatchFn {
    Box::new(f)
}

/// A boxed watch function
pub type WatchFn = Box<dyn FnMut(&Scope) -> Result<Value, DynError>>;

struct WatchGroup {
    new_values: RefCell<Vec<Value>>,
    old_values: RefCell<Vec<Value>>,
    first_run: Cell<bool>,
    scheduled: Cell<bool>,
    listener: RefCell<GroupListener>,
}

impl WatchGroup {
    fn fire(&self, scope: &Scope) -> Result<(), DynError> {
        let new_values = self.new_values.borrow().clone();
        let old_values = match self.first_run.replace(false) {
            true => new_values.clone(),
            false => self.old_values.borrow().clone(),
        };
        let result = (self.listener.borrow_mut())(&new_values, &old_values, scope);
        self.scheduled.set(false);
        result
    }
}

impl Scope {
    /// Watches several values and calls `listener` at most once per digest pass with all of them
    ///
    /// The call is deferred through [`Scope::eval_async`], so changes reported by several watch
    /// functions in the same pass collapse into one. Without any watch function the listener is
    /// called exactly once with empty slices, unless the returned handle is cancelled first.
    pub fn watch_group<L>(
        &self,
        watch_fns: Vec<WatchFn>,
        listener: L,
    ) -> Result<Deregistration, ScopeError>
    where
        L: FnMut(&[Value], &[Value], &Scope) -> Result<(), DynError> + 'static,
    {
        if watch_fns.is_empty() {
            let should_call = Rc::new(Cell::new(true));
            let flag = should_call.clone();
            let mut listener = listener;
            self.eval_async(move |scope| match flag.get() {
                true => listener(&[], &[], scope),
                false => Ok(()),
            })?;
            return Ok(Deregistration::new(move || should_call.set(false)));
        }

        let group = Rc::new(WatchGroup {
            new_values: RefCell::new(vec![Value::Undefined; watch_fns.len()]),
            old_values: RefCell::new(vec![Value::Undefined; watch_fns.len()]),
            first_run: Cell::new(true),
            scheduled: Cell::new(false),
            listener: RefCell::new(Box::new(listener)),
        });

        let handles = watch_fns
            .into_iter()
            .enumerate()
            .map(|(i, watch_fn)| {
                let group = group.clone();
                self.watch(
                    watch_fn,
                    move |new_value, old_value, scope| {
                        group.new_values.borrow_mut()[i] = new_value.clone();
                        group.old_values.borrow_mut()[i] = old_value.clone();
                        if !group.scheduled.replace(true) {
                            let group = group.clone();
                            scope.eval_async(move |scope| group.fire(scope))?;
                        }
                        Ok(())
                    },
                    false,
                )
            })
            .collect();

        Ok(Deregistration::all(handles))
    }
}
