use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use weave_di::DynError;

use crate::{
    scope::{Deregistration, Scope},
    value::Value,
};

enum CollectionListener {
    WithHistory {
        listener: Box<dyn FnMut(&Value, &Value, &Scope) -> Result<(), DynError>>,
        /// Shallow copy of the value the listener last saw
        previous: Value,
    },
    NewOnly(Box<dyn FnMut(&Value, &Scope) -> Result<(), DynError>>),
}

/// Shallow shadow of the watched collection
#[derive(Default)]
struct Shadow {
    new_value: Value,
    old_value: Value,
    change_count: u64,
}

impl Shadow {
    fn observe(&mut self, new_value: Value) {
        match &new_value {
            Value::Array(items) => {
                let shadow = match &self.old_value {
                    Value::Array(shadow) => shadow.clone(),
                    _ => {
                        self.change_count += 1;
                        let shadow = Rc::new(RefCell::new(Vec::new()));
                        self.old_value = Value::Array(shadow.clone());
                        shadow
                    }
                };
                self.change_count += sync_items(&items.borrow(), &mut shadow.borrow_mut());
            }
            Value::Object(entries) => {
                let shadow = match &self.old_value {
                    Value::Object(shadow) => shadow.clone(),
                    _ => {
                        self.change_count += 1;
                        let shadow = Rc::new(RefCell::new(IndexMap::new()));
                        self.old_value = Value::Object(shadow.clone());
                        shadow
                    }
                };
                self.change_count += sync_entries(&entries.borrow(), &mut shadow.borrow_mut());
            }
            scalar => {
                if !scalar.identical(&self.old_value) {
                    self.change_count += 1;
                }
                self.old_value = scalar.clone();
            }
        }
        self.new_value = new_value;
    }
}

fn sync_items(items: &[Value], shadow: &mut Vec<Value>) -> u64 {
    let mut changes = 0;
    if items.len() != shadow.len() {
        changes += 1;
        shadow.resize(items.len(), Value::Undefined);
    }
    for (item, seen) in items.iter().zip(shadow.iter_mut()) {
        if !item.identical(seen) {
            changes += 1;
            *seen = item.clone();
        }
    }
    changes
}

fn sync_entries(entries: &IndexMap<String, Value>, shadow: &mut IndexMap<String, Value>) -> u64 {
    let mut changes = 0;
    for (key, value) in entries {
        match shadow.get_mut(key) {
            Some(seen) if seen.identical(value) => {}
            Some(seen) => {
                changes += 1;
                *seen = value.clone();
            }
            None => {
                changes += 1;
                shadow.insert(key.clone(), value.clone());
            }
        }
    }
    if shadow.len() > entries.len() {
        changes += 1;
        shadow.retain(|key, _| entries.contains_key(key));
    }
    changes
}

impl Scope {
    /// Watches an array or object shallowly
    ///
    /// Fires when elements or entries are added, removed or replaced, without comparing nested
    /// values. Anything else is compared by identity. The listener receives the new value and a
    /// shallow copy of the value it saw last time; on the first call both are the new value.
    pub fn watch_collection<W, L>(&self, watch_fn: W, listener: L) -> Deregistration
    where
        W: FnMut(&Scope) -> Result<Value, DynError> + 'static,
        L: FnMut(&Value, &Value, &Scope) -> Result<(), DynError> + 'static,
    {
        self.watch_shadow(
            watch_fn,
            CollectionListener::WithHistory {
                listener: Box::new(listener),
                previous: Value::Undefined,
            },
        )
    }

    /// Like [`Scope::watch_collection`] for listeners that only need the new value,
    /// which saves copying the collection after every change
    pub fn watch_collection_new_only<W, L>(&self, watch_fn: W, listener: L) -> Deregistration
    where
        W: FnMut(&Scope) -> Result<Value, DynError> + 'static,
        L: FnMut(&Value, &Scope) -> Result<(), DynError> + 'static,
    {
        self.watch_shadow(watch_fn, CollectionListener::NewOnly(Box::new(listener)))
    }

    fn watch_shadow<W>(&self, mut watch_fn: W, mut listener: CollectionListener) -> Deregistration
    where
        W: FnMut(&Scope) -> Result<Value, DynError> + 'static,
    {
        let shadow = Rc::new(RefCell::new(Shadow::default()));
        let observed = shadow.clone();
        let mut first_run = true;

        self.watch(
            move |scope| {
                let value = watch_fn(scope)?;
                let mut shadow = observed.borrow_mut();
                shadow.observe(value);
                Ok(Value::Number(shadow.change_count as f64))
            },
            move |_, _, scope| {
                let new_value = shadow.borrow().new_value.clone();
                match &mut listener {
                    CollectionListener::WithHistory { listener, previous } => {
                        let result = match first_run {
                            true => listener(&new_value, &new_value, scope),
                            false => listener(&new_value, previous, scope),
                        };
                        *previous = new_value.shallow_copy();
                        first_run = false;
                        result
                    }
                    CollectionListener::NewOnly(listener) => {
                        first_run = false;
                        listener(&new_value, scope)
                    }
                }
            },
            false,
        )
    }
}
