use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    rc::Rc,
};

use weave_di::DynError;

use crate::{
    scope::{Deregistration, Scope},
    value::Value,
};

/// Broadcast by [`Scope::destroy`] before the scope is detached
pub const DESTROY_EVENT: &str = "$destroy";

type EventListener = Box<dyn FnMut(&Event, &[Value]) -> Result<(), DynError>>;

pub(crate) struct ListenerSlot {
    id: u64,
    listener: Rc<RefCell<EventListener>>,
}

/// An event travelling through the scope tree
pub struct Event {
    name: String,
    target_scope: Scope,
    current_scope: RefCell<Option<Scope>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    fn new(name: &str, target_scope: Scope) -> Self {
        Event {
            name: name.to_string(),
            target_scope,
            current_scope: RefCell::new(None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope the event was emitted or broadcast on
    pub fn target_scope(&self) -> &Scope {
        &self.target_scope
    }

    /// The scope whose listeners are running, `None` once dispatch has finished
    pub fn current_scope(&self) -> Option<Scope> {
        self.current_scope.borrow().clone()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stops an emitted event from reaching further ancestors.
    /// Listeners on the current scope still run. Broadcasts ignore it.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    fn set_current(&self, scope: Option<Scope>) {
        *self.current_scope.borrow_mut() = scope;
    }
}

impl Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("target_scope", &self.target_scope.id())
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}

impl Scope {
    /// Registers a listener for events named `name` reaching this scope
    pub fn on<L>(&self, name: &str, listener: L) -> Deregistration
    where
        L: FnMut(&Event, &[Value]) -> Result<(), DynError> + 'static,
    {
        let id = self.inner.root.next_id();
        self.inner
            .listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(Some(ListenerSlot {
                id,
                listener: Rc::new(RefCell::new(Box::new(listener))),
            }));

        // Slots are only tombstoned here, dispatch may be iterating the same list
        let scope = self.downgrade();
        let name = name.to_string();
        Deregistration::new(move || {
            let Some(scope) = scope.upgrade() else { return };
            let mut listeners = scope.listeners.borrow_mut();
            if let Some(slots) = listeners.get_mut(&name) {
                if let Some(slot) = slots
                    .iter_mut()
                    .find(|slot| matches!(slot, Some(slot) if slot.id == id))
                {
                    *slot = None;
                }
            }
        })
    }

    /// Dispatches on this scope and then on each ancestor, until the root is reached or a
    /// listener stops propagation
    pub fn emit(&self, name: &str, args: &[Value]) -> Event {
        let event = Event::new(name, self.clone());
        let mut scope = Some(self.clone());
        while let Some(current) = scope {
            event.set_current(Some(current.clone()));
            current.fire_event(&event, args);
            if event.propagation_stopped.get() {
                break;
            }
            scope = current.parent();
        }
        event.set_current(None);
        event
    }

    /// Dispatches on this scope and all of its descendants, parents before children
    pub fn broadcast(&self, name: &str, args: &[Value]) -> Event {
        let event = Event::new(name, self.clone());
        self.every_scope(&mut |scope| {
            event.set_current(Some(scope.clone()));
            scope.fire_event(&event, args);
            true
        });
        event.set_current(None);
        event
    }

    fn fire_event(&self, event: &Event, args: &[Value]) {
        let mut index = 0;
        loop {
            let listener = {
                let mut listeners = self.inner.listeners.borrow_mut();
                let Some(slots) = listeners.get_mut(event.name()) else {
                    return;
                };
                if index >= slots.len() {
                    return;
                }
                match &slots[index] {
                    Some(slot) => slot.listener.clone(),
                    None => {
                        slots.remove(index);
                        continue;
                    }
                }
            };
            index += 1;

            let Ok(mut listener) = listener.try_borrow_mut() else {
                tracing::warn!("Skipping re-entrant '{}' listener", event.name());
                continue;
            };
            if let Err(error) = listener(event, args) {
                tracing::error!(
                    "Listener for '{}' on scope {} failed: {error}",
                    event.name(),
                    self.id()
                );
            }
        }
    }

    /// Broadcasts [`DESTROY_EVENT`], then detaches this scope from its parent and drops its
    /// watchers and listeners
    ///
    /// A detached scope is no longer visited by digests of the tree.
    pub fn destroy(&self) {
        self.broadcast(DESTROY_EVENT, &[]);

        if let Some(parent) = self.parent() {
            parent
                .inner
                .children
                .borrow_mut()
                .retain(|child| child != self);
        }

        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        for watcher in watchers {
            watcher.deactivate();
        }
        self.inner.root.last_dirty.set(None);
        self.inner.listeners.borrow_mut().clear();
        tracing::debug!("Destroyed scope {}", self.id());
    }
}
