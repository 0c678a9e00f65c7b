use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback = Rc<dyn Fn(&dyn Any)>;

struct Registration {
    alive: Rc<Cell<bool>>,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: HashMap<TypeId, Vec<Registration>>,
}

impl Registry {
    /// Unlinks every registration whose observer has been dropped. The
    /// entries are handed back so their callbacks are dropped after the
    /// registry borrow ends; a callback may own further observers.
    fn prune(&mut self) -> Vec<Registration> {
        let mut dead = Vec::new();
        for list in self.observers.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) =
                std::mem::take(list).into_iter().partition(|r| !r.alive.get());
            *list = kept;
            dead.extend(gone);
        }
        self.observers.retain(|_, list| !list.is_empty());
        dead
    }
}

/// Synchronous, same-thread publish/subscribe channel keyed by event type.
///
/// `publish` runs every observer registered for the exact event type, in
/// registration order, before returning. Cloning the bus yields another
/// handle to the same channel.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for events of type `E`.
    ///
    /// The registration lives as long as the returned [`EventObserver`].
    #[must_use = "dropping the observer unsubscribes it immediately"]
    pub fn subscribe<E, F>(&self, callback: F) -> EventObserver
    where
        E: 'static,
        F: Fn(&E) + 'static,
    {
        let type_id = TypeId::of::<E>();
        let alive = Rc::new(Cell::new(true));
        let callback: Callback = Rc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                callback(event);
            }
        });

        let mut registry = self.inner.borrow_mut();
        let dead = registry.prune();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.observers.entry(type_id).or_default().push(Registration {
            alive: alive.clone(),
            callback,
        });
        drop(registry);
        drop(dead);

        EventObserver {
            bus: Rc::downgrade(&self.inner),
            id,
            alive,
        }
    }

    /// Delivers `event` to every live observer of `E`.
    ///
    /// Observers added during delivery see the next publish, not this one.
    /// Observers dropped during delivery are skipped.
    pub fn publish<E: 'static>(&self, event: &E) {
        let snapshot: Vec<(Rc<Cell<bool>>, Callback)> = {
            let registry = self.inner.borrow();
            match registry.observers.get(&TypeId::of::<E>()) {
                Some(list) => list
                    .iter()
                    .map(|r| (r.alive.clone(), r.callback.clone()))
                    .collect(),
                None => return,
            }
        };

        for (alive, callback) in snapshot {
            if alive.get() {
                callback(event);
            }
        }
    }

    /// Number of live observers registered for `E`.
    pub fn observer_count<E: 'static>(&self) -> usize {
        self.inner
            .borrow()
            .observers
            .get(&TypeId::of::<E>())
            .map_or(0, |list| list.iter().filter(|r| r.alive.get()).count())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.borrow();
        let total: usize = registry.observers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("event_types", &registry.observers.len())
            .field("observers", &total)
            .finish()
    }
}

/// Scoped subscription returned by [`EventBus::subscribe`].
///
/// Dropping it unregisters the callback. The observer does not keep the bus
/// alive.
pub struct EventObserver {
    bus: Weak<RefCell<Registry>>,
    id: u64,
    alive: Rc<Cell<bool>>,
}

impl EventObserver {
    /// Whether the observer is still registered on a live bus.
    pub fn is_attached(&self) -> bool {
        self.alive.get() && self.bus.strong_count() > 0
    }
}

impl Drop for EventObserver {
    fn drop(&mut self) {
        self.alive.set(false);
        let Some(registry) = self.bus.upgrade() else {
            return;
        };
        // While the registry is borrowed the dead flag silences the entry
        // until the next prune.
        let dead = match registry.try_borrow_mut() {
            Ok(mut registry) => registry.prune(),
            Err(_) => Vec::new(),
        };
        drop(dead);
    }
}

impl fmt::Debug for EventObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObserver")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
