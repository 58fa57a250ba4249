//! Observer registrations of a tree.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::sync::lock;
use crate::tree::Tree;

/// Callback invoked with the rebuilt tree and its registration context
pub type MonitorFn<C> = fn(&Tree, &C);

struct Registration {
    /// Address of the callback, compared on removal
    callback: usize,
    invoke: Box<dyn Fn(&Tree) + Send + Sync>,
    matches: Box<dyn Fn(&dyn Any) -> bool + Send + Sync>,
    /// Cleared on removal so an in-progress dispatch skips it
    active: AtomicBool,
}

#[derive(Default)]
pub(crate) struct MonitorRegistry {
    entries: Mutex<Vec<Arc<Registration>>>,
}

impl MonitorRegistry {
    pub(crate) fn add<C>(&self, callback: MonitorFn<C>, context: C)
    where
        C: PartialEq + Send + Sync + 'static,
    {
        let context = Arc::new(context);
        let stored = Arc::clone(&context);
        let registration = Registration {
            callback: callback as usize,
            invoke: Box::new(move |tree| callback(tree, &context)),
            matches: Box::new(move |other| other.downcast_ref::<C>().is_some_and(|o| *o == *stored)),
            active: AtomicBool::new(true),
        };
        lock(&self.entries).push(Arc::new(registration));
    }

    /// Remove every registration of `callback` whose context equals
    /// `context`; returns how many were removed
    pub(crate) fn remove<C>(&self, callback: MonitorFn<C>, context: &C) -> usize
    where
        C: PartialEq + Send + Sync + 'static,
    {
        let address = callback as usize;
        let mut removed = 0;
        lock(&self.entries).retain(|registration| {
            let hit = registration.callback == address && (registration.matches)(context);
            if hit {
                registration.active.store(false, Ordering::SeqCst);
                removed += 1;
            }
            !hit
        });
        removed
    }

    /// Invoke every active registration without holding the lock
    pub(crate) fn dispatch(&self, tree: &Tree) {
        let snapshot: Vec<Arc<Registration>> = lock(&self.entries).clone();
        for registration in snapshot {
            if registration.active.load(Ordering::SeqCst) {
                (registration.invoke)(tree);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}
