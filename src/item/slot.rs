//! Per-object extension slot.
//!
//! Every tree and item carries one opaque value plus an optional teardown
//! hook. A binding layer stores its wrapper object here so the same engine
//! object always surfaces as the same wrapper. The hook runs exactly once:
//! when the value is replaced, when the slot is cleared, or when the owning
//! object is destroyed.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::sync::lock;

/// Value stored in an extension slot
pub type ExtensionValue = Arc<dyn Any + Send + Sync>;

/// Hook invoked with the stored value when it leaves the slot
pub type Teardown = Box<dyn FnOnce(ExtensionValue) + Send>;

struct Extension {
    value: ExtensionValue,
    teardown: Option<Teardown>,
}

impl Extension {
    fn release(self) {
        if let Some(teardown) = self.teardown {
            teardown(self.value);
        }
    }
}

#[derive(Default)]
pub(crate) struct ExtensionSlot {
    inner: Mutex<Option<Extension>>,
}

impl ExtensionSlot {
    pub(crate) fn set(&self, value: ExtensionValue, teardown: Option<Teardown>) {
        let previous = lock(&self.inner).replace(Extension { value, teardown });
        // Run the old hook outside the lock; it may touch this slot again
        if let Some(previous) = previous {
            previous.release();
        }
    }

    pub(crate) fn get(&self) -> Option<ExtensionValue> {
        lock(&self.inner).as_ref().map(|ext| Arc::clone(&ext.value))
    }

    pub(crate) fn clear(&self) {
        let previous = lock(&self.inner).take();
        if let Some(previous) = previous {
            previous.release();
        }
    }
}

impl Drop for ExtensionSlot {
    fn drop(&mut self) {
        let ext = match self.inner.get_mut() {
            Ok(ext) => ext.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(ext) = ext {
            ext.release();
        }
    }
}

impl fmt::Debug for ExtensionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = lock(&self.inner).is_some();
        f.debug_struct("ExtensionSlot")
            .field("occupied", &occupied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook(counter: &Arc<AtomicUsize>) -> Teardown {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_get_returns_stored_value() {
        let slot = ExtensionSlot::default();
        assert!(slot.get().is_none());

        slot.set(Arc::new(42u32), None);
        let value = slot.get().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn test_replace_runs_previous_teardown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot = ExtensionSlot::default();

        slot.set(Arc::new("first"), Some(counting_hook(&counter)));
        slot.set(Arc::new("second"), None);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        drop(slot);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_runs_teardown_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot = ExtensionSlot::default();

        slot.set(Arc::new(1u8), Some(counting_hook(&counter)));
        slot.clear();
        slot.clear();
        drop(slot);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_runs_teardown_with_value() {
        let seen = Arc::new(Mutex::new(None));
        let slot = ExtensionSlot::default();
        let sink = Arc::clone(&seen);

        slot.set(
            Arc::new(String::from("wrapper")),
            Some(Box::new(move |value| {
                let text = value.downcast_ref::<String>().cloned();
                *sink.lock().unwrap() = text;
            })),
        );
        drop(slot);

        assert_eq!(seen.lock().unwrap().as_deref(), Some("wrapper"));
    }
}
