//! Per-session variable store.
//!
//! Last-write-wins per key, one version counter per key, synchronous change
//! notification. Writes from inside a notification are rejected, and so
//! is every write or subscription after the owning session is torn down.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use ikp_types::Value;

use crate::error::RuntimeError;
use crate::listeners::{Listeners, SubscriptionId};

/// Read access to variables, shared by the store and dispatch transactions.
pub trait Lookup {
    /// The current value of `name`, or `None` when it was never set.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// A change delivered to store subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct VarChange {
    pub key: String,
    /// `None` when the key was previously unset.
    pub old: Option<Value>,
    pub new: Value,
    /// The key's version after this write.
    pub version: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    version: u64,
}

/// Mutable key-value state bound to widgets through `var`.
///
/// All methods take `&self`: a subscriber may hold a reference to the store
/// and read it while being notified.
#[derive(Default)]
pub struct VariableStore {
    slots: RefCell<BTreeMap<String, Slot>>,
    listeners: Listeners<VarChange>,
    notifying: Cell<bool>,
    closed: Cell<bool>,
}

/// Clears the notifying flag even if a listener panics.
struct NotifyGuard<'a>(&'a Cell<bool>);

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first subscriber is `listener`.
    pub(crate) fn with_listener(listener: impl Fn(&VarChange) + 'static) -> Self {
        let store = Self::default();
        store.listeners.add(listener);
        store
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.slots.borrow().get(key).map(|slot| slot.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.borrow().contains_key(key)
    }

    /// Number of value-changing writes to `key`; 0 if never set.
    pub fn version(&self, key: &str) -> u64 {
        self.slots.borrow().get(key).map_or(0, |slot| slot.version)
    }

    /// Write `value` under `key`.
    ///
    /// Returns `Ok(true)` when the stored value changed, in which case the
    /// version was bumped and every subscriber was notified before return.
    /// Writing an equal value is a no-op returning `Ok(false)`.
    pub fn set(&self, key: &str, value: Value) -> Result<bool, RuntimeError> {
        self.ensure_open()?;
        if self.notifying.get() {
            return Err(RuntimeError::Reentrancy {
                key: key.to_string(),
            });
        }

        let change = {
            let mut slots = self.slots.borrow_mut();
            let old = slots.get(key).cloned();
            if matches!(&old, Some(slot) if slot.value == value) {
                return Ok(false);
            }
            let version = old.as_ref().map_or(0, |slot| slot.version) + 1;
            slots.insert(
                key.to_string(),
                Slot {
                    value: value.clone(),
                    version,
                },
            );
            VarChange {
                key: key.to_string(),
                old: old.map(|slot| slot.value),
                new: value,
                version,
            }
        };
        tracing::trace!(key, version = change.version, value = %change.new, "variable changed");

        self.notifying.set(true);
        let _guard = NotifyGuard(&self.notifying);
        self.listeners.emit(&change);
        Ok(true)
    }

    /// True while subscribers are being notified.
    pub fn is_notifying(&self) -> bool {
        self.notifying.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&VarChange) + 'static,
    ) -> Result<SubscriptionId, RuntimeError> {
        self.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    /// True once the owning session has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn ensure_open(&self) -> Result<(), RuntimeError> {
        if self.closed.get() {
            return Err(RuntimeError::SessionClosed);
        }
        Ok(())
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Current values of every set key, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.slots
            .borrow()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Drop all values and subscribers without notifying anyone, and refuse
    /// further writes.
    pub(crate) fn close(&self) {
        self.closed.set(true);
        self.slots.borrow_mut().clear();
        self.listeners.clear();
    }
}

impl Lookup for VariableStore {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

impl Lookup for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
            .field("values", &self.snapshot())
            .field("subscribers", &self.listeners.len())
            .field("closed", &self.closed.get())
            .finish()
    }
}
