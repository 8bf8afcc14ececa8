//! Field-keyed records with change notification.
//!
//! An `ObservableRecord` maps field names to JSON values.  Writing a value
//! that differs from the current one (per the field's equality rule) stores it
//! and then synchronously calls the field's listeners in registration order,
//! passing `(new, old)`.  Listeners get the record itself, so they can write
//! other fields; nothing guards against listeners that keep triggering each
//! other.

use std::{collections::HashMap, mem};

use serde_json::{Map, Value};

static UNDEFINED: Value = Value::Null;

pub type Listener = Box<dyn FnMut(&mut ObservableRecord, &Value, &Value)>;

pub type EqualsFn = Box<dyn Fn(&Value, &Value) -> bool>;

/// Handle returned on registration, used to remove the listener again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct ObservableRecord {
    values: Map<String, Value>,
    defaults: Map<String, Value>,
    equals: HashMap<String, EqualsFn>,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    // Listeners removed while their field was being dispatched, and therefore
    // not present in `listeners` at the time of removal.
    removed: Vec<ListenerId>,
    next_listener_id: u64,
}

impl ObservableRecord {
    pub fn new(defaults: Map<String, Value>) -> Self {
        Self {
            values: defaults.clone(),
            defaults,
            equals: HashMap::new(),
            listeners: HashMap::new(),
            removed: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// Create a record whose initial values are `defaults` overlaid with
    /// `stored`, e.g. preferences loaded from disk.  No listeners exist yet,
    /// so nothing is notified.
    pub fn with_values(defaults: Map<String, Value>, stored: Map<String, Value>) -> Self {
        let mut record = Self::new(defaults);
        record.values.extend(stored);
        record
    }

    /// Current value of `field`, falling back to its default, then to `null`.
    pub fn get(&self, field: &str) -> &Value {
        self.values
            .get(field)
            .or_else(|| self.defaults.get(field))
            .unwrap_or(&UNDEFINED)
    }

    pub fn default_of(&self, field: &str) -> &Value {
        self.defaults.get(field).unwrap_or(&UNDEFINED)
    }

    /// Store `value` if it differs from the current one and notify listeners.
    /// Returns `true` if the write counted as a change.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        if self.is_equal(field, self.get(field), &value) {
            return false;
        }
        let old = self
            .values
            .insert(field.to_owned(), value.clone())
            .or_else(|| self.defaults.get(field).cloned())
            .unwrap_or(Value::Null);
        self.dispatch(field, &value, &old, None);
        true
    }

    /// Register `listener` and call it right away with the current value (the
    /// previous value passed is `null`).
    pub fn watch<F>(&mut self, field: &str, listener: F) -> ListenerId
    where
        F: FnMut(&mut ObservableRecord, &Value, &Value) + 'static,
    {
        let id = self.add_listener(field, listener);
        let current = self.get(field).clone();
        self.dispatch(field, &current, &Value::Null, Some(id));
        id
    }

    pub fn add_listener<F>(&mut self, field: &str, listener: F) -> ListenerId
    where
        F: FnMut(&mut ObservableRecord, &Value, &Value) + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners
            .entry(field.to_owned())
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, field: &str, id: ListenerId) {
        if let Some(listeners) = self.listeners.get_mut(field) {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            if listeners.len() < before {
                return;
            }
        }
        // Most likely the listener is being dispatched right now.
        self.removed.push(id);
    }

    pub fn set_equals_fn<F>(&mut self, field: &str, equals: F)
    where
        F: Fn(&Value, &Value) -> bool + 'static,
    {
        self.equals.insert(field.to_owned(), Box::new(equals));
    }

    /// Write every default value back.  Returns the fields that changed, in
    /// the order they were written.
    pub fn reset_to_defaults(&mut self) -> Vec<String> {
        let defaults: Vec<(String, Value)> = self
            .defaults
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        defaults
            .into_iter()
            .filter_map(|(field, value)| self.set(&field, value).then_some(field))
            .collect()
    }

    /// All current values, defaults included.
    pub fn to_json(&self) -> Value {
        let mut all = self.defaults.clone();
        all.extend(self.values.clone());
        Value::Object(all)
    }

    fn is_equal(&self, field: &str, current: &Value, value: &Value) -> bool {
        match self.equals.get(field) {
            Some(equals) => equals(current, value),
            None => current == value,
        }
    }

    fn dispatch(&mut self, field: &str, new: &Value, old: &Value, only: Option<ListenerId>) {
        // Listeners are taken out of the map for the duration of the call, so
        // they can borrow the record mutably.  A nested write to the same
        // field therefore does not reach them again.
        let mut dispatching = match self.listeners.get_mut(field) {
            Some(listeners) if !listeners.is_empty() => mem::take(listeners),
            _ => return,
        };
        for (id, listener) in dispatching.iter_mut() {
            if only.is_some_and(|only| only != *id) || self.removed.contains(id) {
                continue;
            }
            listener(self, new, old);
        }
        let dispatched: Vec<ListenerId> = dispatching.iter().map(|(id, _)| *id).collect();
        if let Some(registered_meanwhile) = self.listeners.remove(field) {
            dispatching.extend(registered_meanwhile);
        }
        let removed = &self.removed;
        dispatching.retain(|(id, _)| !removed.contains(id));
        self.removed.retain(|id| !dispatched.contains(id));
        self.listeners.insert(field.to_owned(), dispatching);
    }
}

/// Build a field map from `(name, value)` pairs.
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(field, value)| (field.to_owned(), value))
        .collect()
}
