use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

use super::Value;
use crate::error::{Error, Result};
use crate::reactive::{DependencyRegistry, store, tracking};

/// Storage cell for one field or list element.
///
/// A slot without a registry behaves like plain storage. Instrumentation
/// attaches a registry exactly once; afterwards reads are tracked and writes
/// notify.
#[derive(Default)]
pub struct Slot {
    value: Value,
    registry: Option<Rc<DependencyRegistry>>,
}

impl Slot {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            registry: None,
        }
    }

    pub fn is_reactive(&self) -> bool {
        self.registry.is_some()
    }

    pub fn registry(&self) -> Option<&Rc<DependencyRegistry>> {
        self.registry.as_ref()
    }

    pub fn peek(&self) -> &Value {
        &self.value
    }

    /// Read the value, registering the active observer (if any) as a dependent.
    pub(crate) fn read(&self) -> Value {
        if let Some(registry) = &self.registry {
            tracking::track(registry);
        }
        self.value.clone()
    }

    /// Store a value and hand back the registry that has to be notified.
    pub(crate) fn replace(&mut self, value: Value) -> Option<Rc<DependencyRegistry>> {
        self.value = value;
        self.registry.clone()
    }

    /// Attach a registry unless one exists already. Returns `true` when a
    /// registry was created.
    pub(crate) fn instrument(&mut self) -> bool {
        if self.registry.is_some() {
            return false;
        }
        self.registry = Some(Rc::new(DependencyRegistry::new()));
        true
    }

    fn nested(&self) -> Option<Value> {
        matches!(self.value, Value::Node(_) | Value::List(_)).then(|| self.value.clone())
    }
}

/// A shared, insertion-ordered mapping from field names to values.
#[derive(Clone, Default)]
pub struct DataNode {
    fields: Rc<RefCell<IndexMap<String, Slot>>>,
}

impl DataNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), Slot::new(value.into())))
            .collect();
        Self {
            fields: Rc::new(RefCell::new(fields)),
        }
    }

    /// Builder-style field insertion for constructing data before it is bound.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .borrow_mut()
            .insert(key.into(), Slot::new(value.into()));
        self
    }

    /// Tracked read.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.borrow().get(key).map(Slot::read)
    }

    /// Untracked read.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.fields.borrow().get(key).map(|slot| slot.peek().clone())
    }

    /// Write a field and synchronously notify its dependents.
    ///
    /// Writing a key that does not exist yet adds a plain, non-reactive field.
    /// The value is stored even when a dependent fails; the first failure is
    /// returned and the remaining dependents of this write are not updated.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if self.is_reactive(key) {
            store::instrument_value(&value);
        }
        let registry = {
            let mut fields = self.fields.borrow_mut();
            match fields.get_mut(key) {
                Some(slot) => slot.replace(value),
                None => {
                    fields.insert(key.to_owned(), Slot::new(value));
                    None
                }
            }
        };
        match registry {
            Some(registry) => {
                log::trace!("Field '{key}' changed, notifying {} dependents", registry.len());
                registry.notify_all()
            }
            None => Ok(()),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.borrow().contains_key(key)
    }

    /// Untracked snapshot of every field, in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.fields
            .borrow()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.peek().clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    pub fn is_reactive(&self, key: &str) -> bool {
        self.fields
            .borrow()
            .get(key)
            .is_some_and(Slot::is_reactive)
    }

    pub fn registry(&self, key: &str) -> Option<Rc<DependencyRegistry>> {
        self.fields.borrow().get(key)?.registry().cloned()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.fields, &other.fields)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.fields) as usize
    }

    /// Instrument every present field; returns the nested containers found.
    pub(crate) fn instrument_fields(&self) -> Vec<Value> {
        let mut fields = self.fields.borrow_mut();
        let mut created = 0;
        let nested = fields
            .values_mut()
            .filter_map(|slot| {
                if slot.instrument() {
                    created += 1;
                }
                slot.nested()
            })
            .collect();
        log::trace!("Instrumented {created} new fields of {} total", fields.len());
        nested
    }

    /// Instrument one field; returns its value when the field exists.
    pub(crate) fn instrument_field(&self, key: &str) -> Option<Value> {
        let mut fields = self.fields.borrow_mut();
        let slot = fields.get_mut(key)?;
        slot.instrument();
        Some(slot.peek().clone())
    }
}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Node(self.clone()), f)
    }
}

impl Serialize for DataNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::Node(self.clone()).serialize(serializer)
    }
}

/// A shared, ordered sequence of values.
///
/// Element reads and writes through existing indices are reactive once
/// instrumented. Structural changes (`push`) are not observed.
#[derive(Clone, Default)]
pub struct DataList {
    items: Rc<RefCell<Vec<Slot>>>,
}

impl DataList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let items = values
            .into_iter()
            .map(|value| Slot::new(value.into()))
            .collect();
        Self {
            items: Rc::new(RefCell::new(items)),
        }
    }

    /// Tracked read.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).map(Slot::read)
    }

    /// Untracked read.
    pub fn peek(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).map(|slot| slot.peek().clone())
    }

    pub fn peek_all(&self) -> Vec<Value> {
        self.items
            .borrow()
            .iter()
            .map(|slot| slot.peek().clone())
            .collect()
    }

    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if self.is_reactive(index) {
            store::instrument_value(&value);
        }
        let registry = {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(Error::IndexOutOfRange { index, len })?;
            slot.replace(value)
        };
        match registry {
            Some(registry) => registry.notify_all(),
            None => Ok(()),
        }
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.items.borrow_mut().push(Slot::new(value.into()));
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn is_reactive(&self, index: usize) -> bool {
        self.items
            .borrow()
            .get(index)
            .is_some_and(Slot::is_reactive)
    }

    pub fn registry(&self, index: usize) -> Option<Rc<DependencyRegistry>> {
        self.items.borrow().get(index)?.registry().cloned()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.items) as usize
    }

    pub(crate) fn instrument_items(&self) -> Vec<Value> {
        self.items
            .borrow_mut()
            .iter_mut()
            .filter_map(|slot| {
                slot.instrument();
                slot.nested()
            })
            .collect()
    }
}

impl fmt::Debug for DataList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::List(self.clone()), f)
    }
}

impl Serialize for DataList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::List(self.clone()).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_store_without_registries() {
        let node = DataNode::new().with("a", 1);
        assert!(!node.is_reactive("a"));
        node.set("a", 2).unwrap();
        node.set("b", "new").unwrap();
        assert_eq!(node.peek("a"), Some(Value::from(2)));
        assert_eq!(node.keys(), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn clones_alias_the_same_node() {
        let node = DataNode::new().with("a", 1);
        let alias = node.clone();
        alias.set("a", 5).unwrap();
        assert_eq!(node.peek("a"), Some(Value::from(5)));
        assert!(node.ptr_eq(&alias));
        assert!(!node.ptr_eq(&DataNode::new()));
    }

    #[test]
    fn list_set_rejects_out_of_range() {
        let list = DataList::from_values([1, 2]);
        assert!(matches!(
            list.set(2, 3),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
        list.push(3);
        assert_eq!(list.len(), 3);
        assert!(!list.is_reactive(2));
    }
}
