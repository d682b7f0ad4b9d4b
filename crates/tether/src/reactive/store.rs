//! Instrumentation of the data tree.

use rustc_hash::FxHashSet;

use crate::data::{DataNode, Value};

/// Owner of the root data node; makes the tree reactive on construction.
#[derive(Clone, Debug)]
pub struct ReactiveStore {
    root: DataNode,
}

impl ReactiveStore {
    pub fn new(root: DataNode) -> Self {
        instrument(&root);
        Self { root }
    }

    pub fn root(&self) -> &DataNode {
        &self.root
    }

    /// Make every field currently present on `node` (and below) reactive.
    ///
    /// Fields that already have a registry keep it, so bindings depending on
    /// them stay subscribed.
    pub fn instrument(&self, node: &DataNode) {
        instrument(node);
    }

    /// Make a single field reactive, typically one added after construction.
    /// Returns `false` when the field does not exist.
    pub fn instrument_field(&self, node: &DataNode, key: &str) -> bool {
        match node.instrument_field(key) {
            Some(value) => {
                instrument_value(&value);
                true
            }
            None => false,
        }
    }
}

/// Recursively instrument `node`; shared or cyclic sub-trees are visited once.
pub fn instrument(node: &DataNode) {
    let mut visited = FxHashSet::default();
    instrument_node(node, &mut visited);
}

/// Instrument the contents of a container value. Primitives are left alone.
pub(crate) fn instrument_value(value: &Value) {
    let mut visited = FxHashSet::default();
    instrument_nested(value, &mut visited);
}

fn instrument_node(node: &DataNode, visited: &mut FxHashSet<usize>) {
    if !visited.insert(node.id()) {
        return;
    }
    for nested in node.instrument_fields() {
        instrument_nested(&nested, visited);
    }
}

fn instrument_nested(value: &Value, visited: &mut FxHashSet<usize>) {
    match value {
        Value::Node(node) => instrument_node(node, visited),
        Value::List(list) => {
            if !visited.insert(list.id()) {
                return;
            }
            for nested in list.instrument_items() {
                instrument_nested(&nested, visited);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataList;
    use std::rc::Rc;

    #[test]
    fn instruments_nested_nodes_and_lists() {
        let inner = DataNode::new().with("e", 1);
        let list = DataList::from_values([Value::from(inner.clone()), Value::from(2)]);
        let root = DataNode::new()
            .with("a", 1)
            .with("d", DataNode::new().with("list", list.clone()));
        let store = ReactiveStore::new(root.clone());

        assert!(store.root().is_reactive("a"));
        assert!(root.is_reactive("d"));
        let d = root.peek("d").unwrap();
        assert!(d.as_node().unwrap().is_reactive("list"));
        assert!(list.is_reactive(0));
        assert!(list.is_reactive(1));
        assert!(inner.is_reactive("e"));
    }

    #[test]
    fn repeated_instrumentation_keeps_registries() {
        let root = DataNode::new().with("a", 1);
        let store = ReactiveStore::new(root.clone());
        let registry = root.registry("a").unwrap();
        store.instrument(&root);
        assert!(Rc::ptr_eq(&registry, &root.registry("a").unwrap()));
    }

    #[test]
    fn fields_added_later_need_explicit_instrumentation() {
        let root = DataNode::new().with("a", 1);
        let store = ReactiveStore::new(root.clone());
        root.set("late", 2).unwrap();
        assert!(!root.is_reactive("late"));
        assert!(store.instrument_field(&root, "late"));
        assert!(root.is_reactive("late"));
        assert!(!store.instrument_field(&root, "missing"));
    }

    #[test]
    fn cyclic_data_is_visited_once() {
        let root = DataNode::new().with("a", 1);
        root.set("me", root.clone()).unwrap();
        instrument(&root);
        assert!(root.is_reactive("me"));
    }

    #[test]
    fn values_written_into_reactive_fields_are_instrumented() {
        let root = DataNode::new().with("user", DataNode::new().with("name", "a"));
        instrument(&root);
        let replacement = DataNode::new().with("name", "b");
        root.set("user", replacement.clone()).unwrap();
        assert!(replacement.is_reactive("name"));
    }
}
