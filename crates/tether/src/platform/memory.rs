use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::{Event, Listener, NodeKind, Platform};
use crate::data::Value;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct NodeData {
    kind: NodeKind,
    // Lowercase tag name for elements, empty otherwise.
    tag: String,
    // Content of text and comment nodes.
    text: String,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, tag: &str, text: &str) -> Self {
        Self {
            kind,
            tag: tag.to_ascii_lowercase(),
            text: text.to_owned(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// An in-memory node tree with attributes, properties and event listeners.
///
/// Nodes live in an arena and are addressed by [`NodeId`]. A `body` element
/// exists from the start; nodes created afterwards stay detached until
/// appended somewhere. Events do not bubble.
///
/// Replacing an element's text content releases the replaced children, and
/// their ids are reused by later nodes.
pub struct MemoryDom {
    nodes: RefCell<Vec<NodeData>>,
    // Released slots, reused before the arena grows.
    free: RefCell<Vec<NodeId>>,
    listeners: RefCell<FxHashMap<(NodeId, String), Vec<Listener<NodeId>>>>,
    body: NodeId,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![NodeData::new(NodeKind::Element, "body", "")]),
            free: RefCell::default(),
            listeners: RefCell::default(),
            body: NodeId(0),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn insert(&self, node: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(id) = self.free.borrow_mut().pop() {
            nodes[id.0] = node;
            return id;
        }
        nodes.push(node);
        NodeId(nodes.len() - 1)
    }

    /// Return a detached subtree and its listeners to the arena.
    fn release(&self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes.borrow_mut()[node.0].children);
        for child in children {
            self.release(child);
        }
        self.listeners
            .borrow_mut()
            .retain(|(target, _), _| *target != node);
        self.free.borrow_mut().push(node);
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len() - self.free.borrow().len()
    }

    pub fn element(&self, tag: &str) -> NodeId {
        self.insert(NodeData::new(NodeKind::Element, tag, ""))
    }

    pub fn text(&self, content: &str) -> NodeId {
        self.insert(NodeData::new(NodeKind::Text, "", content))
    }

    pub fn comment(&self, content: &str) -> NodeId {
        self.insert(NodeData::new(NodeKind::Comment, "", content))
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let mut nodes = self.nodes.borrow_mut();
        nodes[child.0].parent = Some(parent);
        nodes[parent.0].children.push(child);
    }

    fn detach(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .insert(name.to_owned(), value.to_owned());
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0].attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.nodes.borrow()[node.0].attributes.contains_key(name)
    }

    /// Tag name of an element, `None` for text and comment nodes.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        let nodes = self.nodes.borrow();
        let data = &nodes[node.0];
        (data.kind == NodeKind::Element).then(|| data.tag.clone())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[node.0].parent
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.listeners
            .borrow()
            .get(&(node, event.to_owned()))
            .map_or(0, Vec::len)
    }

    /// Run the listeners registered for `event` on `node` in registration
    /// order. The first failing listener stops the dispatch.
    pub fn dispatch(&self, node: NodeId, event: &str) -> Result<()> {
        let listeners = self
            .listeners
            .borrow()
            .get(&(node, event.to_owned()))
            .cloned()
            .unwrap_or_default();
        log::trace!("Dispatching '{event}' on {node} to {} listeners", listeners.len());
        let event = Event {
            name: event.to_owned(),
            target: node,
        };
        for listener in listeners {
            listener(&event)?;
        }
        Ok(())
    }

    pub fn click(&self, node: NodeId) -> Result<()> {
        self.dispatch(node, "click")
    }

    /// Simulate the user typing: set the `value` property, then fire `input`.
    pub fn input(&self, node: NodeId, value: impl Into<Value>) -> Result<()> {
        self.set_property(&node, super::PRIMARY_VALUE_SLOT, value.into());
        self.dispatch(node, super::INPUT_EVENT)
    }

    /// Serialize a subtree back to markup; handy in assertions.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut html = String::new();
        self.write_html(node, &mut html);
        html
    }

    fn write_html(&self, node: NodeId, html: &mut String) {
        let (kind, tag, text, attributes, children) = {
            let nodes = self.nodes.borrow();
            let data = &nodes[node.0];
            (
                data.kind,
                data.tag.clone(),
                data.text.clone(),
                data.attributes.clone(),
                data.children.clone(),
            )
        };
        match kind {
            NodeKind::Text => html.push_str(&text),
            NodeKind::Comment => {
                html.push_str("<!--");
                html.push_str(&text);
                html.push_str("-->");
            }
            NodeKind::Element => {
                html.push('<');
                html.push_str(&tag);
                for (name, value) in &attributes {
                    html.push_str(&format!(" {name}=\"{value}\""));
                }
                html.push('>');
                for child in children {
                    self.write_html(child, html);
                }
                html.push_str(&format!("</{tag}>"));
            }
        }
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let nodes = self.nodes.borrow();
        let data = &nodes[node.0];
        if data.kind != NodeKind::Element {
            return false;
        }
        if let Some(id) = selector.strip_prefix('#') {
            data.attributes.get("id").is_some_and(|value| value == id)
        } else if let Some(class) = selector.strip_prefix('.') {
            data.attributes
                .get("class")
                .is_some_and(|value| value.split_whitespace().any(|name| name == class))
        } else {
            data.tag.eq_ignore_ascii_case(selector)
        }
    }

    fn find(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        if self.matches(node, selector) {
            return Some(node);
        }
        let children = self.nodes.borrow()[node.0].children.clone();
        children
            .into_iter()
            .find_map(|child| self.find(child, selector))
    }
}

impl Platform for MemoryDom {
    type Node = NodeId;

    fn query(&self, selector: &str) -> Option<NodeId> {
        self.find(self.body, selector.trim())
    }

    fn kind(&self, node: &NodeId) -> NodeKind {
        self.nodes.borrow()[node.0].kind
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[node.0].children.clone()
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        self.nodes.borrow()[node.0]
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        self.nodes.borrow_mut()[node.0].attributes.shift_remove(name);
    }

    fn text_content(&self, node: &NodeId) -> String {
        let (kind, text, children) = {
            let nodes = self.nodes.borrow();
            let data = &nodes[node.0];
            (data.kind, data.text.clone(), data.children.clone())
        };
        match kind {
            NodeKind::Element => children
                .iter()
                .filter(|child| self.kind(child) != NodeKind::Comment)
                .map(|child| self.text_content(child))
                .collect(),
            NodeKind::Text | NodeKind::Comment => text,
        }
    }

    fn set_text_content(&self, node: &NodeId, text: &str) {
        if self.kind(node) != NodeKind::Element {
            self.nodes.borrow_mut()[node.0].text = text.to_owned();
            return;
        }
        let children = self.children(node);
        match children.as_slice() {
            [only] if self.kind(only) == NodeKind::Text => {
                self.nodes.borrow_mut()[only.0].text = text.to_owned();
            }
            _ => {
                for child in children {
                    self.detach(child);
                    self.release(child);
                }
                let child = self.text(text);
                self.append(*node, child);
            }
        }
    }

    /// Properties fall back to the attribute of the same name, so an input's
    /// `value` starts out as its `value` attribute.
    fn property(&self, node: &NodeId, name: &str) -> Value {
        let nodes = self.nodes.borrow();
        let data = &nodes[node.0];
        match data.properties.get(name) {
            Some(value) => value.clone(),
            None => data
                .attributes
                .get(name)
                .map_or(Value::Null, |value| Value::text(value.as_str())),
        }
    }

    fn set_property(&self, node: &NodeId, name: &str, value: Value) {
        self.nodes.borrow_mut()[node.0]
            .properties
            .insert(name.to_owned(), value);
    }

    fn add_event_listener(&self, node: &NodeId, event: &str, listener: Listener<NodeId>) {
        self.listeners
            .borrow_mut()
            .entry((*node, event.to_owned()))
            .or_default()
            .push(listener);
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDom")
            .field("nodes", &self.nodes.borrow().len())
            .field("body", &self.outer_html(self.body))
            .finish()
    }
}
