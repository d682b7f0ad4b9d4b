//! The UI tree the compiler walks and bindings write into.
//!
//! The engine never builds or mounts nodes itself; it only reads attributes
//! and text, writes properties and text, and subscribes to events through a
//! [`Platform`]. [`MemoryDom`] is the in-memory implementation.

use std::fmt;
use std::rc::Rc;

use crate::data::Value;
use crate::error::Result;

mod memory;
pub use memory::{MemoryDom, NodeId};

/// Property written by `m-bind`/`m-model` when no attribute is named.
pub const PRIMARY_VALUE_SLOT: &str = "value";

/// Event a two-way binding listens to for write-back.
pub const INPUT_EVENT: &str = "input";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

#[derive(Debug, Clone)]
pub struct Event<N> {
    pub name: String,
    pub target: N,
}

pub type Listener<N> = Rc<dyn Fn(&Event<N>) -> Result<()>>;

pub trait Platform: 'static {
    type Node: Clone + fmt::Debug + 'static;

    /// First element matching `selector`, in document order.
    fn query(&self, selector: &str) -> Option<Self::Node>;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Attribute name/value pairs in document order. Empty for non-elements.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    fn remove_attribute(&self, node: &Self::Node, name: &str);

    fn text_content(&self, node: &Self::Node) -> String;

    /// Replace the text of a node; on elements this replaces all children.
    fn set_text_content(&self, node: &Self::Node, text: &str);

    fn property(&self, node: &Self::Node, name: &str) -> Value;

    fn set_property(&self, node: &Self::Node, name: &str, value: Value);

    fn add_event_listener(&self, node: &Self::Node, event: &str, listener: Listener<Self::Node>);
}
