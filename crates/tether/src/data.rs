//! The data tree bound to the UI.
//!
//! A [`DataNode`] maps field names to [`Value`]s; nested nodes and
//! [`DataList`]s make up the rest of the tree. Every field lives in a
//! [`Slot`]. Once the reactive store has instrumented a slot it owns a
//! dependency registry, and from then on reads register the active observer
//! and writes notify everything that read the field.

mod node;
mod value;

pub use node::{DataList, DataNode, Slot};
pub use value::Value;

pub(crate) use value::format_number;
