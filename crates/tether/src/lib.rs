//! Reactive data bindings between a data tree and a UI tree.
//!
//! Markup directives (`m-text`, `m-bind`, `m-model`, `@event` and `{{ }}`
//! interpolation) are compiled once into bindings. Each binding discovers
//! the data fields it depends on while it evaluates, and every write to one
//! of those fields re-evaluates it synchronously.
//!
//! ```text
//! ViewModel::new(options, platform)
//!   ├── ReactiveStore::new(data)    instruments every field
//!   └── Compiler::compile(mount)    directives -> Bindings / listeners
//! ```

pub mod compiler;
pub mod context;
pub mod data;
pub mod error;
pub mod expression;
pub mod platform;
pub mod reactive;
pub mod view_model;

pub use compiler::Compiler;
pub use context::{Context, Method, Methods};
pub use data::{DataList, DataNode, Value};
pub use error::{Error, Result};
pub use expression::Expression;
pub use platform::{MemoryDom, NodeId, Platform};
pub use reactive::{Binding, ReactiveStore};
pub use view_model::{Options, ViewModel};
