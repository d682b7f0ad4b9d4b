use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{DataList, DataNode};

/// A value stored in the data tree or produced by an expression.
///
/// Nodes and lists are shared handles: cloning a `Value::Node` aliases the
/// same node, and equality between containers is identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Node(DataNode),
    List(DataList),
}

impl Value {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn number(number: impl Into<f64>) -> Self {
        Self::Number(number.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Node(_) => "object",
            Self::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&DataNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&DataList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::Text(text) => !text.is_empty(),
            Self::Node(_) | Self::List(_) => true,
        }
    }

    /// Numeric coercion used by arithmetic and relational operators.
    ///
    /// Returns `None` for values without a numeric reading (objects, lists,
    /// text that is not a number).
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Self::Null => Some(0.0),
            Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            Self::Number(number) => Some(*number),
            Self::Text(text) => parse_number(text),
            Self::Node(_) | Self::List(_) => None,
        }
    }

    /// Text rendering used by interpolation and string concatenation.
    ///
    /// Reads through containers are untracked. A list nested inside itself
    /// renders as empty text at the point of recursion.
    pub fn to_text(&self) -> String {
        self.text_within(&Ancestors::default())
    }

    fn text_within(&self, ancestors: &Ancestors) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Bool(value) => value.to_string(),
            Self::Number(number) => format_number(*number),
            Self::Text(text) => text.to_string(),
            Self::Node(_) => "[object Object]".to_owned(),
            Self::List(list) => {
                if !ancestors.enter(list.id()) {
                    return String::new();
                }
                let text = list
                    .peek_all()
                    .iter()
                    .map(|item| match item {
                        Self::Null => String::new(),
                        item => item.text_within(ancestors),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                ancestors.leave(list.id());
                text
            }
        }
    }

    /// Same-type comparison without coercion; containers compare by identity.
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Equality with primitive coercion: mixed numbers, booleans and numeric
    /// text compare as numbers.
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => self.is_null() && other.is_null(),
            (Self::Node(_) | Self::List(_), _) | (_, Self::Node(_) | Self::List(_)) => {
                self.strict_eq(other)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => match (self.to_number(), other.to_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// JSON copy of the value; cyclic data converts to `null`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Numeric reading of text: decimal literals with an optional exponent,
/// `0x`/`0o`/`0b` integers and `Infinity`. Blank text reads as zero.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0.0);
    }
    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if !digits.bytes().all(|byte| byte.is_ascii_alphanumeric()) {
            return None;
        }
        return u64::from_str_radix(digits, radix).ok().map(|number| number as f64);
    }
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned == "Infinity" {
        let infinity = if text.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
        return Some(infinity);
    }
    // Keeps spellings like `inf` and `NaN` out of the float parser.
    let decimal = unsigned
        .bytes()
        .all(|byte| byte.is_ascii_digit() || matches!(byte, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal {
        return None;
    }
    text.parse().ok()
}

/// Shortest round-trip rendering. Magnitudes from 1e21 up and below 1e-6
/// use exponent form (`1e+21`, `1.5e-7`).
pub(crate) fn format_number(number: f64) -> String {
    let magnitude = number.abs();
    if number.is_nan() {
        "NaN".to_owned()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
        let exponential = format!("{number:e}");
        match exponential.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => exponential,
        }
    } else if number.fract() == 0.0 && magnitude < 1e16 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

/// Containers between the root of a traversal and the current value.
/// Meeting one of them again means the data is cyclic.
#[derive(Default)]
struct Ancestors(RefCell<FxHashSet<usize>>);

impl Ancestors {
    fn enter(&self, id: usize) -> bool {
        self.0.borrow_mut().insert(id)
    }

    fn leave(&self, id: usize) {
        self.0.borrow_mut().remove(&id);
    }
}

/// `Debug` over a value that prints `[Circular]` where data refers back to
/// a container being printed.
struct DebugValue<'a> {
    value: &'a Value,
    ancestors: &'a Ancestors,
}

impl DebugValue<'_> {
    fn nested<'b>(&'b self, value: &'b Value) -> DebugValue<'b> {
        DebugValue {
            value,
            ancestors: self.ancestors,
        }
    }

    fn container(
        &self,
        id: usize,
        f: &mut fmt::Formatter<'_>,
        body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
    ) -> fmt::Result {
        if !self.ancestors.enter(id) {
            return f.write_str("[Circular]");
        }
        let result = body(f);
        self.ancestors.leave(id);
        result
    }
}

impl fmt::Debug for DebugValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Null => write!(f, "Null"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Number(number) => write!(f, "Number({})", format_number(*number)),
            Value::Text(text) => write!(f, "Text({text:?})"),
            Value::Node(node) => self.container(node.id(), f, |f| {
                let entries = node.entries();
                f.debug_map()
                    .entries(entries.iter().map(|(key, value)| (key, self.nested(value))))
                    .finish()
            }),
            Value::List(list) => self.container(list.id(), f, |f| {
                let items = list.peek_all();
                f.debug_list()
                    .entries(items.iter().map(|value| self.nested(value)))
                    .finish()
            }),
        }
    }
}

/// `Serialize` over a value that fails on cyclic data instead of recursing
/// forever.
struct SerializeValue<'a> {
    value: &'a Value,
    ancestors: &'a Ancestors,
}

impl SerializeValue<'_> {
    fn nested<'b>(&'b self, value: &'b Value) -> SerializeValue<'b> {
        SerializeValue {
            value,
            ancestors: self.ancestors,
        }
    }

    fn enter<E: serde::ser::Error>(&self, id: usize) -> Result<(), E> {
        if self.ancestors.enter(id) {
            Ok(())
        } else {
            Err(E::custom("cyclic data cannot be serialized"))
        }
    }
}

impl Serialize for SerializeValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Number(number) => serializer.serialize_f64(*number),
            Value::Text(text) => serializer.serialize_str(text),
            Value::Node(node) => {
                self.enter::<S::Error>(node.id())?;
                let entries = node.entries();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    map.serialize_entry(key, &self.nested(value))?;
                }
                self.ancestors.leave(node.id());
                map.end()
            }
            Value::List(list) => {
                self.enter::<S::Error>(list.id())?;
                let items = list.peek_all();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(&self.nested(item))?;
                }
                self.ancestors.leave(list.id());
                seq.end()
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ancestors = Ancestors::default();
        fmt::Debug::fmt(
            &DebugValue {
                value: self,
                ancestors: &ancestors,
            },
            f,
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Self::Number(number.into())
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Self::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl From<DataNode> for Value {
    fn from(node: DataNode) -> Self {
        Self::Node(node)
    }
}

impl From<DataList> for Value {
    fn from(list: DataList) -> Self {
        Self::List(list)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => Self::Number(number.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Self::Text(text.into()),
            serde_json::Value::Array(items) => {
                Self::List(DataList::from_values(items.into_iter().map(Self::from)))
            }
            serde_json::Value::Object(fields) => Self::Node(DataNode::from_fields(
                fields.into_iter().map(|(key, value)| (key, Self::from(value))),
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ancestors = Ancestors::default();
        SerializeValue {
            value: self,
            ancestors: &ancestors,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
