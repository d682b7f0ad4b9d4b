//! Directive compiler: walks the UI tree once and turns directives into
//! bindings and event listeners.
//!
//! | Attribute               | Effect                                            |
//! |-------------------------|---------------------------------------------------|
//! | `m-text="e"`            | text content follows `e`                          |
//! | `m-bind[:p]`, `:p`      | property `p` (default `value`) follows the result |
//! | `m-model[:p]`, `%p`     | as bind, plus `input` writes `p` back into `e`    |
//! | `@event="m"`/`m(args)`  | `event` calls method `m`                          |
//!
//! Text nodes containing `{{ e }}` segments become interpolation bindings.
//! Processed directive attributes are removed from the element.
//!
//! Directive values never fail the compilation on their own. A value that
//! does not parse renders as literal text, an `m-model` target that is not a
//! field path binds one way only, and an `@event` value that is not a method
//! name or call fails with [`Error::UnknownMethod`] when the event fires.

use std::rc::Rc;

use crate::context::Context;
use crate::data::{DataNode, Value};
use crate::error::{Error, Result};
use crate::expression::{Expression, evaluate_untracked};
use crate::platform::{Event, INPUT_EVENT, NodeKind, PRIMARY_VALUE_SLOT, Platform};
use crate::reactive::Binding;

mod directive;
pub use directive::{DIRECTIVE_PREFIX, DirectiveBindingSpec, DirectiveKind};

mod interpolation;
pub use interpolation::parse_template;

pub struct Compiler<P: Platform> {
    platform: Rc<P>,
    context: Context,
    bindings: Vec<Binding>,
}

impl<P: Platform> Compiler<P> {
    pub fn new(platform: Rc<P>, context: Context) -> Self {
        Self {
            platform,
            context,
            bindings: Vec::new(),
        }
    }

    /// Compile every descendant of `root` (but not `root` itself) and return
    /// the bindings created, in document order.
    ///
    /// Stops at the first failing directive; bindings created before it are
    /// dropped along with the compiler.
    pub fn compile(mut self, root: &P::Node) -> Result<Vec<Binding>> {
        self.compile_children(root)?;
        log::debug!("Compiled {} bindings", self.bindings.len());
        Ok(self.bindings)
    }

    fn compile_children(&mut self, node: &P::Node) -> Result<()> {
        for child in self.platform.children(node) {
            self.compile_node(&child)?;
        }
        Ok(())
    }

    fn compile_node(&mut self, node: &P::Node) -> Result<()> {
        match self.platform.kind(node) {
            NodeKind::Element => self.compile_element(node),
            NodeKind::Text => self.compile_text(node),
            NodeKind::Comment => Ok(()),
        }
    }

    fn compile_element(&mut self, node: &P::Node) -> Result<()> {
        let mut owns_children = false;
        for (name, value) in self.platform.attributes(node) {
            let Some(spec) = DirectiveBindingSpec::parse(&name, &value) else {
                if name.starts_with(DIRECTIVE_PREFIX) {
                    log::warn!("Ignoring unknown directive '{name}' on {node:?}");
                }
                continue;
            };
            log::debug!("Compiling {name}=\"{value}\" on {node:?}");
            let target = spec.target.as_deref();
            match spec.kind {
                DirectiveKind::Text => {
                    self.bind_text(node, &spec.expression)?;
                    owns_children = true;
                }
                DirectiveKind::Bind => {
                    let property = target.unwrap_or(PRIMARY_VALUE_SLOT);
                    let binding = self.bind_property(node, property, &spec.expression)?;
                    self.bindings.push(binding);
                }
                DirectiveKind::Model => {
                    let property = target.unwrap_or(PRIMARY_VALUE_SLOT);
                    self.bind_model(node, property, &spec.expression)?;
                }
                DirectiveKind::Event => {
                    let event = target.unwrap_or_default();
                    self.listen(node, event, &spec.expression);
                }
            }
            self.platform.remove_attribute(node, &name);
        }
        if owns_children {
            return Ok(());
        }
        self.compile_children(node)
    }

    fn compile_text(&mut self, node: &P::Node) -> Result<()> {
        let text = self.platform.text_content(node);
        let Some(template) = parse_template(&text) else {
            return Ok(());
        };
        let platform = Rc::clone(&self.platform);
        let target = node.clone();
        let binding = Binding::new(text, template, self.context.clone(), move |value| {
            platform.set_text_content(&target, &value.to_text());
            Ok(())
        })?;
        self.bindings.push(binding);
        Ok(())
    }

    fn bind_text(&mut self, node: &P::Node, source: &str) -> Result<()> {
        let platform = Rc::clone(&self.platform);
        let target = node.clone();
        let expression = parse_or_literal(source)?;
        let binding = Binding::new(source, expression, self.context.clone(), move |value| {
            let text = match value {
                Value::Null => String::new(),
                value => value.to_text(),
            };
            platform.set_text_content(&target, &text);
            Ok(())
        })?;
        self.bindings.push(binding);
        Ok(())
    }

    fn bind_property(&self, node: &P::Node, property: &str, source: &str) -> Result<Binding> {
        let expression = parse_or_literal(source)?;
        self.bind_parsed_property(node, property, source, expression)
    }

    fn bind_parsed_property(
        &self,
        node: &P::Node,
        property: &str,
        source: &str,
        expression: Expression,
    ) -> Result<Binding> {
        let platform = Rc::clone(&self.platform);
        let target = node.clone();
        let property = property.to_owned();
        Binding::new(source, expression, self.context.clone(), move |value| {
            platform.set_property(&target, &property, value);
            Ok(())
        })
    }

    /// Bind `property` to the field at `source` and write it back on input.
    fn bind_model(&mut self, node: &P::Node, property: &str, source: &str) -> Result<()> {
        let expression = parse_or_literal(source)?;
        let path = expression
            .as_path()
            .map(|path| path.into_iter().map(str::to_owned).collect::<Vec<_>>());
        let binding = self.bind_parsed_property(node, property, source, expression)?;
        self.bindings.push(binding);
        let Some(path) = path else {
            log::warn!("Model target `{source}` on {node:?} is not a field path, binding one way");
            return Ok(());
        };

        let platform = Rc::downgrade(&self.platform);
        let context = self.context.clone();
        let property = property.to_owned();
        self.platform.add_event_listener(
            node,
            INPUT_EVENT,
            Rc::new(move |event: &Event<P::Node>| {
                let Some(platform) = platform.upgrade() else {
                    return Ok(());
                };
                let value = platform.property(&event.target, &property);
                log::trace!("Writing input back into '{}'", path.join("."));
                assign(context.data(), &path, value)
            }),
        );
        Ok(())
    }

    fn listen(&self, node: &P::Node, event: &str, source: &str) {
        let handler = Handler::parse(source);
        if let Handler::Unresolved(_) = handler {
            log::warn!("Handler `{source}` for '{event}' on {node:?} does not name a method");
        }
        let context = self.context.clone();
        self.platform.add_event_listener(
            node,
            event,
            Rc::new(move |_: &Event<P::Node>| handler.invoke(&context)),
        );
    }
}

/// Parse a directive value; a value that does not parse becomes a text
/// literal of itself.
fn parse_or_literal(source: &str) -> Result<Expression> {
    match Expression::parse(source) {
        Err(Error::Parse { report, .. }) => {
            log::warn!("Rendering `{source}` literally, it does not parse:\n{report}");
            Ok(Expression::text(source))
        }
        parsed => parsed,
    }
}

/// An `@event` value: a method name with optional argument expressions.
#[derive(Debug, Clone)]
enum Handler {
    Method {
        name: String,
        arguments: Vec<Expression>,
    },
    /// Anything else. Resolving it fails when the event fires.
    Unresolved(String),
}

impl Handler {
    fn parse(source: &str) -> Self {
        match Expression::parse(source) {
            Ok(Expression::Identifier(name)) => Self::Method {
                name,
                arguments: Vec::new(),
            },
            Ok(Expression::Call { callee, arguments }) => match *callee {
                Expression::Identifier(name) => Self::Method { name, arguments },
                _ => Self::Unresolved(source.to_owned()),
            },
            _ => Self::Unresolved(source.to_owned()),
        }
    }

    /// Arguments are evaluated now, against the current data, and never
    /// become dependencies.
    fn invoke(&self, context: &Context) -> Result<()> {
        let (name, arguments) = match self {
            Self::Method { name, arguments } => (name, arguments),
            Self::Unresolved(source) => return Err(Error::UnknownMethod(source.clone())),
        };
        let arguments = arguments
            .iter()
            .map(|argument| evaluate_untracked(argument, context))
            .collect::<Result<Vec<_>>>()?;
        log::debug!("Dispatching to method '{name}'");
        context.call(name, &arguments)?;
        Ok(())
    }
}

/// Store `value` at `path` below `root`, walking intermediate nodes untracked.
fn assign(root: &DataNode, path: &[String], value: Value) -> Result<()> {
    let Some((field, parents)) = path.split_last() else {
        return Ok(());
    };
    let mut node = root.clone();
    for parent in parents {
        node = match node.peek(parent) {
            Some(Value::Node(child)) => child,
            other => {
                return Err(Error::type_error(
                    format!("assign '{}' through", path.join(".")),
                    other.map_or("undefined", |value| value.type_name()),
                ));
            }
        };
    }
    node.set(field, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Methods;
    use crate::platform::{MemoryDom, NodeId};
    use crate::reactive::store;

    fn setup(data: DataNode) -> (Rc<MemoryDom>, Context, NodeId) {
        store::instrument(&data);
        let dom = Rc::new(MemoryDom::new());
        let root = dom.element("div");
        dom.append(dom.body(), root);
        (dom, Context::new(data, Methods::new()), root)
    }

    fn child(dom: &MemoryDom, parent: NodeId, attributes: &[(&str, &str)]) -> NodeId {
        let element = dom.element("span");
        for (name, value) in attributes {
            dom.set_attribute(element, name, value);
        }
        dom.append(parent, element);
        element
    }

    #[test]
    fn strips_processed_directives_only() {
        let (dom, context, root) = setup(DataNode::new().with("a", 1));
        let element = child(&dom, root, &[("id", "x"), (":title", "a"), ("m-show", "a")]);
        Compiler::new(dom.clone(), context).compile(&root).unwrap();
        assert!(dom.has_attribute(element, "id"));
        assert!(!dom.has_attribute(element, ":title"));
        assert!(dom.has_attribute(element, "m-show"));
    }

    #[test]
    fn text_directive_owns_the_children() {
        let (dom, context, root) = setup(DataNode::new().with("a", "{{ b }}"));
        let element = child(&dom, root, &[("m-text", "a")]);
        let inner = dom.text("{{ missing }}");
        dom.append(element, inner);
        let bindings = Compiler::new(dom.clone(), context).compile(&root).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(dom.text_content(&element), "{{ b }}");
    }

    #[test]
    fn null_renders_as_empty_text() {
        let (dom, context, root) = setup(DataNode::new().with("a", Value::Null));
        let element = child(&dom, root, &[("m-text", "a")]);
        Compiler::new(dom.clone(), context).compile(&root).unwrap();
        assert_eq!(dom.text_content(&element), "");
    }

    #[test]
    fn unusable_model_targets_bind_one_way() {
        let (dom, context, root) = setup(DataNode::new().with("a", 1));
        let input = child(&dom, root, &[("m-model", "a + 1")]);
        let bindings = Compiler::new(dom.clone(), context.clone())
            .compile(&root)
            .unwrap();

        assert_eq!(bindings.len(), 1);
        assert_eq!(dom.property(&input, "value"), Value::from(2));
        assert_eq!(dom.listener_count(input, "input"), 0);
        context.data().set("a", 5).unwrap();
        assert_eq!(dom.property(&input, "value"), Value::from(6));
    }

    #[test]
    fn handlers_that_name_no_method_fail_when_fired() {
        let (dom, context, root) = setup(DataNode::new().with("a", 1));
        let text = child(&dom, root, &[("m-text", "a")]);
        let sum = child(&dom, root, &[("@click", "a + 1")]);
        let member = child(&dom, root, &[("@click", "obj.go")]);
        let broken = child(&dom, root, &[("@click", "go(")]);
        Compiler::new(dom.clone(), context).compile(&root).unwrap();

        assert_eq!(dom.text_content(&text), "1");
        for (button, source) in [(sum, "a + 1"), (member, "obj.go"), (broken, "go(")] {
            assert!(!dom.has_attribute(button, "@click"));
            assert!(matches!(
                dom.click(button),
                Err(Error::UnknownMethod(name)) if name == source
            ));
        }
    }

    #[test]
    fn unparseable_values_degrade() {
        let (dom, context, root) = setup(DataNode::new().with("a", 1));
        let text = child(&dom, root, &[("m-text", "a +")]);
        let model = child(&dom, root, &[("m-model", "(a")]);
        let bindings = Compiler::new(dom.clone(), context.clone())
            .compile(&root)
            .unwrap();

        assert_eq!(bindings.len(), 2);
        assert_eq!(dom.text_content(&text), "a +");
        assert_eq!(dom.property(&model, "value"), Value::from("(a"));
        assert_eq!(dom.listener_count(model, "input"), 0);
        assert_eq!(context.data().peek("a"), Some(Value::from(1)));
    }

    #[test]
    fn assign_walks_member_paths() {
        let data = DataNode::new().with("user", DataNode::new().with("name", "a"));
        let path = ["user".to_owned(), "name".to_owned()];
        assign(&data, &path, Value::from("b")).unwrap();
        let user = data.peek("user").unwrap();
        assert_eq!(user.as_node().unwrap().peek("name"), Some(Value::from("b")));

        let missing = ["nobody".to_owned(), "name".to_owned()];
        assert!(matches!(
            assign(&data, &missing, Value::Null),
            Err(Error::Type { .. })
        ));
    }
}
