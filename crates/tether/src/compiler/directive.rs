/// Prefix shared by the long directive forms (`m-text`, `m-bind`, `m-model`).
pub const DIRECTIVE_PREFIX: &str = "m-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `m-text`: the expression becomes the element's text content.
    Text,
    /// `m-bind[:attr]` or `:attr`: one-way property binding.
    Bind,
    /// `m-model[:attr]` or `%attr`: property binding plus input write-back.
    Model,
    /// `@event`: method dispatch.
    Event,
}

/// One recognized directive attribute.
///
/// `target` is the property (bind, model) or event name, `None` when the
/// directive uses its default property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveBindingSpec {
    pub kind: DirectiveKind,
    pub target: Option<String>,
    pub expression: String,
}

impl DirectiveBindingSpec {
    /// Recognize the attribute `name="value"`. Returns `None` for ordinary
    /// attributes and for unknown `m-` directives.
    pub fn parse(name: &str, value: &str) -> Option<Self> {
        let (kind, target) = if let Some(directive) = name.strip_prefix(DIRECTIVE_PREFIX) {
            let (directive, target) = split_target(directive);
            let kind = match directive {
                "text" if target.is_none() => DirectiveKind::Text,
                "bind" => DirectiveKind::Bind,
                "model" => DirectiveKind::Model,
                _ => return None,
            };
            (kind, target)
        } else if let Some(target) = name.strip_prefix(':') {
            (DirectiveKind::Bind, non_empty(target))
        } else if let Some(target) = name.strip_prefix('%') {
            (DirectiveKind::Model, non_empty(target))
        } else if let Some(event) = name.strip_prefix('@') {
            (DirectiveKind::Event, Some(non_empty(event)?))
        } else {
            return None;
        };
        Some(Self {
            kind,
            target,
            expression: value.to_owned(),
        })
    }
}

fn split_target(directive: &str) -> (&str, Option<String>) {
    match directive.split_once(':') {
        Some((directive, target)) => (directive, non_empty(target)),
        None => (directive, None),
    }
}

fn non_empty(target: &str) -> Option<String> {
    (!target.is_empty()).then(|| target.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: DirectiveKind, target: Option<&str>, expression: &str) -> DirectiveBindingSpec {
        DirectiveBindingSpec {
            kind,
            target: target.map(str::to_owned),
            expression: expression.to_owned(),
        }
    }

    #[test]
    fn long_forms() {
        use DirectiveKind::*;
        assert_eq!(DirectiveBindingSpec::parse("m-text", "a"), Some(spec(Text, None, "a")));
        assert_eq!(DirectiveBindingSpec::parse("m-bind", "a"), Some(spec(Bind, None, "a")));
        assert_eq!(
            DirectiveBindingSpec::parse("m-bind:title", "a"),
            Some(spec(Bind, Some("title"), "a"))
        );
        assert_eq!(DirectiveBindingSpec::parse("m-model", "a"), Some(spec(Model, None, "a")));
        assert_eq!(
            DirectiveBindingSpec::parse("m-model:checked", "done"),
            Some(spec(Model, Some("checked"), "done"))
        );
        assert_eq!(DirectiveBindingSpec::parse("m-bind:", "a"), Some(spec(Bind, None, "a")));
    }

    #[test]
    fn shorthands() {
        use DirectiveKind::*;
        assert_eq!(DirectiveBindingSpec::parse(":id", "a"), Some(spec(Bind, Some("id"), "a")));
        assert_eq!(
            DirectiveBindingSpec::parse("%value", "b"),
            Some(spec(Model, Some("value"), "b"))
        );
        assert_eq!(
            DirectiveBindingSpec::parse("@click", "incr"),
            Some(spec(Event, Some("click"), "incr"))
        );
    }

    #[test]
    fn ordinary_and_unknown_attributes() {
        for name in ["id", "class", "m-show", "m-text:x", "@", "data-m-text"] {
            assert_eq!(DirectiveBindingSpec::parse(name, "a"), None, "{name}");
        }
    }
}
