use std::cmp::Ordering;

use super::{BinaryOperator, Expression, Literal, LogicalOperator, TemplatePart, UnaryOperator};
use crate::context::Context;
use crate::data::Value;
use crate::error::{Error, Result};
use crate::reactive::tracking;

const BUILTINS: [&str; 3] = ["String", "Number", "Boolean"];

/// Evaluate `expression` against `context`.
///
/// Field reads go through the data slots, so while a binding holds the
/// observer slot every field touched here becomes one of its dependencies.
pub fn evaluate(expression: &Expression, context: &Context) -> Result<Value> {
    match expression {
        Expression::Literal(literal) => Ok(literal_to_value(literal)),
        Expression::Identifier(name) => resolve_identifier(name, context),
        Expression::Member { target, name } => {
            let target = evaluate(target, context)?;
            get_member(&target, name)
        }
        Expression::Index { target, index } => {
            let target = evaluate(target, context)?;
            let index = evaluate(index, context)?;
            get_index(&target, &index)
        }
        Expression::Call { callee, arguments } => {
            let Expression::Identifier(name) = callee.as_ref() else {
                return Err(Error::type_error("call", callee.to_string()));
            };
            let arguments = arguments
                .iter()
                .map(|argument| evaluate(argument, context))
                .collect::<Result<Vec<_>>>()?;
            call(name, &arguments, context)
        }
        Expression::Unary { operator, operand } => {
            let operand = evaluate(operand, context)?;
            match operator {
                UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),
                UnaryOperator::Negate => Ok(Value::Number(-to_number(&operand, "negate")?)),
                UnaryOperator::Plus => Ok(Value::Number(to_number(&operand, "convert to a number")?)),
            }
        }
        Expression::Logical {
            operator,
            left,
            right,
        } => {
            let left = evaluate(left, context)?;
            match (operator, left.is_truthy()) {
                (LogicalOperator::And, true) | (LogicalOperator::Or, false) => {
                    evaluate(right, context)
                }
                _ => Ok(left),
            }
        }
        Expression::Binary {
            operator,
            left,
            right,
        } => {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            binary(*operator, &left, &right)
        }
        Expression::Conditional {
            condition,
            consequent,
            alternative,
        } => {
            if evaluate(condition, context)?.is_truthy() {
                evaluate(consequent, context)
            } else {
                evaluate(alternative, context)
            }
        }
        Expression::Interpolation { parts } => {
            let mut text = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text(literal) => text.push_str(literal),
                    TemplatePart::Expression(expression) => {
                        text.push_str(&evaluate(expression, context)?.to_text());
                    }
                }
            }
            Ok(Value::from(text))
        }
    }
}

/// Evaluate without registering dependencies, even inside a binding.
pub fn evaluate_untracked(expression: &Expression, context: &Context) -> Result<Value> {
    tracking::untracked(|| evaluate(expression, context))
}

fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(value) => Value::Bool(*value),
        Literal::Number(number) => Value::Number(*number),
        Literal::Text(text) => Value::text(text.as_str()),
    }
}

fn resolve_identifier(name: &str, context: &Context) -> Result<Value> {
    if let Some(value) = context.data().get(name) {
        return Ok(value);
    }
    if context.methods().contains(name) || BUILTINS.contains(&name) {
        return Err(Error::type_error("use as a value the function", format!("'{name}'")));
    }
    Err(Error::UnknownIdentifier(name.to_owned()))
}

fn call(name: &str, arguments: &[Value], context: &Context) -> Result<Value> {
    if context.data().contains_key(name) {
        return Err(Error::type_error("call", format!("'{name}', it is not a method")));
    }
    if context.methods().contains(name) {
        return context.call(name, arguments);
    }
    let first = arguments.first();
    match name {
        "String" => Ok(Value::from(first.map_or_else(String::new, Value::to_text))),
        "Number" => Ok(Value::Number(
            first.map_or(Some(0.0), Value::to_number).unwrap_or(f64::NAN),
        )),
        "Boolean" => Ok(Value::Bool(first.is_some_and(Value::is_truthy))),
        _ => Err(Error::UnknownMethod(name.to_owned())),
    }
}

fn get_member(target: &Value, name: &str) -> Result<Value> {
    match target {
        Value::Node(node) => Ok(node.get(name).unwrap_or_default()),
        Value::List(list) if name == "length" => Ok(Value::from(list.len() as i64)),
        Value::Text(text) if name == "length" => {
            Ok(Value::from(text.encode_utf16().count() as i64))
        }
        Value::Null => Err(Error::type_error(
            format!("read property '{name}' of"),
            "null",
        )),
        _ => Ok(Value::Null),
    }
}

fn get_index(target: &Value, index: &Value) -> Result<Value> {
    match target {
        Value::List(list) => Ok(list_position(index)
            .and_then(|position| list.get(position))
            .unwrap_or_default()),
        // UTF-16 units, like `.length`; half of a surrogate pair reads as U+FFFD.
        Value::Text(text) => Ok(list_position(index)
            .and_then(|position| text.encode_utf16().nth(position))
            .map(|unit| Value::from(String::from_utf16_lossy(&[unit])))
            .unwrap_or_default()),
        Value::Null => Err(Error::type_error(
            format!("read property '{}' of", index.to_text()),
            "null",
        )),
        target => get_member(target, &index.to_text()),
    }
}

fn list_position(index: &Value) -> Option<usize> {
    let number = index.to_number()?;
    (number >= 0.0 && number.fract() == 0.0).then_some(number as usize)
}

fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    use BinaryOperator::*;
    let operation = operator.symbol();
    let value = match operator {
        Add if is_textual(left) || is_textual(right) => {
            Value::from(left.to_text() + &right.to_text())
        }
        Add => Value::Number(to_number(left, operation)? + to_number(right, operation)?),
        Subtract => Value::Number(to_number(left, operation)? - to_number(right, operation)?),
        Multiply => Value::Number(to_number(left, operation)? * to_number(right, operation)?),
        Divide => Value::Number(to_number(left, operation)? / to_number(right, operation)?),
        Remainder => Value::Number(to_number(left, operation)? % to_number(right, operation)?),
        Less => Value::Bool(compare(left, right, operation)? == Some(Ordering::Less)),
        LessOrEqual => Value::Bool(matches!(
            compare(left, right, operation)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        Greater => Value::Bool(compare(left, right, operation)? == Some(Ordering::Greater)),
        GreaterOrEqual => Value::Bool(matches!(
            compare(left, right, operation)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
        Equal => Value::Bool(left.loose_eq(right)),
        NotEqual => Value::Bool(!left.loose_eq(right)),
        StrictEqual => Value::Bool(left.strict_eq(right)),
        StrictNotEqual => Value::Bool(!left.strict_eq(right)),
    };
    Ok(value)
}

/// Operands that turn `+` into concatenation.
fn is_textual(value: &Value) -> bool {
    matches!(value, Value::Text(_) | Value::Node(_) | Value::List(_))
}

/// Text compares with text lexicographically, everything else numerically.
/// `None` means unordered (a NaN was involved).
fn compare(left: &Value, right: &Value, operation: &str) -> Result<Option<Ordering>> {
    if let (Value::Text(left), Value::Text(right)) = (left, right) {
        return Ok(Some(left.cmp(right)));
    }
    Ok(to_number(left, operation)?.partial_cmp(&to_number(right, operation)?))
}

fn to_number(value: &Value, operation: &str) -> Result<f64> {
    value.to_number().ok_or_else(|| {
        Error::type_error(
            format!("apply '{operation}' to"),
            format!("{} `{value}`", value.type_name()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Methods;
    use crate::data::{DataList, DataNode};

    fn context() -> Context {
        let mut methods = Methods::new();
        methods.insert("double", |_: &Context, arguments: &[Value]| {
            let number = arguments.first().and_then(Value::as_number).unwrap_or(0.0);
            Ok(Value::Number(number * 2.0))
        });
        let data = DataNode::new()
            .with("a", 1)
            .with("b", 2)
            .with("name", "Ada")
            .with("empty", "")
            .with("nothing", Value::Null)
            .with("user", DataNode::new().with("first", "Grace"))
            .with("tags", DataList::from_values(["x", "y"]));
        Context::new(data, methods)
    }

    fn eval(source: &str) -> Result<Value> {
        evaluate(&Expression::parse(source)?, &context())
    }

    fn eval_text(source: &str) -> String {
        eval(source).unwrap().to_text()
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(eval("a + b * 3").unwrap(), Value::from(7));
        assert_eq!(eval("(a + b) * 3").unwrap(), Value::from(9));
        assert_eq!(eval("7 % 4 - -1").unwrap(), Value::from(4));
        assert_eq!(eval_text("name + a + b"), "Ada12");
        assert_eq!(eval_text("a + b + name"), "3Ada");
        assert_eq!(eval_text("1 / 0"), "Infinity");
        assert_eq!(eval("true + 1").unwrap(), Value::from(2));
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(eval("a < b && b <= 2").unwrap(), Value::from(true));
        assert_eq!(eval("'abc' < 'abd'").unwrap(), Value::from(true));
        assert_eq!(eval("'2' == 2").unwrap(), Value::from(true));
        assert_eq!(eval("'2' === 2").unwrap(), Value::from(false));
        assert_eq!(eval("nothing == undefined").unwrap(), Value::from(true));
        assert_eq!(eval("nothing != 0").unwrap(), Value::from(true));
    }

    #[test]
    fn logical_operators_return_the_deciding_operand() {
        assert_eq!(eval("empty || name").unwrap(), Value::from("Ada"));
        assert_eq!(eval("a && name").unwrap(), Value::from("Ada"));
        assert_eq!(eval("nothing && missing").unwrap(), Value::Null);
        assert_eq!(eval("name || missing").unwrap(), Value::from("Ada"));
        assert_eq!(eval("!empty").unwrap(), Value::from(true));
    }

    #[test]
    fn members_and_indexes() {
        assert_eq!(eval("user.first").unwrap(), Value::from("Grace"));
        assert_eq!(eval("user['first']").unwrap(), Value::from("Grace"));
        assert_eq!(eval("user.missing").unwrap(), Value::Null);
        assert_eq!(eval("tags[1]").unwrap(), Value::from("y"));
        assert_eq!(eval("tags[5]").unwrap(), Value::Null);
        assert_eq!(eval("tags.length + name.length").unwrap(), Value::from(5));
        assert_eq!(eval("name[0]").unwrap(), Value::from("A"));
        assert_eq!(eval("'a\u{1F600}b'.length").unwrap(), Value::from(4));
        assert_eq!(eval("'a\u{1F600}b'[3]").unwrap(), Value::from("b"));
        assert_eq!(eval("'a\u{1F600}b'[1]").unwrap(), Value::from("\u{FFFD}"));
        assert_eq!(eval("'\u{e9}t\u{e9}'[2]").unwrap(), Value::from("\u{e9}"));
        assert_eq!(eval_text("tags"), "x,y");
        assert!(matches!(eval("nothing.field"), Err(Error::Type { .. })));
    }

    #[test]
    fn calls_and_builtins() {
        assert_eq!(eval("double(b + 1)").unwrap(), Value::from(6));
        assert_eq!(eval("String(a) + String(b)").unwrap(), Value::from("12"));
        assert_eq!(eval("Number('4') + 1").unwrap(), Value::from(5));
        assert_eq!(eval_text("Number('four')"), "NaN");
        assert_eq!(eval("Boolean(empty)").unwrap(), Value::from(false));
        assert!(matches!(eval("nope()"), Err(Error::UnknownMethod(name)) if name == "nope"));
        assert!(matches!(eval("a()"), Err(Error::Type { .. })));
        assert!(matches!(eval("user.first()"), Err(Error::Type { .. })));
    }

    #[test]
    fn identifiers_resolve_to_fields_only() {
        assert!(matches!(eval("missing"), Err(Error::UnknownIdentifier(name)) if name == "missing"));
        assert!(matches!(eval("double"), Err(Error::Type { .. })));
        assert!(matches!(eval("-name"), Err(Error::Type { .. })));
    }

    #[test]
    fn conditional_evaluates_one_branch() {
        assert_eq!(eval("a > b ? missing : name").unwrap(), Value::from("Ada"));
    }

    #[test]
    fn interpolation_renders_every_part_as_text() {
        let expression = Expression::Interpolation {
            parts: vec![
                TemplatePart::Text("A ".to_owned()),
                TemplatePart::Expression(Expression::parse("a").unwrap()),
                TemplatePart::Text(" B ".to_owned()),
                TemplatePart::Expression(Expression::parse("b").unwrap()),
                TemplatePart::Text(" C".to_owned()),
            ],
        };
        assert_eq!(
            evaluate(&expression, &context()).unwrap(),
            Value::from("A 1 B 2 C")
        );
    }
}
