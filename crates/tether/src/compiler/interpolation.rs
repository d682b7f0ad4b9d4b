use crate::expression::{Expression, TemplatePart};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Split `text` into literal runs and `{{ expression }}` segments.
///
/// Segments are matched non-greedily: each `{{` closes at the first `}}`
/// after at least one character, and a segment never spans a line break.
/// A segment whose expression does not parse stays literal, as does an
/// unterminated `{{`. Returns `None` when no segment holds an expression.
pub fn parse_template(text: &str) -> Option<Expression> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut cursor = 0;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find(OPEN) {
        let open = search_from + offset;
        let body_start = open + OPEN.len();
        let Some(body_len) = segment_body_len(&text[body_start..]) else {
            // No segment starts here; retry one character later.
            search_from = open + 1;
            continue;
        };
        let source = &text[body_start..body_start + body_len];
        let close = body_start + body_len + CLOSE.len();
        match Expression::parse(source) {
            Ok(expression) => {
                literal.push_str(&text[cursor..open]);
                if !literal.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut literal)));
                }
                parts.push(TemplatePart::Expression(expression));
            }
            Err(error) => {
                log::warn!("Keeping `{{{{{source}}}}}` as literal text: {error}");
                literal.push_str(&text[cursor..close]);
            }
        }
        cursor = close;
        search_from = close;
    }

    if !parts
        .iter()
        .any(|part| matches!(part, TemplatePart::Expression(_)))
    {
        return None;
    }
    literal.push_str(&text[cursor..]);
    if !literal.is_empty() {
        parts.push(TemplatePart::Text(literal));
    }
    Some(Expression::Interpolation { parts })
}

/// Byte length of the segment body at the start of `rest`, if a closing
/// `}}` follows at least one character without a line break in between.
fn segment_body_len(rest: &str) -> Option<usize> {
    let first = rest.chars().next()?;
    let min_len = first.len_utf8();
    let body_len = min_len + rest[min_len..].find(CLOSE)?;
    (!rest[..body_len].contains(['\n', '\r'])).then_some(body_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(text: &str) -> Vec<TemplatePart> {
        match parse_template(text) {
            Some(Expression::Interpolation { parts }) => parts,
            other => panic!("Expected interpolation for `{text}`, got {other:?}"),
        }
    }

    fn literal(text: &str) -> TemplatePart {
        TemplatePart::Text(text.to_owned())
    }

    fn expression(source: &str) -> TemplatePart {
        TemplatePart::Expression(Expression::parse(source).unwrap())
    }

    #[test]
    fn keeps_literal_runs_between_segments() {
        assert_eq!(
            parts("A {{x}} B {{ y }} C"),
            vec![
                literal("A "),
                expression("x"),
                literal(" B "),
                expression("y"),
                literal(" C"),
            ]
        );
        assert_eq!(parts("{{a}}{{b}}"), vec![expression("a"), expression("b")]);
    }

    #[test]
    fn segments_are_non_greedy() {
        assert_eq!(
            parts("{{ a }} and {{ b }}"),
            vec![expression("a"), literal(" and "), expression("b")]
        );
    }

    #[test]
    fn text_without_segments_is_not_a_template() {
        assert_eq!(parse_template("plain text"), None);
        assert_eq!(parse_template("{{}}"), None);
        assert_eq!(parse_template("open {{ a"), None);
        assert_eq!(parse_template("{{ a\n}}"), None);
    }

    #[test]
    fn malformed_segments_stay_literal() {
        assert_eq!(
            parts("{{ a + }} / {{ b }} / {{ c"),
            vec![literal("{{ a + }} / "), expression("b"), literal(" / {{ c")]
        );
        assert_eq!(parse_template("{{ ) }}"), None);
    }
}
