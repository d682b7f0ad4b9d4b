//! Binding expressions: AST, parser and evaluator.
//!
//! Source text is lexed into [`Token`]s, then parsed into an [`Expression`]
//! with a pratt parser for the binary operators. Parsing happens once per
//! directive; evaluation walks the tree on every update.

use ariadne::{Config, Label, Report, ReportKind, Source};
use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::fmt;

use crate::data::format_number;
use crate::error::{Error, Result};

mod evaluator;
pub use evaluator::{evaluate, evaluate_untracked};

mod lexer;
pub use lexer::{Token, lexer};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

/// Source id used in rendered parse reports.
const REPORT_SOURCE_ID: &str = "expression";

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Member {
        target: Box<Self>,
        name: String,
    },
    Index {
        target: Box<Self>,
        index: Box<Self>,
    },
    Call {
        callee: Box<Self>,
        arguments: Vec<Self>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Self>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Self>,
        right: Box<Self>,
    },
    /// `&&` and `||`: the right operand is only evaluated when the left one
    /// does not decide the result.
    Logical {
        operator: LogicalOperator,
        left: Box<Self>,
        right: Box<Self>,
    },
    Conditional {
        condition: Box<Self>,
        consequent: Box<Self>,
        alternative: Box<Self>,
    },
    /// Literal text runs and embedded expressions, rendered and concatenated.
    /// Built by the directive compiler from `{{ }}` templates.
    Interpolation {
        parts: Vec<TemplatePart>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expression(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Multiply,
    Divide,
    Remainder,
    Add,
    Subtract,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Remainder => "%",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::StrictEqual => "===",
            Self::StrictNotEqual => "!==",
        }
    }

    /// Binding power in the pratt parser; higher binds tighter.
    fn binding_power(self) -> u16 {
        match self {
            Self::Equal | Self::NotEqual | Self::StrictEqual | Self::StrictNotEqual => 3,
            Self::Less | Self::LessOrEqual | Self::Greater | Self::GreaterOrEqual => 4,
            Self::Add | Self::Subtract => 5,
            Self::Multiply | Self::Divide | Self::Remainder => 6,
        }
    }
}

impl LogicalOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    fn binding_power(self) -> u16 {
        match self {
            Self::Or => 1,
            Self::And => 2,
        }
    }
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Negate => "-",
            Self::Plus => "+",
        }
    }
}

const PREFIX_BINDING_POWER: u16 = 7;
const POSTFIX_BINDING_POWER: u16 = 8;

impl Expression {
    /// Lex and parse `source`.
    ///
    /// On failure the error carries an ariadne report pointing into `source`.
    pub fn parse(source: &str) -> Result<Self> {
        let (tokens, errors) = lexer()
            .then_ignore(end())
            .parse(source)
            .into_output_errors();
        if !errors.is_empty() {
            return Err(report_errors(errors, source));
        }
        let tokens = tokens.unwrap_or_default();
        let (expression, errors) = parser()
            .then_ignore(end())
            .parse(tokens.map(Span::from(source.len()..source.len()), |Spanned { node, span }| {
                (node, span)
            }))
            .into_output_errors();
        match expression {
            Some(expression) if errors.is_empty() => Ok(expression),
            _ => Err(report_errors(errors, source)),
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Literal(Literal::Text(text.into()))
    }

    fn unary(operator: UnaryOperator, operand: Self) -> Self {
        Self::Unary {
            operator,
            operand: Box::new(operand),
        }
    }

    fn binary(operator: BinaryOperator, left: Self, right: Self) -> Self {
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn logical(operator: LogicalOperator, left: Self, right: Self) -> Self {
        Self::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// The field path of a plain identifier or a chain of member accesses,
    /// e.g. `user.address.city`. Anything else is not assignable.
    pub fn as_path(&self) -> Option<Vec<&str>> {
        match self {
            Self::Identifier(name) => Some(vec![name.as_str()]),
            Self::Member { target, name } => {
                let mut path = target.as_path()?;
                path.push(name);
                Some(path)
            }
            _ => None,
        }
    }

    fn binding_power(&self) -> u16 {
        match self {
            Self::Conditional { .. } => 0,
            Self::Binary { operator, .. } => operator.binding_power(),
            Self::Logical { operator, .. } => operator.binding_power(),
            Self::Unary { .. } => PREFIX_BINDING_POWER,
            _ => POSTFIX_BINDING_POWER,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_binding_power: u16) -> fmt::Result {
        if self.binding_power() < min_binding_power {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Identifier(name) => f.write_str(name),
            Self::Member { target, name } => {
                target.fmt_operand(f, POSTFIX_BINDING_POWER)?;
                write!(f, ".{name}")
            }
            Self::Index { target, index } => {
                target.fmt_operand(f, POSTFIX_BINDING_POWER)?;
                write!(f, "[{index}]")
            }
            Self::Call { callee, arguments } => {
                callee.fmt_operand(f, POSTFIX_BINDING_POWER)?;
                f.write_str("(")?;
                for (position, argument) in arguments.iter().enumerate() {
                    if position > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
            Self::Unary { operator, operand } => {
                f.write_str(operator.symbol())?;
                operand.fmt_operand(f, PREFIX_BINDING_POWER)
            }
            Self::Binary {
                operator,
                left,
                right,
            } => fmt_infix(f, left, operator.symbol(), right, operator.binding_power()),
            Self::Logical {
                operator,
                left,
                right,
            } => fmt_infix(f, left, operator.symbol(), right, operator.binding_power()),
            Self::Conditional {
                condition,
                consequent,
                alternative,
            } => {
                condition.fmt_operand(f, 1)?;
                write!(f, " ? {consequent} : {alternative}")
            }
            Self::Interpolation { parts } => {
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => f.write_str(text)?,
                        TemplatePart::Expression(expression) => write!(f, "{{{{ {expression} }}}}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn fmt_infix(
    f: &mut fmt::Formatter<'_>,
    left: &Expression,
    symbol: &str,
    right: &Expression,
    power: u16,
) -> fmt::Result {
    left.fmt_operand(f, power)?;
    write!(f, " {symbol} ")?;
    right.fmt_operand(f, power + 1)
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(number) => f.write_str(&format_number(*number)),
            Self::Text(text) => {
                f.write_str("'")?;
                for character in text.chars() {
                    match character {
                        '\'' => f.write_str("\\'")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        character => write!(f, "{character}")?,
                    }
                }
                f.write_str("'")
            }
        }
    }
}

enum Postfix {
    Member(String),
    Index(Expression),
    Call(Vec<Expression>),
}

pub fn parser<'code, I>()
-> impl Parser<'code, I, Expression, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    recursive(|expression| {
        let bracket_round_open = just(Token::BracketRoundOpen);
        let bracket_round_close = just(Token::BracketRoundClose);
        let bracket_square_open = just(Token::BracketSquareOpen);
        let bracket_square_close = just(Token::BracketSquareClose);

        let identifier = select! { Token::Identifier(identifier) => identifier };

        let literal = select! {
            Token::Number(number) => Literal::Number(number),
            Token::Text(text) => Literal::Text(unescape(text)),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
        }
        .map(Expression::Literal);

        let atom = choice((
            literal,
            identifier.clone().map(Expression::identifier),
            expression
                .clone()
                .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
        ));

        let arguments = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(bracket_round_open, bracket_round_close);

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(identifier)
                .map(|name: &str| Postfix::Member(name.to_owned())),
            expression
                .clone()
                .delimited_by(bracket_square_open, bracket_square_close)
                .map(Postfix::Index),
            arguments.map(Postfix::Call),
        ));

        let access = atom.foldl(postfix.repeated(), |target, postfix| {
            let target = Box::new(target);
            match postfix {
                Postfix::Member(name) => Expression::Member { target, name },
                Postfix::Index(index) => Expression::Index {
                    target,
                    index: Box::new(index),
                },
                Postfix::Call(arguments) => Expression::Call {
                    callee: target,
                    arguments,
                },
            }
        });

        let operation = access.pratt((
            prefix(
                PREFIX_BINDING_POWER,
                select! {
                    Token::Bang => UnaryOperator::Not,
                    Token::Minus => UnaryOperator::Negate,
                    Token::Plus => UnaryOperator::Plus,
                },
                |operator, operand, _| Expression::unary(operator, operand),
            ),
            infix(
                left(BinaryOperator::Multiply.binding_power()),
                select! {
                    Token::Asterisk => BinaryOperator::Multiply,
                    Token::Slash => BinaryOperator::Divide,
                    Token::Percent => BinaryOperator::Remainder,
                },
                |l, operator, r, _| Expression::binary(operator, l, r),
            ),
            infix(
                left(BinaryOperator::Add.binding_power()),
                select! {
                    Token::Plus => BinaryOperator::Add,
                    Token::Minus => BinaryOperator::Subtract,
                },
                |l, operator, r, _| Expression::binary(operator, l, r),
            ),
            infix(
                left(BinaryOperator::Less.binding_power()),
                select! {
                    Token::Less => BinaryOperator::Less,
                    Token::LessOrEqual => BinaryOperator::LessOrEqual,
                    Token::Greater => BinaryOperator::Greater,
                    Token::GreaterOrEqual => BinaryOperator::GreaterOrEqual,
                },
                |l, operator, r, _| Expression::binary(operator, l, r),
            ),
            infix(
                left(BinaryOperator::Equal.binding_power()),
                select! {
                    Token::Equal => BinaryOperator::Equal,
                    Token::NotEqual => BinaryOperator::NotEqual,
                    Token::StrictEqual => BinaryOperator::StrictEqual,
                    Token::StrictNotEqual => BinaryOperator::StrictNotEqual,
                },
                |l, operator, r, _| Expression::binary(operator, l, r),
            ),
            infix(
                left(LogicalOperator::And.binding_power()),
                just(Token::And).to(LogicalOperator::And),
                |l, operator, r, _| Expression::logical(operator, l, r),
            ),
            infix(
                left(LogicalOperator::Or.binding_power()),
                just(Token::Or).to(LogicalOperator::Or),
                |l, operator, r, _| Expression::logical(operator, l, r),
            ),
        ));

        // The ternary sits below every binary operator and is right-associative.
        operation
            .then(
                just(Token::Question)
                    .ignore_then(expression.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expression)
                    .or_not(),
            )
            .map(|(condition, branches)| match branches {
                Some((consequent, alternative)) => Expression::Conditional {
                    condition: Box::new(condition),
                    consequent: Box::new(consequent),
                    alternative: Box::new(alternative),
                },
                None => condition,
            })
    })
}

/// Resolve backslash escapes inside a quoted literal.
fn unescape(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut characters = raw.chars();
    while let Some(character) = characters.next() {
        if character != '\\' {
            text.push(character);
            continue;
        }
        match characters.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some('r') => text.push('\r'),
            Some('0') => text.push('\0'),
            Some(other) => text.push(other),
            None => text.push('\\'),
        }
    }
    text
}

fn report_errors<'code, T: fmt::Display + 'code>(
    errors: impl IntoIterator<Item = ParseError<'code, T>>,
    source: &str,
) -> Error {
    let mut report = String::new();
    for error in errors {
        let mut report_bytes = Vec::new();
        let written = Report::build(ReportKind::Error, (REPORT_SOURCE_ID, error.span().into_range()))
            .with_config(Config::default().with_color(false))
            .with_message(error.to_string())
            .with_label(
                Label::new((REPORT_SOURCE_ID, error.span().into_range()))
                    .with_message(error.reason().to_string()),
            )
            .finish()
            .write((REPORT_SOURCE_ID, Source::from(source)), &mut report_bytes);
        match written {
            Ok(()) => report.push_str(&String::from_utf8_lossy(&report_bytes)),
            Err(_) => {
                report.push_str(&error.to_string());
                report.push('\n');
            }
        }
    }
    Error::Parse {
        expression: source.to_owned(),
        report,
    }
}
