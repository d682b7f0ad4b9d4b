use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    BracketRoundOpen,
    BracketRoundClose,
    BracketSquareOpen,
    BracketSquareClose,
    Number(f64),
    // Raw content between the quotes, escapes not yet resolved.
    Text(&'code str),
    Identifier(&'code str),
    True,
    False,
    Null,
    Comma,
    Dot,
    Question,
    Colon,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Bang,
    StrictEqual,
    StrictNotEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
    And,
    Or,
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::BracketSquareOpen => "[".into(),
            Self::BracketSquareClose => "]".into(),
            Self::Number(number) => number.to_string().into(),
            Self::Text(text) => format!("'{text}'").into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Null => "null".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Question => "?".into(),
            Self::Colon => ":".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::Bang => "!".into(),
            Self::StrictEqual => "===".into(),
            Self::StrictNotEqual => "!==".into(),
            Self::Equal => "==".into(),
            Self::NotEqual => "!=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Greater => ">".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Less => "<".into(),
            Self::And => "&&".into(),
            Self::Or => "||".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
        just('[').to(Token::BracketSquareOpen),
        just(']').to(Token::BracketSquareClose),
    ));

    // Longer operators first, `===` must not lex as `==` followed by garbage.
    let comparator = choice((
        just("===").to(Token::StrictEqual),
        just("!==").to(Token::StrictNotEqual),
        just("==").to(Token::Equal),
        just("!=").to(Token::NotEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('>').to(Token::Greater),
        just("<=").to(Token::LessOrEqual),
        just('<').to(Token::Less),
    ));

    let logical_operator = choice((
        just("&&").to(Token::And),
        just("||").to(Token::Or),
        just('!').to(Token::Bang),
    ));

    let arithmetic_operator = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let punctuation = choice((
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just('?').to(Token::Question),
        just(':').to(Token::Colon),
    ));

    // Negative numbers are a unary minus applied to a literal.
    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let quoted = |quote: char| {
        just(quote)
            .ignore_then(
                choice((
                    just('\\').then(any()).ignored(),
                    none_of(['\\', quote]).ignored(),
                ))
                .repeated()
                .to_slice(),
            )
            .then_ignore(just(quote))
    };
    let text = quoted('\'').or(quoted('"')).map(Token::Text);

    let word = any()
        .filter(|character: &char| {
            character.is_ascii_alphabetic() || *character == '_' || *character == '$'
        })
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_alphanumeric() || *character == '_' || *character == '$'
                })
                .repeated(),
        )
        .to_slice()
        .map(|word: &str| match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" | "undefined" => Token::Null,
            identifier => Token::Identifier(identifier),
        });

    let token = choice((
        bracket,
        number,
        text,
        word,
        comparator,
        logical_operator,
        arithmetic_operator,
        punctuation,
    ));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded()
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(code: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(code)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|token| token.node)
            .collect()
    }

    #[test]
    fn lexes_operators_longest_first() {
        assert_eq!(
            tokens("a === b !== c == d != !e"),
            vec![
                Token::Identifier("a"),
                Token::StrictEqual,
                Token::Identifier("b"),
                Token::StrictNotEqual,
                Token::Identifier("c"),
                Token::Equal,
                Token::Identifier("d"),
                Token::NotEqual,
                Token::Bang,
                Token::Identifier("e"),
            ]
        );
    }

    #[test]
    fn lexes_literals_and_keywords() {
        assert_eq!(
            tokens("1.5 'it\\'s' \"two\" true null undefined"),
            vec![
                Token::Number(1.5),
                Token::Text("it\\'s"),
                Token::Text("two"),
                Token::True,
                Token::Null,
                Token::Null,
            ]
        );
    }

    #[test]
    fn skips_whitespace_including_newlines() {
        assert_eq!(
            tokens("\n  user.name\t+ $x\n"),
            vec![
                Token::Identifier("user"),
                Token::Dot,
                Token::Identifier("name"),
                Token::Plus,
                Token::Identifier("$x"),
            ]
        );
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(lexer().parse("a # b").has_errors());
    }
}
