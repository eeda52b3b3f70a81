// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP tokenizer and statement parser using nom
//!
//! Scalar tokens are plain nom combinators. Argument lists are parsed by a small
//! recursive-descent loop that tracks nesting depth, so pathological input fails
//! with a depth error instead of exhausting the stack.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of, satisfy},
    combinator::{map, map_res, opt, recognize},
    error::{ErrorKind, FromExternalError, ParseError as NomParseError},
    sequence::{delimited, pair, preceded, tuple},
    Err as NomErr, IResult,
};

use crate::error::ParseError;
use crate::instance::{AttributeValue, EntityId, RawInstance};

/// STEP token, borrowing from the input
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Entity reference: #123
    EntityRef(EntityId),
    /// Raw string content, escapes not yet decoded
    String(&'a str),
    /// Integer: 42
    Integer(i64),
    /// Float: 3.14, 0., 1.5E-10
    Float(f64),
    /// Enum: .TRUE., .ELEMENT.
    Enum(&'a str),
    /// List: (1, 2, 3)
    List(Vec<Token<'a>>),
    /// Typed value: IFCLABEL('x'), IFCBOOLEAN(.T.)
    TypedValue(&'a str, Vec<Token<'a>>),
    /// Null value: $
    Null,
    /// Derived value: *
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    Nom(ErrorKind),
    Expected(&'static str),
    UnterminatedString,
    TooDeep,
}

/// nom error carrying the failing input position
#[derive(Debug, Clone, PartialEq)]
pub struct StepError<'a> {
    pub input: &'a str,
    pub kind: StepErrorKind,
}

impl<'a> StepError<'a> {
    fn expected(input: &'a str, what: &'static str) -> Self {
        Self {
            input,
            kind: StepErrorKind::Expected(what),
        }
    }

    /// Convert into a public error, given the full source text this input is a suffix of.
    pub fn into_parse_error(self, source: &str, depth_limit: usize) -> ParseError {
        let offset = source.len().saturating_sub(self.input.len());
        match self.kind {
            StepErrorKind::UnterminatedString => ParseError::UnterminatedString { offset },
            StepErrorKind::TooDeep => ParseError::NestingTooDeep {
                offset,
                limit: depth_limit,
            },
            StepErrorKind::Expected(what) => ParseError::UnexpectedToken {
                offset,
                expected: what.to_string(),
            },
            StepErrorKind::Nom(kind) => ParseError::UnexpectedToken {
                offset,
                expected: kind.description().to_string(),
            },
        }
    }
}

impl<'a> NomParseError<&'a str> for StepError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self {
            input,
            kind: StepErrorKind::Nom(kind),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a, E> FromExternalError<&'a str, E> for StepError<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        Self::from_error_kind(input, kind)
    }
}

pub type PResult<'a, T> = IResult<&'a str, T, StepError<'a>>;

/// Flatten a nom error into a public one.
pub(crate) fn convert_error(err: NomErr<StepError<'_>>, source: &str, depth_limit: usize) -> ParseError {
    match err {
        NomErr::Error(e) | NomErr::Failure(e) => e.into_parse_error(source, depth_limit),
        NomErr::Incomplete(_) => ParseError::UnexpectedToken {
            offset: source.len(),
            expected: "more input".to_string(),
        },
    }
}

/// Turn a recoverable error into a hard failure naming what was expected
fn expect<'a, O>(
    mut parser: impl FnMut(&'a str) -> PResult<'a, O>,
    what: &'static str,
) -> impl FnMut(&'a str) -> PResult<'a, O> {
    move |input| match parser(input) {
        Err(NomErr::Error(_)) => Err(NomErr::Failure(StepError::expected(input, what))),
        other => other,
    }
}

/// Skip whitespace and `/* */` comments
pub fn ws(mut input: &str) -> PResult<'_, ()> {
    loop {
        input = input.trim_start();
        match input.strip_prefix("/*") {
            Some(body) => match body.find("*/") {
                Some(end) => input = &body[end + 2..],
                None => return Err(NomErr::Failure(StepError::expected(input, "end of comment"))),
            },
            None => return Ok((input, ())),
        }
    }
}

/// Parse entity reference: #123
fn entity_ref(input: &str) -> PResult<'_, Token<'_>> {
    map(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<EntityId>())),
        Token::EntityRef,
    )(input)
}

/// Parse string literal: 'text' or "text"
/// A doubled quote inside the literal is an escaped quote.
fn string_literal(input: &str) -> PResult<'_, Token<'_>> {
    let quote = match input.as_bytes().first() {
        Some(&q @ (b'\'' | b'"')) => q,
        _ => return Err(NomErr::Error(StepError::from_error_kind(input, ErrorKind::Char))),
    };

    let body = &input[1..];
    let bytes = body.as_bytes();
    let mut i = 0;

    while let Some(pos) = memchr::memchr(quote, &bytes[i..]) {
        let at = i + pos;
        if bytes.get(at + 1) == Some(&quote) {
            i = at + 2;
            continue;
        }
        return Ok((&body[at + 1..], Token::String(&body[..at])));
    }

    Err(NomErr::Failure(StepError {
        input,
        kind: StepErrorKind::UnterminatedString,
    }))
}

/// Parse integer or real: 42, -3.14, 0., 1.5E-10
fn number(input: &str) -> PResult<'_, Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let is_real = text.contains(|c| matches!(c, '.' | 'e' | 'E'));
    if !is_real {
        if let Ok(value) = text.parse::<i64>() {
            return Ok((rest, Token::Integer(value)));
        }
    }

    let unsigned = text.strip_prefix('+').unwrap_or(text);
    fast_float::parse::<f64, _>(unsigned)
        .ok()
        .or_else(|| unsigned.parse::<f64>().ok())
        .map(|value| (rest, Token::Float(value)))
        .ok_or_else(|| NomErr::Error(StepError::from_error_kind(input, ErrorKind::Float)))
}

/// Parse enum: .T., .ELEMENT.
fn enum_value(input: &str) -> PResult<'_, Token<'_>> {
    map(
        delimited(
            char('.'),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            char('.'),
        ),
        Token::Enum,
    )(input)
}

fn null(input: &str) -> PResult<'_, Token<'_>> {
    map(char('$'), |_| Token::Null)(input)
}

fn derived(input: &str) -> PResult<'_, Token<'_>> {
    map(char('*'), |_| Token::Derived)(input)
}

/// Upper-case identifier: IFCWALL, FILE_SCHEMA
pub fn keyword(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse typed value: IFCPARAMETERVALUE(0.), IFCBOOLEAN(.T.)
fn typed_value<'a>(input: &'a str, depth: usize, limit: usize) -> PResult<'a, Token<'a>> {
    let (rest, name) = keyword(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, args) = arguments(rest, depth, limit)?;
    Ok((rest, Token::TypedValue(name, args)))
}

/// Parse a single attribute value with surrounding whitespace.
/// `depth` is the nesting level any list starting here would have.
pub fn token<'a>(input: &'a str, depth: usize, limit: usize) -> PResult<'a, Token<'a>> {
    delimited(
        ws,
        alt((
            number,
            entity_ref,
            string_literal,
            enum_value,
            null,
            derived,
            map(move |i: &'a str| arguments(i, depth, limit), Token::List),
            move |i: &'a str| typed_value(i, depth, limit),
        )),
        ws,
    )(input)
}

/// Parse a parenthesised, comma-separated list of values at the given nesting depth
pub fn arguments<'a>(input: &'a str, depth: usize, limit: usize) -> PResult<'a, Vec<Token<'a>>> {
    let (mut rest, _) = char('(')(input)?;
    if depth > limit {
        return Err(NomErr::Failure(StepError {
            input,
            kind: StepErrorKind::TooDeep,
        }));
    }

    let mut items = Vec::new();
    let (after_ws, _) = ws(rest)?;
    if let Some(after) = after_ws.strip_prefix(')') {
        return Ok((after, items));
    }

    loop {
        let (at, _) = ws(rest)?;
        let (after, item) = match token(at, depth + 1, limit) {
            Ok(ok) => ok,
            Err(NomErr::Error(_)) => {
                return Err(NomErr::Failure(StepError::expected(at, "attribute value")))
            }
            Err(e) => return Err(e),
        };
        items.push(item);

        if let Some(next) = after.strip_prefix(',') {
            rest = next;
        } else if let Some(next) = after.strip_prefix(')') {
            return Ok((next, items));
        } else {
            return Err(NomErr::Failure(StepError::expected(after, "',' or ')'")));
        }
    }
}

/// Right-hand side of an instance statement
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceBody<'a> {
    Simple(&'a str, Vec<Token<'a>>),
    /// `(A(...) B(...))`
    Complex(Vec<(&'a str, Vec<Token<'a>>)>),
}

impl InstanceBody<'_> {
    /// Build the owned instance record
    pub fn into_instance(self, id: EntityId, offset: usize) -> RawInstance {
        let convert = |tokens: &[Token]| tokens.iter().map(AttributeValue::from_token).collect::<Vec<_>>();
        match self {
            InstanceBody::Simple(name, args) => {
                let mut instance = RawInstance::new(id, name.to_ascii_uppercase(), convert(args.as_slice()));
                instance.offset = offset;
                instance
            }
            InstanceBody::Complex(parts) => {
                let names: Vec<String> = parts.iter().map(|(n, _)| n.to_ascii_uppercase()).collect();
                let attributes = parts.iter().flat_map(|(_, args)| convert(args.as_slice())).collect();
                let mut instance =
                    RawInstance::new(id, names.first().cloned().unwrap_or_default(), attributes);
                instance.offset = offset;
                instance.parts = names;
                instance
            }
        }
    }
}

fn complex_body(input: &str, limit: usize) -> PResult<'_, InstanceBody<'_>> {
    let (mut rest, _) = char('(')(input)?;
    let mut parts = Vec::new();

    loop {
        let (at, _) = ws(rest)?;
        if let Some(after) = at.strip_prefix(')') {
            rest = after;
            break;
        }
        let (after, name) = expect(keyword, "partial entity type")(at)?;
        let (after, _) = ws(after)?;
        let (after, args) = expect(|i| arguments(i, 1, limit), "'('")(after)?;
        parts.push((name, args));
        rest = after;
    }

    if parts.is_empty() {
        return Err(NomErr::Failure(StepError::expected(input, "partial entity type")));
    }
    Ok((rest, InstanceBody::Complex(parts)))
}

/// Parse one `#id = TYPE(args);` statement
pub fn instance(input: &str, limit: usize) -> PResult<'_, (EntityId, InstanceBody<'_>)> {
    let (rest, id) = expect(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<EntityId>())),
        "instance label",
    )(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = expect(char('='), "'='")(rest)?;
    let (rest, _) = ws(rest)?;

    let (rest, body) = if rest.starts_with('(') {
        complex_body(rest, limit)?
    } else {
        let (rest, name) = expect(keyword, "entity type name")(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, args) = expect(|i| arguments(i, 1, limit), "'('")(rest)?;
        (rest, InstanceBody::Simple(name, args))
    };

    let (rest, _) = ws(rest)?;
    let (rest, _) = expect(char(';'), "';'")(rest)?;
    Ok((rest, (id, body)))
}

/// Parse one header statement: `FILE_SCHEMA(('IFC4'));`
pub fn header_statement(input: &str, limit: usize) -> PResult<'_, (&str, Vec<Token<'_>>)> {
    let (rest, name) = expect(keyword, "header entity")(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, args) = expect(|i| arguments(i, 1, limit), "'('")(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = expect(char(';'), "';'")(rest)?;
    Ok((rest, (name, args)))
}

/// Match a section keyword followed by `;`, e.g. `ENDSEC;`
pub fn section_keyword<'a>(input: &'a str, word: &'static str) -> PResult<'a, ()> {
    let (rest, _) = tag(word)(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char(';')(rest)?;
    Ok((rest, ()))
}

/// Parse a complete, standalone entity statement
/// Example: #123=IFCWALL('guid',$,'name',$,$,$,$,$);
pub fn parse_entity(input: &str) -> Result<RawInstance, ParseError> {
    const STANDALONE_DEPTH: usize = 64;
    let (start, _) = ws(input).map_err(|e| convert_error(e, input, STANDALONE_DEPTH))?;
    let offset = input.len() - start.len();
    instance(start, STANDALONE_DEPTH)
        .map(|(_, (id, body))| body.into_instance(id, offset))
        .map_err(|e| convert_error(e, input, STANDALONE_DEPTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(input: &str) -> PResult<'_, Token<'_>> {
        map(|i| arguments(i, 1, 32), Token::List)(input)
    }

    #[test]
    fn test_entity_ref() {
        assert_eq!(entity_ref("#123"), Ok(("", Token::EntityRef(123))));
        assert_eq!(entity_ref("#0"), Ok(("", Token::EntityRef(0))));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("'hello'"), Ok(("", Token::String("hello"))));
        assert_eq!(string_literal("'it''s'"), Ok(("", Token::String("it''s"))));
        assert_eq!(string_literal("''"), Ok(("", Token::String(""))));
    }

    #[test]
    fn test_unterminated_string() {
        let err = string_literal("'open").unwrap_err();
        match err {
            NomErr::Failure(e) => assert_eq!(e.kind, StepErrorKind::UnterminatedString),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(number("42"), Ok(("", Token::Integer(42))));
        assert_eq!(number("-42"), Ok(("", Token::Integer(-42))));
        assert_eq!(number("2.75"), Ok(("", Token::Float(2.75))));
        assert_eq!(number("0."), Ok(("", Token::Float(0.0))));
        assert_eq!(number("1.5E-10"), Ok(("", Token::Float(1.5e-10))));
        assert_eq!(number("-2.E3"), Ok(("", Token::Float(-2000.0))));
    }

    #[test]
    fn test_enum() {
        assert_eq!(enum_value(".T."), Ok(("", Token::Enum("T"))));
        assert_eq!(enum_value(".ELEMENT."), Ok(("", Token::Enum("ELEMENT"))));
    }

    #[test]
    fn test_nested_list() {
        let (_, token) = list("(1,(2,3),4)").unwrap();
        match token {
            Token::List(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[1], Token::List(vec![Token::Integer(2), Token::Integer(3)]));
            }
            _ => panic!("Expected List token"),
        }
    }

    #[test]
    fn test_typed_value_and_comments() {
        let (_, tokens) = arguments("( IFCLABEL('x') /* note */ , $ ,*)", 1, 8).unwrap();
        assert_eq!(tokens[0], Token::TypedValue("IFCLABEL", vec![Token::String("x")]));
        assert_eq!(tokens[1], Token::Null);
        assert_eq!(tokens[2], Token::Derived);
    }

    #[test]
    fn test_depth_limit() {
        assert!(arguments("((((1))))", 1, 4).is_ok());
        let err = arguments("(((((1)))))", 1, 4).unwrap_err();
        match err {
            NomErr::Failure(e) => {
                assert_eq!(e.kind, StepErrorKind::TooDeep);
                assert_eq!(e.input, "(1)))))");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_entity() {
        let inst = parse_entity("#123=IFCWALL('guid',#5,$,$,'name',$,$,$);").unwrap();
        assert_eq!(inst.id, 123);
        assert_eq!(inst.type_name, "IFCWALL");
        assert_eq!(inst.attributes.len(), 8);
        assert_eq!(inst.get_ref(1), Some(5));
        assert_eq!(inst.get_string(4), Some("name"));
    }

    #[test]
    fn test_parse_entity_with_spaces() {
        let inst = parse_entity("  #9 = IFCDIRECTION ( ( 0., 0., 1. ) ) ;").unwrap();
        assert_eq!(inst.id, 9);
        assert_eq!(inst.offset, 2);
        assert_eq!(inst.get_list(0).map(|l| l.len()), Some(3));
    }

    #[test]
    fn test_parse_complex_entity() {
        let inst = parse_entity("#7=(IFCLENGTHMEASURE(1.)IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.));").unwrap();
        assert!(inst.is_complex());
        assert_eq!(inst.type_name, "IFCLENGTHMEASURE");
        assert!(inst.is_type("IFCSIUNIT"));
        assert_eq!(inst.attributes.len(), 5);
    }

    #[test]
    fn test_unexpected_token_offset() {
        let err = parse_entity("#1=IFCWALL('a' 'b');").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                offset: 15,
                expected: "',' or ')'".to_string()
            }
        );
    }
}
