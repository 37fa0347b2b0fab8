//! Literal value parsing for the rill language.
//!
//! Handles strings (double-quoted, with escape sequences), integers, floats
//! and booleans. String literals keep their `${…}` segments untouched here;
//! interpolation rewrites them after Init.
//!
//! Numbers are 64-bit: a literal with a decimal point (optionally with an
//! exponent) is a float, anything else an int. Underscores are allowed as
//! digit separators.

use nom::Err;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, none_of, one_of};
use nom::combinator::{consumed, opt, recognize, value};
use nom::multi::{fold, many0, many1};
use nom::sequence::{preceded, terminated};
use nom::{IResult, Parser, sequence::delimited};
use nom_language::error::VerboseErrorKind;

use crate::ast::{BoolExpr, Expr, FloatExpr, IntExpr, StrExpr};
use crate::nom_tools::{cleanup, NomSpan};

use super::RillParserError;

/// Parses a single character within a string, handling escape sequences
///
/// Supported escape sequences: `\n`, `\r`, `\t`, `\\`, `\"`, `\/`.
fn character(input: NomSpan<'_>) -> IResult<NomSpan<'_>, char, RillParserError<'_>> {
    let (input, c) = none_of("\"")(input)?;
    if c == '\\' {
        alt((value('\n', char('n')), value('\r', char('r')), value('\t', char('t')), value('\\', char('\\')), value('"', char('"')), value('/', char('/'))))
            .parse(input)
    } else {
        Ok((input, c))
    }
}

/// Parses a string literal enclosed in double quotes
fn string(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
    let (input, (span, string)) = consumed(delimited(
        char('"'),
        fold(0.., character, String::new, |mut string, c| {
            string.push(c);
            string
        }),
        char('"'),
    ))
    .parse(input)?;

    let id = input.extra.next_id();
    Ok((input, Expr::Str(StrExpr { id, span: span.into(), value: string.into() })))
}

/// Parses an integer or float literal.
///
/// A decimal point makes the literal a float; floats accept an `e`/`E`
/// exponent. Underscores may separate digits.
fn number<'base>(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
    let (rest, (span, (representing, (number, floating)))) = consumed((
        opt(one_of("+-")),
        (
            recognize::<NomSpan<'base>, RillParserError<'base>, _>(many1(terminated(one_of("0123456789"), many0(char('_'))))),
            opt(preceded(
                char('.'),
                (
                    recognize::<NomSpan<'base>, RillParserError<'base>, _>(many1(terminated(one_of("0123456789"), many0(char('_'))))),
                    opt(preceded(
                        one_of("Ee"),
                        (
                            opt(alt((value(true, char('-')), value(false, char('+'))))),
                            recognize::<NomSpan<'base>, RillParserError<'base>, _>(many1(terminated(one_of("0123456789"), many0(char('_'))))),
                        ),
                    )),
                ),
            )),
        ),
    ))
        .parse(input)?;

    let number = number.replace("_", "");

    let expr = if let Some((floating, e_info)) = floating {
        let floating = floating.replace("_", "");

        let number: f64 = if let Some((is_minus, exponent)) = e_info {
            let mut exponent = exponent.replace("_", "").parse::<i32>().unwrap_or(0);
            if let Some(true) = is_minus {
                exponent = -exponent
            };

            minimal_lexical::parse_float(number.as_bytes().iter(), floating.as_bytes().iter(), exponent)
        } else {
            minimal_lexical::parse_float(number.as_bytes().iter(), floating.as_bytes().iter(), 0)
        };

        let number = match representing {
            Some('-') => -number,
            _ => number,
        };

        let id = rest.extra.next_id();
        Expr::Float(FloatExpr { id, span: span.into(), value: number })
    } else {
        let number = match number.parse::<i64>() {
            Ok(number) => number,
            Err(_) => {
                return Err(Err::Failure(RillParserError {
                    errors: vec![(rest, VerboseErrorKind::Context("Invalid number length"))],
                }));
            }
        };

        let number = match representing {
            Some('-') => match number.checked_neg() {
                Some(number) => number,
                None => {
                    return Err(Err::Failure(RillParserError {
                        errors: vec![(rest, VerboseErrorKind::Context("Invalid number length"))],
                    }));
                }
            },
            _ => number,
        };

        let id = rest.extra.next_id();
        Expr::Int(IntExpr { id, span: span.into(), value: number })
    };

    Ok((rest, expr))
}

/// Parses a `true` or `false` literal
fn boolean(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
    let (input, (span, value)) = consumed(alt((
        value(true, super::keyword("true")),
        value(false, super::keyword("false")),
    ))).parse(input)?;

    let id = input.extra.next_id();
    Ok((input, Expr::Bool(BoolExpr { id, span: span.into(), value })))
}

/// Parses any literal value into an expression node
pub fn parse_primitive(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
    cleanup(alt((
        number,
        string,
        boolean,
    ))).parse(input)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::Expr, file::SourceFile, nom_tools::{NomSpan, State}};

    use super::parse_primitive;

    fn parse_one(code: &str) -> Expr<'_> {
        let file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State::new(file);
        let input = NomSpan::new_extra(
            // keep the borrow tied to the caller's string
            code,
            state,
        );
        let (rest, expr) = parse_primitive(input).unwrap();
        assert_eq!(rest.len(), 0, "{code}");
        expr
    }

    #[rstest]
    #[case("42", 42)]
    #[case("-13", -13)]
    #[case("1_000", 1000)]
    #[case("0", 0)]
    fn int_literals(#[case] code: &str, #[case] expected: i64) {
        match parse_one(code) {
            Expr::Int(node) => assert_eq!(node.value, expected),
            other => panic!("expected int, got {other}"),
        }
    }

    #[rstest]
    #[case("3.14", 3.14)]
    #[case("-0.5", -0.5)]
    #[case("1.0e2", 100.0)]
    fn float_literals(#[case] code: &str, #[case] expected: f64) {
        match parse_one(code) {
            Expr::Float(node) => assert!((node.value - expected).abs() < 1e-9),
            other => panic!("expected float, got {other}"),
        }
    }

    #[rstest]
    #[case(r#""hello""#, "hello")]
    #[case(r#""he\"llo""#, "he\"llo")]
    #[case(r#""line\n""#, "line\n")]
    #[case(r#""${x} suffix""#, "${x} suffix")]
    fn string_literals(#[case] code: &str, #[case] expected: &str) {
        match parse_one(code) {
            Expr::Str(node) => assert_eq!(node.value, expected),
            other => panic!("expected string, got {other}"),
        }
    }

    #[rstest]
    #[case("true", true)]
    #[case("false", false)]
    fn bool_literals(#[case] code: &str, #[case] expected: bool) {
        match parse_one(code) {
            Expr::Bool(node) => assert_eq!(node.value, expected),
            other => panic!("expected bool, got {other}"),
        }
    }
}
