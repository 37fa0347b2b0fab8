//! Expression parsing with operator precedence for the rill language.
//!
//! Implements precedence climbing over the rill operator set. Binary and
//! unary operators do not get AST nodes of their own: every operator use is
//! desugared into a call to the overloaded `operator` builtin whose first
//! argument is the operator symbol, so `42 + 13` parses as
//! `operator("+", 42, 13)` and type-checks through the builtin's signature
//! set.
//!
//! # Operator Precedence
//!
//! From lowest to highest:
//! 1. `or`
//! 2. `and`
//! 3. `==`, `!=`, `<`, `>`, `<=`, `>=`
//! 4. `+`, `-`
//! 5. `*`, `/`
//! 6. primary expressions: literals, composites, `if`, `func`, calls,
//!    variables, `not`, parentheses

use std::borrow::Cow;
use std::rc::Rc;

use nom::{branch::alt, bytes::complete::tag, character::complete::char, combinator::{consumed, cut, opt, value}, error::context, multi::{many, separated_list0}, sequence::{pair, preceded, terminated}, IResult, Parser};

use crate::ast::{CallExpr, Expr, FuncExpr, FuncKind, IfExpr, ListExpr, MapExpr, StrExpr, StructExpr, VarExpr};
use crate::nom_tools::{cleanup, NomSpan, Span};

use super::{dotted_ident, func_def, ident, keyword, primitive::parse_primitive, RillParserError};

/// Function type used to fold operands into operator call nodes
pub type OperatorBuilderFn<'base> = fn(Expr<'base>, &'static str, Expr<'base>) -> Expr<'base>;

/// Trait for expression parsers at different precedence levels
trait RillExpressionParser {
    /// Parse an expression at this precedence level
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>>;
}

/// Parser for `or` expressions - lowest precedence
struct OrParser;

/// Parser for `and` expressions
struct AndParser;

/// Parser for comparison expressions (`==`, `!=`, `<`, `>`, `<=`, `>=`)
struct CmpParser;

/// Parser for additive expressions (`+`, `-`)
struct AddSubParser;

/// Parser for multiplicative expressions (`*`, `/`) - highest binary precedence
struct MulDivParser;

/// Parser for primary expressions
struct InnerParser;

impl RillExpressionParser for OrParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
        Expr::single_parser::<AndParser, _>(input, "or", cleanup(keyword("or")), Expr::operator_builder)
    }
}

impl RillExpressionParser for AndParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
        Expr::single_parser::<CmpParser, _>(input, "and", cleanup(keyword("and")), Expr::operator_builder)
    }
}

impl RillExpressionParser for CmpParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
        Expr::value_parser::<AddSubParser, _>(input, alt((
            value("==", tag("==")),
            value("!=", tag("!=")),
            value("<=", tag("<=")),
            value(">=", tag(">=")),
            value("<", tag("<")),
            value(">", tag(">")),
        )), Expr::operator_builder)
    }
}

impl RillExpressionParser for AddSubParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
        Expr::value_parser::<MulDivParser, _>(input, alt((
            value("+", char('+')),
            value("-", char('-')),
        )), Expr::operator_builder)
    }
}

impl RillExpressionParser for MulDivParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
        Expr::value_parser::<InnerParser, _>(input, alt((
            value("*", char('*')),
            value("/", char('/')),
        )), Expr::operator_builder)
    }
}

impl RillExpressionParser for InnerParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Expr<'_>, RillParserError<'_>> {
        Expr::inner(input)
    }
}

impl<'base> Expr<'base> {
    /// Parses an expression at the lowest precedence level
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        OrParser::parse(input)
    }

    fn inner(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        cleanup(alt((
            Self::if_expression,
            Self::lambda,
            Self::struct_literal,
            Self::list_literal,
            Self::map_literal,
            parse_primitive,
            Self::not_expression,
            Self::variable_or_var_call,
            Self::call,
            Self::parentheses,
        ))).parse(input)
    }

    fn parentheses(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        nom::sequence::delimited(char('('), cleanup(Self::parse), char(')')).parse(input)
    }

    fn not_expression(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, _) = cleanup(keyword("not")).parse(input)?;
        let (input, expression) = context("Expression missing", cut(Self::inner)).parse(input)?;

        let state = input.extra.clone();
        let span = expression.span().clone();
        let id = state.next_id();
        Ok((
            input,
            Expr::Call(CallExpr {
                id,
                span: span.clone(),
                name: Cow::Borrowed("operator"),
                args: vec![
                    Rc::new(Expr::Str(StrExpr { id: state.next_id(), span, value: Cow::Borrowed("not") })),
                    Rc::new(expression),
                ],
                is_var: false,
                orig: id,
            }),
        ))
    }

    fn if_expression(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, (cond, then, els))) = consumed((
            preceded(cleanup(keyword("if")), Self::parse),
            nom::sequence::delimited(cleanup(char('{')), Self::parse, cleanup(char('}'))),
            preceded(
                cleanup(keyword("else")),
                context("Else branch missing", cut(nom::sequence::delimited(cleanup(char('{')), Self::parse, cleanup(char('}'))))),
            ),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Expr::If(IfExpr {
            id,
            span: span.into(),
            cond: Rc::new(cond),
            then: Rc::new(then),
            els: Rc::new(els),
        })))
    }

    fn lambda(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, (params, ret, body))) = consumed((
            preceded(
                pair(cleanup(keyword("func")), cleanup(char('('))),
                terminated(func_def::params, cleanup(char(')'))),
            ),
            opt(super::type_info::parse_type),
            nom::sequence::delimited(cleanup(char('{')), Self::parse, cleanup(char('}'))),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Expr::Func(FuncExpr {
            id,
            span: span.into(),
            title: Cow::Borrowed("<lambda>"),
            params,
            ret,
            kind: FuncKind::Body(Rc::new(body)),
        })))
    }

    fn list_literal(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, elems)) = consumed(nom::sequence::delimited(
            char('['),
            terminated(separated_list0(cleanup(char(',')), Self::parse), opt(cleanup(char(',')))),
            cleanup(char(']')),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Expr::List(ListExpr {
            id,
            span: span.into(),
            elems: elems.into_iter().map(Rc::new).collect(),
        })))
    }

    fn map_literal(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, entries)) = consumed(nom::sequence::delimited(
            char('{'),
            terminated(
                separated_list0(
                    cleanup(char(',')),
                    nom::sequence::separated_pair(Self::parse, cleanup(tag("=>")), Self::parse),
                ),
                opt(cleanup(char(','))),
            ),
            cleanup(char('}')),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Expr::Map(MapExpr {
            id,
            span: span.into(),
            entries: entries.into_iter().map(|(key, val)| (Rc::new(key), Rc::new(val))).collect(),
        })))
    }

    fn struct_literal(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, fields)) = consumed(preceded(
            pair(keyword("struct"), cleanup(char('{'))),
            terminated(
                terminated(
                    separated_list0(
                        cleanup(char(',')),
                        nom::sequence::separated_pair(cleanup(ident), cleanup(tag("=>")), Self::parse),
                    ),
                    opt(cleanup(char(','))),
                ),
                cleanup(char('}')),
            ),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Expr::Struct(StructExpr {
            id,
            span: span.into(),
            fields: fields.into_iter().map(|(name, field)| (name.into(), Rc::new(field))).collect(),
        })))
    }

    fn call(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, (name, args))) = consumed(pair(
            dotted_ident,
            nom::sequence::delimited(
                char('('),
                terminated(separated_list0(cleanup(char(',')), Self::parse), opt(cleanup(char(',')))),
                cleanup(char(')')),
            ),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Expr::Call(CallExpr {
            id,
            span: span.into(),
            name: Cow::Borrowed(*name.fragment()),
            args: args.into_iter().map(Rc::new).collect(),
            is_var: false,
            orig: id,
        })))
    }

    fn variable_or_var_call(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, (span, name)) = consumed(preceded(
            char('$'),
            nom::combinator::recognize(separated_list0(char('.'), ident)),
        )).parse(input)?;

        if name.fragment().is_empty() {
            return Err(nom::Err::Error(RillParserError {
                errors: vec![(input, nom_language::error::VerboseErrorKind::Context("Variable name missing"))],
            }));
        }

        // `$f(…)` calls through the variable scope
        let (input, args) = opt(nom::sequence::delimited(
            char('('),
            terminated(separated_list0(cleanup(char(',')), Self::parse), opt(cleanup(char(',')))),
            cleanup(char(')')),
        )).parse(input)?;

        let id = input.extra.next_id();
        let expr = match args {
            Some(args) => Expr::Call(CallExpr {
                id,
                span: span.into(),
                name: Cow::Borrowed(*name.fragment()),
                args: args.into_iter().map(Rc::new).collect(),
                is_var: true,
                orig: id,
            }),
            None => Expr::Var(VarExpr {
                id,
                span: span.into(),
                name: Cow::Borrowed(*name.fragment()),
            }),
        };
        Ok((input, expr))
    }

    /// Builds an `operator(op, left, right)` call node for a binary operator
    pub fn operator_builder(left: Expr<'base>, op: &'static str, right: Expr<'base>) -> Expr<'base> {
        let state = left.span().state.clone();
        let span = Span {
            text: "",
            position: left.span().position.start..right.span().position.end,
            state: state.clone(),
        };

        let id = state.next_id();
        Expr::Call(CallExpr {
            id,
            span: span.clone(),
            name: Cow::Borrowed("operator"),
            args: vec![
                Rc::new(Expr::Str(StrExpr { id: state.next_id(), span, value: Cow::Borrowed(op) })),
                Rc::new(left),
                Rc::new(right),
            ],
            is_var: false,
            orig: id,
        })
    }

    #[allow(private_bounds)]
    fn single_parser<P: RillExpressionParser, F: Parser<NomSpan<'base>, Error = RillParserError<'base>>>(input: NomSpan<'base>, op: &'static str, parser: F, builder: OperatorBuilderFn<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, initial) = P::parse(input)?;
        let (input, remainder): (NomSpan<'_>, Vec<Expr<'_>>) = many(0.., preceded(parser, P::parse)).parse(input)?;
        Ok((input, remainder.into_iter().fold(initial, |left, right| builder(left, op, right))))
    }

    #[allow(private_bounds)]
    fn value_parser<P: RillExpressionParser, F: Parser<NomSpan<'base>, Output = &'static str, Error = RillParserError<'base>>>(input: NomSpan<'base>, parser: F, builder: OperatorBuilderFn<'base>) -> IResult<NomSpan<'base>, Expr<'base>, RillParserError<'base>> {
        let (input, initial) = P::parse(input)?;
        let (input, remainder): (NomSpan<'_>, Vec<(&'static str, Expr<'_>)>) = many(0.., pair(parser, P::parse)).parse(input)?;
        Ok((input, remainder.into_iter().fold(initial, |left, (op, right)| builder(left, op, right))))
    }
}
