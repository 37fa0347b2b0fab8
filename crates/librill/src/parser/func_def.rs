//! Named function declarations.
//!
//! `func name($a, $b int) [type] { expr }` binds a rill-defined function in
//! the enclosing program scope. The declaration wraps a function expression
//! whose body is a single expression; each call site later copies it for
//! per-site type instantiation.

use std::rc::Rc;

use nom::character::complete::char;
use nom::combinator::{consumed, cut, opt};
use nom::error::context;
use nom::multi::separated_list0;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::ast::{Expr, FuncExpr, FuncKind, FuncStmt, Param, Stmt};
use crate::nom_tools::{cleanup, NomSpan};

use super::{ident, keyword, type_info::parse_type, RillParserError};

/// Parses a parameter list: `$a, $b int, …`
pub(crate) fn params(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Vec<Param<'_>>, RillParserError<'_>> {
    separated_list0(cleanup(char(',')), param).parse(input)
}

fn param(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Param<'_>, RillParserError<'_>> {
    let (input, name) = preceded(char('$'), ident).parse(input)?;
    let (input, ty) = opt(parse_type).parse(input)?;
    Ok((input, Param { name: name.into(), ty }))
}

impl<'base> Stmt<'base> {
    /// Parses a named function declaration
    pub(crate) fn parse_func_def(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, _) = keyword("func").parse(input)?;
        let (input, name) = cleanup(ident).parse(input)?;
        let (input, (span, (params, ret, body))) = consumed((
            nom::sequence::delimited(
                cleanup(char('(')),
                params,
                context("Closing parenthesis missing", cut(cleanup(char(')')))),
            ),
            opt(parse_type),
            context(
                "Function body missing",
                cut(nom::sequence::delimited(cleanup(char('{')), Expr::parse, cleanup(char('}')))),
            ),
        )).parse(input)?;

        let func_id = input.extra.next_id();
        let func = Expr::Func(FuncExpr {
            id: func_id,
            span: span.into(),
            title: (*name.fragment()).into(),
            params,
            ret,
            kind: FuncKind::Body(Rc::new(body)),
        });

        let id = input.extra.next_id();
        Ok((input, Stmt::Func(FuncStmt {
            id,
            name: name.into(),
            func: Rc::new(func),
        })))
    }
}
