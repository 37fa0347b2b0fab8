//! Edge chain statements.
//!
//! `Kind["n1"][.send] -> Kind["n2"][.recv] [-> …]` compiles a chain of
//! resource references into pairwise edges. When exactly two halves carry
//! field names, the statement is a send/recv binding whose field
//! compatibility is checked during unification.

use std::rc::Rc;

use nom::character::complete::char;
use nom::combinator::{cut, opt};
use nom::error::context;
use nom::multi::many1;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::ast::{EdgeHalf, EdgeStmt, Expr, Stmt};
use crate::nom_tools::{cleanup, NomSpan};

use super::{capital_ident, ident, RillParserError};

/// Parses one half of an edge: `Kind["name"][.field]`
pub(crate) fn half(input: NomSpan<'_>) -> IResult<NomSpan<'_>, EdgeHalf<'_>, RillParserError<'_>> {
    let (input, kind) = cleanup(capital_ident).parse(input)?;
    let (input, name) = nom::sequence::delimited(
        char('['),
        context("Resource name missing", cut(Expr::parse)),
        context("Closing bracket missing", cut(cleanup(char(']')))),
    ).parse(input)?;
    let (input, field) = opt(preceded(char('.'), ident)).parse(input)?;

    Ok((input, EdgeHalf {
        kind: kind.into(),
        name: Rc::new(name),
        field: field.map(Into::into),
    }))
}

impl<'base> Stmt<'base> {
    /// Parses an edge chain statement
    pub(crate) fn parse_edge(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, first) = half(input)?;
        let (input, rest) = many1(preceded(
            cleanup(nom::bytes::complete::tag("->")),
            context("Edge target missing", cut(half)),
        )).parse(input)?;

        let mut halves = vec![first];
        halves.extend(rest);

        let id = input.extra.next_id();
        Ok((input, Stmt::Edge(EdgeStmt {
            id,
            halves,
            notify: false,
        })))
    }
}
