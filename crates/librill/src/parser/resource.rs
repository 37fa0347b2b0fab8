//! Resource declaration statements.
//!
//! ```text
//! kind "name-expr" {
//!     field => expr [if cond],
//!     Meta:prop => expr [if cond],
//!     Meta => struct{…} [if cond],
//!     Notify => Kind["name"] [if cond],
//! }
//! ```
//!
//! The name expression evaluates to a string or a list of strings (one
//! resource per element). Every body entry is comma-terminated and takes an
//! optional trailing `if` guard.

use std::rc::Rc;

use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{cut, opt};
use nom::error::context;
use nom::multi::many0;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::ast::{EdgeProp, Expr, ResContent, ResEdge, ResField, ResMeta, ResStmt, Stmt};
use crate::nom_tools::{cleanup, NomSpan, Span};

use super::{bare_ident, capital_ident, edge, ident, keyword, RillParserError};

/// Parses the optional trailing `if cond` guard of a body entry
fn guard(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Option<Rc<Expr<'_>>>, RillParserError<'_>> {
    let (input, cond) = opt(preceded(cleanup(keyword("if")), Expr::parse)).parse(input)?;
    Ok((input, cond.map(Rc::new)))
}

/// Parses a `field => expr [if cond],` entry
fn field_entry(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ResContent<'_>, RillParserError<'_>> {
    let (input, field) = cleanup(bare_ident).parse(input)?;
    let (input, _) = cleanup(nom::bytes::complete::tag("=>")).parse(input)?;
    let (input, value) = context("Field value missing", cut(Expr::parse)).parse(input)?;
    let (input, cond) = guard(input)?;
    let (input, _) = context("Trailing comma missing", cut(cleanup(char(',')))).parse(input)?;

    Ok((input, ResContent::Field(ResField {
        field: field.into(),
        value: Rc::new(value),
        cond,
    })))
}

/// Parses a `Meta:prop => expr,` or aggregate `Meta => expr,` entry
fn meta_entry(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ResContent<'_>, RillParserError<'_>> {
    let (input, _) = cleanup(nom::bytes::complete::tag("Meta")).parse(input)?;
    let (input, property) = opt(preceded(char(':'), ident)).parse(input)?;
    let (input, _) = cleanup(nom::bytes::complete::tag("=>")).parse(input)?;
    let (input, value) = context("Metaparameter value missing", cut(Expr::parse)).parse(input)?;
    let (input, cond) = guard(input)?;
    let (input, _) = context("Trailing comma missing", cut(cleanup(char(',')))).parse(input)?;

    let property = match property {
        Some(name) => name.into(),
        // the aggregate form; the span borrows the value's position
        None => Span {
            text: "meta",
            position: value.span().position.clone(),
            state: input.extra.clone(),
        },
    };

    Ok((input, ResContent::Meta(ResMeta {
        property,
        value: Rc::new(value),
        cond,
    })))
}

/// Parses a `Notify/Before/Listen/Depend => Kind["name"],` entry
fn edge_entry(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ResContent<'_>, RillParserError<'_>> {
    let (input, property) = cleanup(capital_ident).parse(input)?;
    let property = match *property.fragment() {
        "Notify" => EdgeProp::Notify,
        "Before" => EdgeProp::Before,
        "Listen" => EdgeProp::Listen,
        "Depend" => EdgeProp::Depend,
        _ => {
            return Err(nom::Err::Error(RillParserError {
                errors: vec![(property, nom_language::error::VerboseErrorKind::Context("Unknown edge property"))],
            }));
        }
    };
    let (input, _) = cleanup(nom::bytes::complete::tag("=>")).parse(input)?;
    let (input, half) = context("Edge target missing", cut(edge::half)).parse(input)?;
    let (input, cond) = guard(input)?;
    let (input, _) = context("Trailing comma missing", cut(cleanup(char(',')))).parse(input)?;

    Ok((input, ResContent::Edge(ResEdge {
        property,
        half,
        cond,
    })))
}

impl<'base> Stmt<'base> {
    /// Parses a resource declaration
    pub(crate) fn parse_res(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, kind) = cleanup(bare_ident).parse(input)?;
        let (input, name) = Expr::parse(input)?;
        let (input, _) = cleanup(char('{')).parse(input)?;
        let (input, contents) = many0(alt((
            meta_entry,
            edge_entry,
            field_entry,
        ))).parse(input)?;
        let (input, _) = context("Closing brace missing", cut(cleanup(char('}')))).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Stmt::Res(ResStmt {
            id,
            kind: kind.into(),
            name: Rc::new(name),
            contents,
        })))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::{ResContent, Stmt}, file::SourceFile, nom_tools::{NomSpan, State}};

    fn parse_one(code: &str) -> Stmt<'_> {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, stmt) = Stmt::parse_res(input).unwrap_or_else(|error| panic!("{code}: {error}"));
        assert_eq!(rest.len(), 0, "{code}");
        stmt
    }

    #[rstest]
    #[case("test \"t\" { }", "test", 0)]
    #[case("test \"t\" { int64ptr => 42, }", "test", 1)]
    #[case("test \"t\" { int64ptr => 42, stringptr => \"s\", }", "test", 2)]
    #[case("test [\"a\", \"b\"] { int64ptr => 42, }", "test", 1)]
    fn res_shapes(#[case] code: &str, #[case] kind: &str, #[case] contents: usize) {
        if let Stmt::Res(res) = parse_one(code) {
            assert_eq!(res.kind.text, kind);
            assert_eq!(res.contents.len(), contents);
        } else {
            panic!("expected a res statement");
        }
    }

    #[test]
    fn conditional_field() {
        if let Stmt::Res(res) = parse_one("test \"t\" { int64ptr => 42 if $b, }") {
            if let ResContent::Field(field) = &res.contents[0] {
                assert!(field.cond.is_some());
                return;
            }
        }
        panic!("expected a conditional field");
    }

    #[test]
    fn meta_entries() {
        let stmt = parse_one("test \"t\" { Meta => struct{noop => true}, Meta:retry => -1, }");
        if let Stmt::Res(res) = stmt {
            if let ResContent::Meta(aggregate) = &res.contents[0] {
                assert_eq!(aggregate.property.text, "meta");
            } else {
                panic!("expected an aggregate meta entry");
            }
            if let ResContent::Meta(retry) = &res.contents[1] {
                assert_eq!(retry.property.text, "retry");
            } else {
                panic!("expected a retry meta entry");
            }
        } else {
            panic!("expected a res statement");
        }
    }

    #[test]
    fn edge_entries() {
        let stmt = parse_one("test \"t\" { Notify => Test[\"other\"], Depend => Noop[\"base\"], }");
        if let Stmt::Res(res) = stmt {
            assert!(matches!(&res.contents[0], ResContent::Edge(edge) if edge.property.is_notify()));
            assert!(matches!(&res.contents[1], ResContent::Edge(edge) if edge.property.is_depend()));
        } else {
            panic!("expected a res statement");
        }
    }
}
