//! Class instantiation statements.
//!
//! `include name(args…)` instantiates a previously declared class. The
//! argument list is optional for parameterless classes.

use std::rc::Rc;

use nom::character::complete::char;
use nom::combinator::{cut, opt};
use nom::error::context;
use nom::multi::separated_list0;
use nom::{IResult, Parser};

use crate::ast::{Expr, IncludeStmt, Stmt};
use crate::nom_tools::{cleanup, NomSpan};

use super::{dotted_ident, keyword, RillParserError};

impl<'base> Stmt<'base> {
    /// Parses an include statement; the class name may be dotted for
    /// imported classes
    pub(crate) fn parse_include(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, _) = keyword("include").parse(input)?;
        let (input, name) = context("Class name missing", cut(cleanup(dotted_ident))).parse(input)?;
        let (input, args) = opt(nom::sequence::delimited(
            cleanup(char('(')),
            nom::sequence::terminated(
                separated_list0(cleanup(char(',')), Expr::parse),
                opt(cleanup(char(','))),
            ),
            context("Closing parenthesis missing", cut(cleanup(char(')')))),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Stmt::Include(IncludeStmt {
            id,
            name: name.into(),
            args: args.unwrap_or_default().into_iter().map(Rc::new).collect(),
            orig: id,
        })))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::Stmt, file::SourceFile, nom_tools::{NomSpan, State}};

    #[rstest]
    #[case("include base", "base", 0)]
    #[case("include base()", "base", 0)]
    #[case("include web(\"hello\")", "web", 1)]
    #[case("include pair(1, $x)", "pair", 2)]
    fn include_shapes(#[case] code: &str, #[case] name: &str, #[case] arity: usize) {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, stmt) = Stmt::parse_include(input).unwrap_or_else(|error| panic!("{code}: {error}"));
        assert_eq!(rest.len(), 0, "{code}");

        if let Stmt::Include(include) = stmt {
            assert_eq!(include.name.text, name);
            assert_eq!(include.args.len(), arity);
            assert_eq!(include.orig, include.id);
        } else {
            panic!("expected an include statement");
        }
    }
}
