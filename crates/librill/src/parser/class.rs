//! Class declarations.
//!
//! `class name($a, $b) { stmts }` declares a parameterized, reusable body
//! of statements, instantiated later by `include`. Class parameters are
//! untyped; their types are inferred per instantiation.

use std::rc::Rc;

use nom::character::complete::char;
use nom::combinator::{cut, opt};
use nom::error::context;
use nom::multi::separated_list0;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::ast::{ClassStmt, Stmt};
use crate::nom_tools::{cleanup, NomSpan, Span};

use super::{block, ident, keyword, RillParserError};

impl<'base> Stmt<'base> {
    /// Parses a class declaration
    pub(crate) fn parse_class(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, _) = keyword("class").parse(input)?;
        let (input, name) = context("Class name missing", cut(cleanup(ident))).parse(input)?;
        let (input, params) = opt(nom::sequence::delimited(
            cleanup(char('(')),
            separated_list0(cleanup(char(',')), preceded(char('$'), ident)),
            context("Closing parenthesis missing", cut(cleanup(char(')')))),
        )).parse(input)?;
        let (input, body) = context("Class body missing", cut(block)).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Stmt::Class(ClassStmt {
            id,
            name: name.into(),
            params: params.unwrap_or_default().into_iter().map(Span::from).collect(),
            body: Rc::new(body),
        })))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::Stmt, file::SourceFile, nom_tools::{NomSpan, State}};

    #[rstest]
    #[case("class empty { }", "empty", 0, 0)]
    #[case("class one($a) { $b = $a }", "one", 1, 1)]
    #[case("class pair($a, $b) { $x = $a $y = $b }", "pair", 2, 2)]
    fn class_shapes(#[case] code: &str, #[case] name: &str, #[case] arity: usize, #[case] stmts: usize) {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, stmt) = Stmt::parse_class(input).unwrap_or_else(|error| panic!("{code}: {error}"));
        assert_eq!(rest.len(), 0, "{code}");

        if let Stmt::Class(class) = stmt {
            assert_eq!(class.name.text, name);
            assert_eq!(class.params.len(), arity);
            assert_eq!(class.body.stmts.len(), stmts);
        } else {
            panic!("expected a class statement");
        }
    }

    #[test]
    fn class_without_name_fails() {
        let code = "class { }";
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        assert!(Stmt::parse_class(input).is_err());
    }
}
