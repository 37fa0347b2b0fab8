//! Statement-level conditionals.
//!
//! `if cond { stmts } [else { stmts }]` emits either branch's statements
//! depending on the streamed condition value. Unlike the expression form,
//! both branches are optional and open their own program scope.

use std::rc::Rc;

use nom::combinator::{cut, opt};
use nom::error::context;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::ast::{Expr, IfStmt, Stmt};
use crate::nom_tools::{cleanup, NomSpan};

use super::{block, keyword, RillParserError};

impl<'base> Stmt<'base> {
    /// Parses an if statement
    pub(crate) fn parse_if(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, _) = keyword("if").parse(input)?;
        let (input, cond) = context("Condition missing", cut(Expr::parse)).parse(input)?;
        let (input, then) = context("If body missing", cut(block)).parse(input)?;
        let (input, els) = opt(preceded(
            cleanup(keyword("else")),
            context("Else body missing", cut(block)),
        )).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Stmt::If(IfStmt {
            id,
            cond: Rc::new(cond),
            then: Some(Rc::new(then)),
            els: els.map(Rc::new),
        })))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::Stmt, file::SourceFile, nom_tools::{NomSpan, State}};

    #[rstest]
    #[case("if true { }", 0, false)]
    #[case("if $b { $a = 1 }", 1, false)]
    #[case("if $b { $a = 1 } else { $a = 2 $c = 3 }", 1, true)]
    fn if_shapes(#[case] code: &str, #[case] then_stmts: usize, #[case] has_else: bool) {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, stmt) = Stmt::parse_if(input).unwrap_or_else(|error| panic!("{code}: {error}"));
        assert_eq!(rest.len(), 0, "{code}");

        if let Stmt::If(if_stmt) = stmt {
            assert_eq!(if_stmt.then.as_ref().unwrap().stmts.len(), then_stmts);
            assert_eq!(if_stmt.els.is_some(), has_else);
        } else {
            panic!("expected an if statement");
        }
    }
}
