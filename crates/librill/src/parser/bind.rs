//! `$name = expr` binding statements.

use std::rc::Rc;

use nom::character::complete::char;
use nom::combinator::cut;
use nom::error::context;
use nom::{IResult, Parser};

use crate::ast::{BindStmt, Expr, Stmt};
use crate::nom_tools::{cleanup, NomSpan};

use super::{var_name, RillParserError};

impl<'base> Stmt<'base> {
    /// Parses a `$name = expr` binding
    pub(crate) fn parse_bind(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, name) = var_name(input)?;
        let (input, _) = cleanup(char('=')).parse(input)?;
        let (input, expr) = context("Expression missing", cut(Expr::parse)).parse(input)?;

        let id = input.extra.next_id();
        Ok((input, Stmt::Bind(BindStmt {
            id,
            name: name.into(),
            expr: Rc::new(expr),
        })))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::Stmt, file::SourceFile, nom_tools::{NomSpan, State}};

    #[rstest]
    #[case("$a = 42", "a", "42")]
    #[case("$long_name = \"value\"", "long_name", "\"value\"")]
    #[case("$c = $b", "c", "$b")]
    #[case("$sum = 1 + 2", "sum", r#"operator("+", 1, 2)"#)]
    fn bind_shapes(#[case] code: &str, #[case] name: &str, #[case] expr: &str) {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, stmt) = Stmt::parse_bind(input).unwrap();
        assert_eq!(rest.len(), 0, "{code}");

        if let Stmt::Bind(bind) = stmt {
            assert_eq!(bind.name.text, name);
            assert_eq!(bind.expr.to_string(), expr);
        } else {
            panic!("expected a bind statement");
        }
    }

    #[test]
    fn bind_without_expression_fails() {
        let code = "$a =";
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        assert!(Stmt::parse_bind(input).is_err());
    }
}
