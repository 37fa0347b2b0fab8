//! Module import statements.
//!
//! `import "path" [as alias]` pulls a module's exported scope into the
//! current one. System imports use a bare name (`"fmt"`), local imports a
//! relative path (`"util.rill"`, `"util/"`), remote imports an fqdn-rooted
//! path. The alias defaults to the last path segment.

use nom::combinator::cut;
use nom::error::context;
use nom::{IResult, Parser};

use crate::ast::{Expr, ImportStmt, Stmt};
use crate::nom_tools::{cleanup, NomSpan, Span};

use super::{as_alias, keyword, primitive::parse_primitive, RillParserError};

impl<'base> Stmt<'base> {
    /// Parses an import statement
    pub(crate) fn parse_import(input: NomSpan<'base>) -> IResult<NomSpan<'base>, Stmt<'base>, RillParserError<'base>> {
        let (input, _) = keyword("import").parse(input)?;
        let (input, path_expr) = context("Import path missing", cut(cleanup(parse_primitive))).parse(input)?;

        // the path must be a plain string literal; interpolation never runs
        // on import paths
        let path = match &path_expr {
            Expr::Str(node) => {
                let mut span = node.span.clone();
                span.text = match &node.value {
                    std::borrow::Cow::Borrowed(text) => *text,
                    // escaped paths are not supported; fall back to the raw span
                    std::borrow::Cow::Owned(_) => span.text,
                };
                span
            }
            _ => {
                return Err(nom::Err::Failure(RillParserError {
                    errors: vec![(input, nom_language::error::VerboseErrorKind::Context("Import path must be a string literal"))],
                }));
            }
        };

        let (input, alias) = as_alias(input)?;

        let id = input.extra.next_id();
        Ok((input, Stmt::Import(ImportStmt {
            id,
            path,
            alias: alias.map(Span::from),
        })))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::Stmt, file::SourceFile, nom_tools::{NomSpan, State}};

    #[rstest]
    #[case("import \"fmt\"", "fmt", None)]
    #[case("import \"util.rill\"", "util.rill", None)]
    #[case("import \"deep/mod/\" as dm", "deep/mod/", Some("dm"))]
    fn import_shapes(#[case] code: &str, #[case] path: &str, #[case] alias: Option<&str>) {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, stmt) = Stmt::parse_import(input).unwrap_or_else(|error| panic!("{code}: {error}"));
        assert_eq!(rest.len(), 0, "{code}");

        if let Stmt::Import(import) = stmt {
            assert_eq!(import.path.text, path);
            assert_eq!(import.alias.as_ref().map(|a| a.text), alias);
        } else {
            panic!("expected an import statement");
        }
    }

    #[test]
    fn import_requires_string_path() {
        let code = "import 42";
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        assert!(Stmt::parse_import(input).is_err());
    }
}
