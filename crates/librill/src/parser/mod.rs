//! rill language parser built on nom combinators.
//!
//! Transforms source text into the AST defined in [`crate::ast`]. The parser
//! is organized into one module per construct, mirroring the statement and
//! expression families:
//!
//! - [`primitive`] - literal values (strings, numbers, booleans)
//! - [`expression`] - expression parsing with operator precedence; binary
//!   and unary operators are desugared into calls to the `operator` builtin
//! - [`bind`], [`func_def`], [`class`], [`include`], [`import`] - bindings
//!   and declarations
//! - [`if_condition`] - statement-level conditionals
//! - [`resource`], [`edge`] - resource declarations and edge chains
//! - [`type_info`] - type annotation syntax
//!
//! Errors carry `context(...)` labels with precise source locations;
//! [`into_compile_error`] turns a failed parse into the stage-tagged
//! compile error the rest of the pipeline reports.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alphanumeric1, char, satisfy};
use nom::combinator::{not, opt, peek, recognize, verify};
use nom::multi::{many0, many0_count, separated_list1};
use nom::sequence::{pair, preceded};
use nom::Err;
use nom::{IResult, Parser};
use nom_language::error::{VerboseError, VerboseErrorKind};

use crate::ast::{Prog, Stmt};
use crate::compile::error::{CompileError, SyntaxErrorItem};
use crate::nom_tools::{cleanup, junk, NomSpan, State, ToRange};

mod bind;
mod class;
mod edge;
mod expression;
mod func_def;
mod if_condition;
mod import;
mod include;
mod primitive;
mod resource;
pub mod type_info;

/// Type alias for parser errors with rich context information
pub type RillParserError<'base> = VerboseError<NomSpan<'base>>;

/// Words that cannot be used as identifiers
pub static KEYWORDS: &[&str] = &[
    "if", "else", "func", "class", "include", "import",
    "true", "false", "and", "or", "not", "struct", "as", "map",
];

/// Parses a complete rill source file into a [`Prog`].
///
/// This is the main entry point for parsing. It consumes every top-level
/// statement and fails with an "Unknown syntax" context if input remains.
pub fn parse<'base>(state: &'base State) -> IResult<NomSpan<'base>, Prog<'base>, RillParserError<'base>> {
    let extra = state.clone();

    let input = NomSpan::new_extra(state.file.text(), extra);
    let (remaining, stmts) = statements(input)?;

    if remaining.len() > 0 {
        let error = VerboseError {
            errors: vec![(remaining, VerboseErrorKind::Context("Unknown syntax"))],
        };
        return Err(Err::Failure(error));
    }

    let id = remaining.extra.next_id();
    Ok((
        remaining,
        Prog {
            id,
            stmts,
        },
    ))
}

/// Parses a statement sequence
pub(crate) fn statements(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Vec<Stmt<'_>>, RillParserError<'_>> {
    let (input, stmts) = many0(alt((
        cleanup(Stmt::parse_import),
        cleanup(Stmt::parse_func_def),
        cleanup(Stmt::parse_class),
        cleanup(Stmt::parse_include),
        cleanup(Stmt::parse_if),
        cleanup(Stmt::parse_bind),
        cleanup(Stmt::parse_edge),
        cleanup(Stmt::parse_res),
    ))).parse(input)?;

    // swallow trailing whitespace and comments
    let (input, _) = junk(input)?;
    Ok((input, stmts))
}

/// Parses a `{ … }` block of statements into a nested [`Prog`]
pub(crate) fn block(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Prog<'_>, RillParserError<'_>> {
    let (input, _) = cleanup(char('{')).parse(input)?;
    let (input, stmts) = statements(input)?;
    let (input, _) = cleanup(char('}')).parse(input)?;

    let id = input.extra.next_id();
    Ok((input, Prog { id, stmts }))
}

/// Parses a lowercase identifier (`[a-z_][a-z0-9_]*`)
pub fn ident(input: NomSpan<'_>) -> IResult<NomSpan<'_>, NomSpan<'_>, RillParserError<'_>> {
    recognize(pair(
        alt((recognize(satisfy(|c: char| c.is_ascii_lowercase())), tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    )).parse(input)
}

/// Parses an identifier that is not a reserved word
pub fn bare_ident(input: NomSpan<'_>) -> IResult<NomSpan<'_>, NomSpan<'_>, RillParserError<'_>> {
    verify(ident, |name: &NomSpan| !KEYWORDS.contains(name.fragment())).parse(input)
}

/// Parses a dotted identifier (`a` or `alias.a`), rejecting reserved words
/// in the first segment
pub fn dotted_ident(input: NomSpan<'_>) -> IResult<NomSpan<'_>, NomSpan<'_>, RillParserError<'_>> {
    let (_, _) = peek(bare_ident).parse(input.clone())?;
    recognize(separated_list1(char('.'), ident)).parse(input)
}

/// Parses a capitalized identifier (`[A-Z][A-Za-z0-9_]*`), used for edge
/// kind references and resource body properties
pub fn capital_ident(input: NomSpan<'_>) -> IResult<NomSpan<'_>, NomSpan<'_>, RillParserError<'_>> {
    recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        many0_count(alt((alphanumeric1, tag("_")))),
    )).parse(input)
}

/// Parses a keyword followed by a word boundary
pub fn keyword<'base>(word: &'static str) -> impl Parser<NomSpan<'base>, Output = NomSpan<'base>, Error = RillParserError<'base>> {
    nom::combinator::map(
        pair(tag(word), peek(not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_')))),
        |(matched, _)| matched,
    )
}

/// Parses the optional `$` variable sigil followed by an identifier
pub fn var_name(input: NomSpan<'_>) -> IResult<NomSpan<'_>, NomSpan<'_>, RillParserError<'_>> {
    preceded(char('$'), ident).parse(input)
}

/// Parses an optional `as alias` clause
pub fn as_alias(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Option<NomSpan<'_>>, RillParserError<'_>> {
    opt(preceded(cleanup(keyword("as")), ident)).parse(input)
}

/// Converts a parser failure into a stage-tagged compile error.
///
/// Every `context(...)` label the parser recorded becomes one syntax error
/// item with its source position and snippet.
pub fn into_compile_error(error: RillParserError<'_>) -> CompileError {
    let errors = error
        .errors
        .into_iter()
        .filter_map(|(span, kind)| match kind {
            VerboseErrorKind::Context(message) => Some(SyntaxErrorItem {
                position: span.to_range(),
                code: span.extra.file.snippet(),
                message,
            }),
            _ => None,
        })
        .collect();
    CompileError::syntax_error(errors)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{file::SourceFile, nom_tools::State};

    use super::parse;

    fn state_for(code: &str) -> State {
        State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()))
    }

    #[rstest]
    #[case("", 0)]
    #[case("# just a comment\n", 0)]
    #[case("$a = 42", 1)]
    #[case("$a = 42 $b = $a", 2)]
    #[case("import \"fmt\"\n$a = 1", 2)]
    #[case("test \"t\" { int64ptr => 42, }", 1)]
    #[case("if true { $a = 1 }", 1)]
    #[case("class c($a) { }\ninclude c(1)", 2)]
    #[case("func add($a, $b) { $a + $b }", 1)]
    #[case("Test[\"t1\"] -> Test[\"t2\"]", 1)]
    fn parse_statement_counts(#[case] code: &str, #[case] expected: usize) {
        let state = state_for(code);
        let (_, prog) = parse(&state).unwrap_or_else(|error| panic!("{code}: {error}"));
        assert_eq!(prog.stmts.len(), expected, "{code}");
    }

    #[rstest]
    #[case("$a = ")]
    #[case("test \"t\" { int64ptr => 42 }")] // missing trailing comma
    #[case("if true { $a = 1 } trailing")]
    #[case("class { }")]
    fn parse_rejects(#[case] code: &str) {
        let state = state_for(code);
        assert!(parse(&state).is_err(), "{code}");
    }

    #[test]
    fn failures_convert_to_lexparse_errors() {
        use nom::Finish;

        let state = state_for("test \"t\" { int64ptr => , }");
        let error = parse(&state).finish().expect_err("the field value is missing");
        let converted = super::into_compile_error(error);
        assert_eq!(converted.stage(), crate::compile::error::Stage::LexParse);
    }
}
