//! Type annotation parsing for the rill language.
//!
//! Parses the closed type syntax used in function parameter and return
//! annotations: `bool`, `str`, `int`, `float`, `[]T`, `map{K: V}`,
//! `struct{a T; b T}` and `func(T, …) T`.

use nom::branch::alt;
use nom::character::complete::char;
use nom::bytes::complete::tag;
use nom::combinator::value;
use nom::multi::separated_list0;
use nom::sequence::{preceded, separated_pair};
use nom::{IResult, Parser};

use crate::nom_tools::{cleanup, NomSpan};
use crate::types::Type;

use super::{ident, keyword, RillParserError};

/// Parses a type annotation
pub fn parse_type(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Type, RillParserError<'_>> {
    cleanup(alt((
        value(Type::Bool, keyword("bool")),
        value(Type::Str, keyword("str")),
        value(Type::Int, keyword("int")),
        value(Type::Float, keyword("float")),
        list_type,
        map_type,
        struct_type,
        func_type,
    ))).parse(input)
}

fn list_type(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Type, RillParserError<'_>> {
    let (input, elem) = preceded(tag("[]"), parse_type).parse(input)?;
    Ok((input, Type::List(Box::new(elem))))
}

fn map_type(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Type, RillParserError<'_>> {
    let (input, _) = keyword("map").parse(input)?;
    let (input, _) = cleanup(char('{')).parse(input)?;
    let (input, (key, val)) = separated_pair(parse_type, cleanup(char(':')), parse_type).parse(input)?;
    let (input, _) = cleanup(char('}')).parse(input)?;
    Ok((input, Type::Map(Box::new(key), Box::new(val))))
}

fn struct_type(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Type, RillParserError<'_>> {
    let (input, _) = keyword("struct").parse(input)?;
    let (input, _) = cleanup(char('{')).parse(input)?;
    let (input, fields) = separated_list0(
        cleanup(char(';')),
        (cleanup(ident), parse_type),
    ).parse(input)?;
    let (input, _) = cleanup(char('}')).parse(input)?;

    let fields = fields
        .into_iter()
        .map(|(name, t)| (name.fragment().to_string(), t))
        .collect();
    Ok((input, Type::Struct(fields)))
}

fn func_type(input: NomSpan<'_>) -> IResult<NomSpan<'_>, Type, RillParserError<'_>> {
    let (input, _) = keyword("func").parse(input)?;
    let (input, _) = cleanup(char('(')).parse(input)?;
    let (input, params) = separated_list0(cleanup(char(',')), parse_type).parse(input)?;
    let (input, _) = cleanup(char(')')).parse(input)?;
    let (input, ret) = parse_type.parse(input)?;

    // annotation params carry positional names; comparison ignores them
    let params = params
        .into_iter()
        .enumerate()
        .map(|(i, t)| (i.to_string(), t))
        .collect();
    Ok((input, Type::Func { params, ret: Box::new(ret) }))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{file::SourceFile, nom_tools::{NomSpan, State}, types::Type};

    use super::parse_type;

    fn parse_one(code: &str) -> Type {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let input = NomSpan::new_extra(code, state);
        let (rest, t) = parse_type(input).unwrap();
        assert_eq!(rest.len(), 0, "{code}");
        t
    }

    #[rstest]
    #[case("bool", Type::Bool)]
    #[case("str", Type::Str)]
    #[case("[]int", Type::list(Type::Int))]
    #[case("[][]str", Type::list(Type::list(Type::Str)))]
    #[case("map{str: int}", Type::map(Type::Str, Type::Int))]
    #[case("struct{a int; b str}", Type::Struct(vec![("a".into(), Type::Int), ("b".into(), Type::Str)]))]
    #[case("func(int, int) int", Type::func(vec![("0", Type::Int), ("1", Type::Int)], Type::Int))]
    fn type_syntax(#[case] code: &str, #[case] expected: Type) {
        assert_eq!(parse_one(code), expected);
    }
}
