//! Nom parser tools and utilities for the rill compiler.
//!
//! Span and state types shared by every parser in [`crate::parser`], plus the
//! `cleanup` combinator that swallows whitespace and `#` line comments around
//! a token.

use nom::branch::alt;
use nom::bytes::complete::take_till;
use nom::character::complete::{char, multispace1};
use nom::combinator::recognize;
use nom::multi::many0_count;
use nom::sequence::preceded;
use nom::{Parser, sequence::delimited};
use nom_locate::LocatedSpan;
use std::fmt::Display;
use std::hash::Hash;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::ast::NodeId;
use crate::file::SourceFile;
use crate::parser::RillParserError;

/// Parser state carried through every span.
///
/// Holds the source file being parsed and the node indexer that hands out
/// [`NodeId`]s. Files compiled together must share one indexer so node ids
/// stay unique across the whole compilation; see [`crate::Sources`].
#[derive(Debug, Clone)]
pub struct State {
    /// The source file being parsed
    pub file: SourceFile,
    /// Counter handing out unique node ids during parsing and copying
    pub indexer: Arc<AtomicUsize>
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
    }
}

impl Eq for State { }

impl Hash for State {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.file.hash(state);
    }
}

impl State {
    /// Creates a new parser state with its own node indexer
    pub fn new(file: SourceFile) -> Self {
        Self {
            file,
            indexer: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a parser state sharing an existing node indexer.
    ///
    /// Used when several files are compiled together and node ids must not
    /// collide between them.
    pub fn with_indexer(file: SourceFile, indexer: Arc<AtomicUsize>) -> Self {
        Self { file, indexer }
    }

    /// Hands out the next unique node id
    pub fn next_id(&self) -> NodeId {
        NodeId(self.indexer.fetch_add(1, Ordering::SeqCst))
    }
}

/// Type alias for nom's LocatedSpan with rill's parser state
pub type NomSpan<'base, T = &'base str> = LocatedSpan<T, State>;

/// A span of source text with its position and parser state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span<'base> {
    /// The text content of this span
    pub text: &'base str,
    /// The position range in the source file
    pub position: Range<usize>,
    /// The parser state containing file information
    pub state: State
}

impl<'base> Display for Span<'base> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text)
    }
}

impl<'base> From<NomSpan<'base>> for Span<'base> {
    fn from(value: NomSpan<'base>) -> Self {
        Span {
            text: value.fragment(),
            position: value.to_range(),
            state: value.extra.clone()
        }
    }
}

/// Span information without a borrow of the source text.
///
/// Suitable for storage in errors that outlive the parse.
#[derive(Clone, Debug)]
pub struct SpanInfo {
    /// The position range in the source file
    pub position: Range<usize>,
    /// The source file this span belongs to
    pub file: SourceFile,
}

impl SpanInfo {
    /// Creates new span information with the given position and file
    pub fn new(position: Range<usize>, file: SourceFile) -> Self {
        Self { position, file }
    }
}

impl From<Span<'_>> for SpanInfo {
    fn from(span: Span<'_>) -> Self {
        let position = span.to_range();
        let file: SourceFile = span.state.file.clone();
        Self { position, file }
    }
}

impl From<&Span<'_>> for SpanInfo {
    fn from(span: &Span<'_>) -> Self {
        let position = span.to_range();
        let file = span.state.file.clone();
        Self { position, file }
    }
}

/// Trait for converting spans to position ranges
pub trait ToRange {
    /// Converts the span to a position range
    fn to_range(&self) -> std::ops::Range<usize>;
}

impl ToRange for NomSpan<'_> {
    fn to_range(&self) -> std::ops::Range<usize> {
        let start = self.location_offset();
        let end = match nom::character::complete::alphanumeric1::<NomSpan, ()>(self.clone()) {
            Ok((_, data)) => start + data.fragment().len(),
            Err(_) => start + self.fragment().len(),
        };
        start..end
    }
}

impl ToRange for Span<'_> {
    fn to_range(&self) -> std::ops::Range<usize> {
        self.position.clone()
    }
}

/// Parses runs of whitespace and `#` line comments
pub fn junk(input: NomSpan<'_>) -> nom::IResult<NomSpan<'_>, NomSpan<'_>, RillParserError<'_>> {
    recognize(many0_count(alt((
        multispace1,
        recognize(preceded(char('#'), take_till(|c| c == '\n'))),
    )))).parse(input)
}

/// Parser combinator that swallows whitespace and comments around a token.
pub fn cleanup<'base, O, F: Parser<NomSpan<'base>, Output = O, Error = RillParserError<'base>>>(f: F) -> impl Parser<NomSpan<'base>, Output = O, Error = RillParserError<'base>> {
    delimited(junk, f, junk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::bytes::complete::tag;

    #[test]
    fn junk_skips_comments() {
        let file = SourceFile::new(vec!["<memory>".into()], "  # a comment\n  x".to_string());
        let state = State::new(file.clone());
        let input = NomSpan::new_extra(file.text(), state);
        let (rest, _) = junk(input).unwrap();
        assert_eq!(*rest.fragment(), "x");
    }

    #[test]
    fn cleanup_wraps_token() {
        let file = SourceFile::new(vec!["<memory>".into()], " # note\n value # trailing\n".to_string());
        let state = State::new(file.clone());
        let input = NomSpan::new_extra(file.text(), state);
        let (rest, token) = cleanup(tag("value")).parse(input).unwrap();
        assert_eq!(*token.fragment(), "value");
        assert_eq!(*rest.fragment(), "");
    }
}
