//! Diagnostic rendering.
//!
//! Error types do not know how to draw themselves; they only know how to
//! flatten into [`Diag`] records via [`ToDiags`], which the `Diags` derive
//! implements. A record is fully owned — message, optional error code and
//! help text, an optional source [`Snippet`] and the [`Marker`]s to
//! highlight in it — so rendering needs no access to the compiler's
//! borrowed state.
//!
//! [`TermReporter`] renders a whole error in one batch: the flattened
//! records are assembled into `codespan-reporting` diagnostics up front,
//! snippets are interned once per distinct file, the pipeline [`Stage`]
//! rides on the primary diagnostic, and everything is emitted over a
//! single locked stream. [`oracle_line`] produces the
//! `# err: <stage>: <message>` form the archive oracles compare against.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::{self, termcolor::{ColorChoice, StandardStream}};
use indexmap::IndexMap;

use crate::compile::error::CompileError;

/// Source text together with the display name to report it under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snippet {
    /// The display name of the file
    pub name: String,
    /// The full source text
    pub source: String,
}

/// A highlighted position inside a diagnostic's snippet
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// The message shown at the position
    pub message: String,
    /// The highlighted byte range
    pub position: std::ops::Range<usize>,
}

/// One render-ready diagnostic record
#[derive(Debug, Clone, PartialEq)]
pub struct Diag {
    /// The headline message
    pub message: String,
    /// The error code, when the error declares one
    pub code: Option<String>,
    /// Help text, static or computed by the error
    pub help: Option<String>,
    /// The source file the markers point into
    pub snippet: Option<Snippet>,
    /// Highlighted positions inside the snippet
    pub markers: Vec<Marker>,
}

/// Flattening of an error tree into render-ready records.
///
/// The first record describes the error itself; records of nested errors
/// follow in order. Implemented through the `Diags` derive.
pub trait ToDiags {
    /// Flattens this error and everything nested inside it
    fn diags(&self) -> Vec<Diag>;
}

impl<T: ToDiags + ?Sized> ToDiags for Box<T> {
    fn diags(&self) -> Vec<Diag> {
        (**self).diags()
    }
}

/// The oracle form of a failure: `# err: <stage>: <message>`
pub fn oracle_line(error: &CompileError) -> String {
    format!("# err: {}: {error}", error.stage())
}

/// Assembles an error into codespan diagnostics plus the interned files.
///
/// The primary diagnostic carries the pipeline stage as its code; an error
/// code the type itself declares moves into the notes. Identical snippets
/// are interned once, so an error spanning several records of the same
/// file renders against one file id.
fn assemble(error: &CompileError) -> (SimpleFiles<String, String>, Vec<Diagnostic<usize>>) {
    let stage = error.stage();
    let mut files = SimpleFiles::new();
    let mut interned: IndexMap<Snippet, usize> = IndexMap::new();
    let mut rendered = Vec::new();

    for (index, diag) in error.diags().into_iter().enumerate() {
        let mut out = Diagnostic::error().with_message(diag.message.clone());

        let mut notes = Vec::new();
        if let Some(help) = &diag.help {
            notes.push(help.clone());
        }
        if index == 0 {
            out = out.with_code(stage.to_string());
            if let Some(code) = &diag.code {
                notes.push(format!("code: {code}"));
            }
        } else if let Some(code) = &diag.code {
            out = out.with_code(code.clone());
        }
        if !notes.is_empty() {
            out = out.with_notes(notes);
        }

        if let Some(snippet) = diag.snippet {
            let file_id = match interned.get(&snippet) {
                Some(file_id) => *file_id,
                None => {
                    let file_id = files.add(snippet.name.clone(), snippet.source.clone());
                    interned.insert(snippet, file_id);
                    file_id
                }
            };
            let labels = diag
                .markers
                .iter()
                .map(|marker| Label::primary(file_id, marker.position.clone()).with_message(marker.message.clone()))
                .collect::<Vec<_>>();
            out = out.with_labels(labels);
        }

        rendered.push(out);
    }

    (files, rendered)
}

/// Renders compile errors to a terminal stream.
pub struct TermReporter {
    writer: StandardStream,
    config: term::Config,
}

impl TermReporter {
    /// A reporter writing to standard error with automatic coloring
    pub fn stderr() -> Self {
        Self {
            writer: StandardStream::stderr(ColorChoice::Auto),
            config: term::Config::default(),
        }
    }

    /// Renders one error batch
    pub fn report(&mut self, error: &CompileError) {
        let (files, rendered) = assemble(error);

        let mut writer = self.writer.lock();
        for diagnostic in rendered.iter() {
            // a failed write must not mask the compile error being shown
            let _ = term::emit(&mut writer, &self.config, &files, diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{compile::error::CompileError, file::SourceFile};

    use super::{assemble, oracle_line, ToDiags};

    fn source() -> SourceFile {
        SourceFile::new(vec!["<memory>".into()], "$a = $b".to_string())
    }

    #[test]
    fn oracle_line_carries_stage_and_message() {
        let error = CompileError::not_in_scope("$b", vec![], 5..7, source());
        let line = oracle_line(&error);
        assert!(line.starts_with("# err: errSetScope: "), "{line}");
        assert!(line.contains("'$b' not in scope"), "{line}");
    }

    #[test]
    fn flattening_walks_nested_errors() {
        let error = CompileError::multiple_errors(vec![
            CompileError::unsolved(0..2, source()),
            CompileError::not_in_scope("$b", vec![], 5..7, source()),
        ]);

        // the collection record itself plus one per nested error
        let diags = error.diags();
        assert_eq!(diags.len(), 3);
        assert!(diags[0].message.contains("multiple errors"));
        assert!(diags[1].message.contains("cannot infer type"));
    }

    #[test]
    fn markers_interpolate_their_fields() {
        let error = CompileError::type_mismatch("int", "str", 0..3, source());
        let diags = error.diags();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].markers.len(), 1);
        assert!(diags[0].markers[0].message.contains("str"));
        assert_eq!(diags[0].markers[0].position, 0..3);
    }

    #[test]
    fn advice_becomes_the_help_text() {
        let error = CompileError::not_in_scope("coont", vec!["count".to_string()], 0..5, source());
        let diags = error.diags();
        assert!(diags[0].help.as_deref().unwrap_or_default().contains("count"));
    }

    #[test]
    fn snippets_name_files_like_imports() {
        let error = CompileError::unsolved(0..2, source());
        let snippet = error.diags()[0].snippet.clone().expect("unsolved carries a snippet");
        assert_eq!(snippet.name, "<memory>.rill");
        assert_eq!(snippet.source, "$a = $b");
    }

    #[test]
    fn primary_diagnostic_carries_the_stage() {
        let error = CompileError::unsolved(0..2, source());
        let (_, rendered) = assemble(&error);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].code.as_deref(), Some("errUnify"));
        // the error's own code moved into the notes
        assert!(rendered[0].notes.iter().any(|note| note.contains("rill::error::unsolved")));
    }

    #[test]
    fn identical_snippets_are_interned_once() {
        let error = CompileError::multiple_errors(vec![
            CompileError::unsolved(0..2, source()),
            CompileError::unsolved(5..7, source()),
        ]);
        let (_, rendered) = assemble(&error);

        let file_ids: Vec<usize> = rendered
            .iter()
            .flat_map(|diagnostic| diagnostic.labels.iter().map(|label| label.file_id))
            .collect();
        assert_eq!(file_ids.len(), 2);
        assert_eq!(file_ids[0], file_ids[1]);
    }
}
