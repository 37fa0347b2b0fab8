//! Source file representation for the rill compiler.
//!
//! A [`SourceFile`] pairs a module path, stored as segments so in-memory
//! and on-disk sources look alike, with its source text. Both halves are
//! reference counted: parser states, scopes and errors all clone the file
//! freely without copying the text.

use std::sync::Arc;

use crate::report::Snippet;

/// File extension for rill language source files
pub static RILL_LANG_EXT: &str = "rill";

/// A source file: its path segments and its text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// The file path as segments (module components or `/`-split paths)
    pub path: Arc<Vec<String>>,
    /// The source text
    pub code: Arc<String>,
}

impl SourceFile {
    /// Creates a new source file from path segments and source text
    pub fn new(path: Vec<String>, code: String) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }

    /// The `/`-joined display name, always carrying the language
    /// extension so reports name files the way imports do
    pub fn display_name(&self) -> String {
        let joined = self.path.join("/");
        if joined.ends_with(&format!(".{RILL_LANG_EXT}")) {
            joined
        } else {
            format!("{joined}.{RILL_LANG_EXT}")
        }
    }

    /// The source text
    pub fn text(&self) -> &str {
        self.code.as_str()
    }

    /// A render-ready snippet of this file for diagnostics
    pub fn snippet(&self) -> Snippet {
        Snippet {
            name: self.display_name(),
            source: self.code.to_string(),
        }
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
