//! Module layout and source gathering.
//!
//! Imports in rill come in three forms: system imports use a bare name
//! (`import "math"`) and load registered builtins; local imports resolve
//! relative to the importing file (`import "util.rill"`,
//! `import "deep/mod/"`); remote imports resolve an fqdn-rooted path
//! against a configurable modules root, searching upward from the
//! importing file unless strict mode is requested.
//!
//! A module directory names its entry file in `metadata.rill-mod`
//! (defaulting to `main.rill`). Source text borrows require every file to
//! be materialized before parsing, so [`gather`] walks the import closure
//! up front with a lightweight text scan and returns a frozen [`Sources`]
//! set sharing one node indexer.

use std::ops::Range;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use crate::{
    compile::error::CompileError,
    engine::vfs::Fs,
    file::SourceFile,
    funcs,
    nom_tools::State,
};

/// The metadata file naming a module directory's entry point
pub static METADATA_FILE: &str = "metadata.rill-mod";

/// The default entry file of a module directory
pub static DEFAULT_ENTRY: &str = "main.rill";

/// Fetches missing remote modules into the local tree.
pub trait Downloader: std::fmt::Debug {
    /// Makes the module at the fqdn-rooted path available locally
    fn get(&self, path: &str) -> Result<(), CompileError>;
}

/// Options controlling module resolution.
#[derive(Debug, Default)]
pub struct ModuleOpts {
    /// Root directory remote imports resolve under
    pub modules_root: Option<String>,
    /// Disables the upward search for a modules root
    pub strict: bool,
    /// Invoked when a remote import's local copy is missing
    pub downloader: Option<Box<dyn Downloader>>,
}

/// One gathered compilation unit
#[derive(Debug)]
pub struct SourceUnit {
    /// Canonical key (the vfs path of the file)
    pub key: String,
    /// Parser state holding the source and the shared indexer
    pub state: State,
}

/// The frozen set of source units of one compilation.
///
/// Units share a single node indexer so ids never collide across files;
/// the set must be fully gathered before parsing starts because parsed
/// spans borrow from the stored sources.
#[derive(Debug)]
pub struct Sources {
    units: Vec<SourceUnit>,
    resolutions: IndexMap<(String, String), String>,
    indexer: Arc<AtomicUsize>,
}

impl Sources {
    /// Creates a single-unit set from in-memory source text
    pub fn from_root(file: SourceFile) -> Self {
        let indexer = Arc::new(AtomicUsize::new(0));
        let state = State::with_indexer(file, indexer.clone());
        Self {
            units: vec![SourceUnit { key: "<root>".to_string(), state }],
            resolutions: IndexMap::new(),
            indexer,
        }
    }

    /// The gathered units; the root is first
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    /// The root unit's key
    pub fn root(&self) -> &str {
        &self.units[0].key
    }

    /// The (importer, path) → key resolution table
    pub fn resolutions(&self) -> &IndexMap<(String, String), String> {
        &self.resolutions
    }

    /// The shared node indexer
    pub fn indexer(&self) -> Arc<AtomicUsize> {
        self.indexer.clone()
    }
}

/// Normalizes `.` and `..` segments out of a `/`-separated path
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The directory part of a path
fn dir_of(path: &str) -> &str {
    path.rfind('/').map(|index| &path[..index]).unwrap_or("")
}

/// Scans raw source text for import statements without parsing.
///
/// Returns each import path together with its byte range; comments are
/// skipped. The real parser validates the statements later.
fn scan_imports(code: &str) -> Vec<(String, Range<usize>)> {
    let mut out = Vec::new();
    let mut offset = 0usize;

    for line in code.split_inclusive('\n') {
        let visible = line.split('#').next().unwrap_or("");
        let mut rest = visible;
        let mut base = offset;

        while let Some(found) = rest.find("import") {
            let after = &rest[found + "import".len()..];
            // word boundary on both sides
            let boundary_before = rest[..found]
                .chars()
                .next_back()
                .map(|c| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(true);
            let trimmed = after.trim_start();
            if boundary_before && trimmed.starts_with('"') {
                if let Some(end) = trimmed[1..].find('"') {
                    let path = &trimmed[1..1 + end];
                    let skip = after.len() - trimmed.len();
                    let start = base + found + "import".len() + skip + 1;
                    out.push((path.to_string(), start..start + path.len()));
                }
            }
            base += found + "import".len();
            rest = &rest[found + "import".len()..];
        }

        offset += line.len();
    }

    out
}

/// True for fqdn-rooted remote import paths (`example.com/mod/`)
fn is_remote(path: &str) -> bool {
    path.split('/').next().map(|head| head.contains('.') && !head.ends_with(".rill")).unwrap_or(false)
        && !path.starts_with('.')
}

/// True for local relative import paths
fn is_local(path: &str) -> bool {
    !is_remote(path) && (path.contains('/') || path.ends_with(".rill") || path.starts_with('.'))
}

/// Resolves a module directory to its entry file
fn entry_of(fs: &dyn Fs, dir: &str) -> String {
    let metadata_path = format!("{}/{METADATA_FILE}", dir.trim_end_matches('/'));
    let entry = fs
        .read_file(&metadata_path)
        .ok()
        .and_then(|content| {
            content
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_ENTRY.to_string());
    format!("{}/{entry}", dir.trim_end_matches('/'))
}

/// Gathers the import closure of a root file into a frozen source set.
pub fn gather(fs: &dyn Fs, root_path: &str, opts: &ModuleOpts) -> Result<Sources, CompileError> {
    let indexer = Arc::new(AtomicUsize::new(0));
    let mut units: Vec<SourceUnit> = Vec::new();
    let mut resolutions: IndexMap<(String, String), String> = IndexMap::new();
    let mut queue: Vec<String> = vec![normalize(root_path)];
    let mut seen: Vec<String> = Vec::new();

    while let Some(key) = queue.pop() {
        if seen.contains(&key) {
            continue;
        }
        seen.push(key.clone());

        let code = fs.read_file(&key).map_err(|error| CompileError::graph_internal(format!(
            "cannot read module '{key}': {error}"
        )))?;
        let source = SourceFile::new(key.split('/').map(str::to_string).collect(), code.clone());
        let state = State::with_indexer(source.clone(), indexer.clone());
        debug!("gather: loaded unit '{key}'");
        units.push(SourceUnit { key: key.clone(), state });

        for (path, position) in scan_imports(&code) {
            if funcs::registry().is_module(&path) {
                continue;
            }

            let target = if is_local(&path) {
                let joined = normalize(&format!("{}/{}", dir_of(&key), path));
                if path.ends_with('/') {
                    entry_of(fs, &joined)
                } else {
                    joined
                }
            } else if is_remote(&path) {
                resolve_remote(fs, &key, &path, opts, position.clone(), &source)?
            } else {
                // a bare name that is not a system module; scope
                // resolution reports it with full context
                continue;
            };

            if fs.stat(&target).is_err() {
                return Err(CompileError::import_not_found(path, position, source.clone()));
            }

            resolutions.insert((key.clone(), path), target.clone());
            if !seen.contains(&target) {
                queue.push(target);
            }
        }
    }

    // the root was pushed first and popped first
    Ok(Sources { units, resolutions, indexer })
}

/// Resolves a remote import against the modules root, searching upward
/// from the importing file unless strict mode is on
fn resolve_remote(
    fs: &dyn Fs,
    importer: &str,
    path: &str,
    opts: &ModuleOpts,
    position: Range<usize>,
    source: &SourceFile,
) -> Result<String, CompileError> {
    let mut roots: Vec<String> = Vec::new();
    if let Some(root) = &opts.modules_root {
        roots.push(root.trim_end_matches('/').to_string());
    }
    if !opts.strict {
        let mut dir = dir_of(importer).to_string();
        loop {
            roots.push(if dir.is_empty() { "modules".to_string() } else { format!("{dir}/modules") });
            if dir.is_empty() {
                break;
            }
            dir = dir_of(&dir).to_string();
        }
    }

    let target_of = |root: &str| {
        let joined = normalize(&format!("{root}/{path}"));
        if path.ends_with('/') {
            entry_of(fs, &joined)
        } else {
            joined
        }
    };

    for root in roots.iter() {
        let target = target_of(root);
        if fs.stat(&target).is_ok() {
            return Ok(target);
        }
    }

    // a downloader gets one chance to materialize the module
    if let (Some(downloader), Some(root)) = (&opts.downloader, roots.first()) {
        downloader.get(path)?;
        let target = target_of(root);
        if fs.stat(&target).is_ok() {
            return Ok(target);
        }
    }

    Err(CompileError::import_not_found(path, position, source.clone()))
}

#[cfg(test)]
mod tests {
    use crate::engine::vfs::MemFs;

    use super::*;

    #[test]
    fn scan_finds_import_paths() {
        let code = "import \"fmt\"\n# import \"commented\"\nimport \"util.rill\" as u\n$a = 1\n";
        let found = scan_imports(code);
        let paths: Vec<&str> = found.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(paths, vec!["fmt", "util.rill"]);

        // positions point into the quoted path
        let (_, range) = &found[0];
        assert_eq!(&code[range.clone()], "fmt");
    }

    #[test]
    fn gather_walks_local_imports() {
        let fs = MemFs::snapshot([
            ("main.rill", "import \"lib/util.rill\"\n$a = $util.answer"),
            ("lib/util.rill", "$answer = 42"),
        ]);

        let sources = gather(&fs, "main.rill", &ModuleOpts::default()).unwrap();
        assert_eq!(sources.units().len(), 2);
        assert_eq!(sources.root(), "main.rill");
        assert_eq!(
            sources.resolutions().get(&("main.rill".to_string(), "lib/util.rill".to_string())),
            Some(&"lib/util.rill".to_string())
        );
    }

    #[test]
    fn gather_resolves_directory_modules_via_metadata() {
        let fs = MemFs::snapshot([
            ("main.rill", "import \"dep/\""),
            ("dep/metadata.rill-mod", "entry.rill\n"),
            ("dep/entry.rill", "$x = 1"),
        ]);

        let sources = gather(&fs, "main.rill", &ModuleOpts::default()).unwrap();
        assert!(sources.units().iter().any(|unit| unit.key == "dep/entry.rill"));
    }

    #[test]
    fn gather_defaults_to_main_entry() {
        let fs = MemFs::snapshot([
            ("main.rill", "import \"dep/\""),
            ("dep/main.rill", "$x = 1"),
        ]);

        let sources = gather(&fs, "main.rill", &ModuleOpts::default()).unwrap();
        assert!(sources.units().iter().any(|unit| unit.key == "dep/main.rill"));
    }

    #[test]
    fn missing_local_import_fails_at_gather() {
        let fs = MemFs::snapshot([("main.rill", "import \"missing.rill\"")]);
        let error = gather(&fs, "main.rill", &ModuleOpts::default()).unwrap_err();
        assert!(matches!(error, CompileError::ImportNotFound(_)));
    }

    #[test]
    fn remote_imports_resolve_under_the_modules_root() {
        let fs = MemFs::snapshot([
            ("project/main.rill", "import \"example.com/greet/\""),
            ("project/modules/example.com/greet/main.rill", "$hello = \"hi\""),
        ]);

        let sources = gather(&fs, "project/main.rill", &ModuleOpts::default()).unwrap();
        assert!(sources
            .units()
            .iter()
            .any(|unit| unit.key == "project/modules/example.com/greet/main.rill"));
    }

    #[test]
    fn strict_mode_requires_an_explicit_root() {
        let fs = MemFs::snapshot([
            ("project/main.rill", "import \"example.com/greet/\""),
            ("project/modules/example.com/greet/main.rill", "$hello = \"hi\""),
        ]);

        let opts = ModuleOpts { strict: true, ..Default::default() };
        assert!(gather(&fs, "project/main.rill", &opts).is_err());

        let opts = ModuleOpts {
            strict: true,
            modules_root: Some("project/modules".to_string()),
            ..Default::default()
        };
        assert!(gather(&fs, "project/main.rill", &opts).is_ok());
    }

    #[test]
    fn system_imports_are_not_gathered() {
        let fs = MemFs::snapshot([("main.rill", "import \"math\"\n$a = math.pow(2.0, 2.0)")]);
        let sources = gather(&fs, "main.rill", &ModuleOpts::default()).unwrap();
        assert_eq!(sources.units().len(), 1);
    }
}
