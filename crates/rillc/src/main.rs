//! rill compiler executable.
//!
//! Compiles a root `.rill` file with its import closure, drives the
//! sequential engine for one value-table snapshot, and prints the
//! function graph and resource graph in their sorted text forms. All
//! failures are rendered as rich diagnostics with source locations.
//!
//! # Usage
//!
//! ```text
//! rillc [--modules-root DIR] [--strict] main.rill
//! ```

use std::process::exit;

use librill::{
    compile,
    engine::{
        modules::{gather, ModuleOpts},
        vfs::OsFs,
        Seq,
    },
    report::TermReporter,
    stream_and_interpret, CancelToken, CompileError,
};
use log::LevelFilter;
use simplelog::{
    ColorChoice,
    CombinedLogger,
    ConfigBuilder,
    LevelPadding,
    TermLogger,
    TerminalMode,
    ThreadLogMode,
};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} [--modules-root DIR] [--strict] main.rill");
    exit(1);
}

/// Main entry point for the rill compiler.
///
/// 1. **Logging setup**: debug-capable terminal logging
/// 2. **Gathering**: read the root file and its import closure
/// 3. **Compilation**: parse, interpolate, resolve, unify, build the FG
/// 4. **Streaming**: run the sequential engine for one snapshot
/// 5. **Interpretation**: emit the resource graph
///
/// Exits with status 1 and a rendered diagnostic on any failure.
fn main() -> Result<(), CompileError> {
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Error)
        .set_thread_mode(ThreadLogMode::Both)
        .set_level_padding(LevelPadding::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Error,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto
    )]).unwrap();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "rillc".to_string());

    let mut opts = ModuleOpts::default();
    let mut root: Option<String> = None;
    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--modules-root" => {
                let Some(dir) = rest.next() else {
                    usage(&program);
                };
                opts.modules_root = Some(dir.clone());
            }
            "--strict" => opts.strict = true,
            path if !path.starts_with('-') => {
                if root.replace(path.to_string()).is_some() {
                    usage(&program);
                }
            }
            _ => usage(&program),
        }
    }
    let Some(root) = root else {
        usage(&program);
    };

    let fs = OsFs;
    let cancel = CancelToken::new();
    let mut reporter = TermReporter::stderr();

    let sources = match gather(&fs, &root, &opts) {
        Ok(sources) => sources,
        Err(error) => {
            reporter.report(&error);
            exit(1);
        }
    };

    let compilation = match compile(&sources, &cancel) {
        Ok(compilation) => compilation,
        Err(error) => {
            reporter.report(&error);
            exit(1);
        }
    };

    let mut engine = Seq::default();
    match stream_and_interpret(&compilation, &mut engine, &cancel) {
        Ok(rg) => {
            println!("# function graph");
            print!("{}", compilation.fg.text());
            println!("# resource graph");
            print!("{}", rg.text());
        }
        Err(error) => {
            reporter.report(&error);
            exit(1);
        }
    }

    Ok(())
}
