//! Compiler error system.
//!
//! Every failure in the pipeline is a [`CompileError`]: a stage-tagged enum
//! whose variants wrap boxed error structs deriving `Diags` for rich
//! diagnostics. Each stage is atomic; the first error aborts the pipeline
//! and carries a [`Stage`] tag so tooling and test oracles can distinguish
//! where compilation failed.

use std::fmt::{Display, Formatter};
use std::ops::Range;

use strum_macros::{EnumDiscriminants, EnumProperty};

use librill_macros::Diags;

use crate::{file::SourceFile, report::Snippet};

/// The pipeline stage an error was produced at.
///
/// `Display` yields the literal oracle tag (`errLexParse`, `errUnify`, …)
/// used by the `# err:` marker in test archives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Lexing / parsing
    LexParse,
    /// Structural validation
    Init,
    /// String interpolation
    Interpolate,
    /// Scope resolution and imports
    SetScope,
    /// Type unification
    Unify,
    /// Function graph construction
    Graph,
    /// Evaluator streaming
    Stream,
    /// Resource graph interpretation
    Interpret,
    /// Automatic edge pass (engine side)
    AutoEdge,
    /// Resource validation pass (engine side)
    Validate,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::LexParse => write!(f, "errLexParse"),
            Stage::Init => write!(f, "errInit"),
            Stage::Interpolate => write!(f, "errInterpolate"),
            Stage::SetScope => write!(f, "errSetScope"),
            Stage::Unify => write!(f, "errUnify"),
            Stage::Graph => write!(f, "errGraph"),
            Stage::Stream => write!(f, "errStream"),
            Stage::Interpret => write!(f, "errInterpret"),
            Stage::AutoEdge => write!(f, "errAutoEdge"),
            Stage::Validate => write!(f, "errValidate"),
        }
    }
}

impl Stage {
    /// Parses an oracle tag back into a stage
    pub fn from_tag(tag: &str) -> Option<Stage> {
        match tag {
            "errLexParse" => Some(Stage::LexParse),
            "errInit" => Some(Stage::Init),
            "errInterpolate" => Some(Stage::Interpolate),
            "errSetScope" => Some(Stage::SetScope),
            "errUnify" => Some(Stage::Unify),
            "errGraph" => Some(Stage::Graph),
            "errStream" => Some(Stage::Stream),
            "errInterpret" => Some(Stage::Interpret),
            "errAutoEdge" => Some(Stage::AutoEdge),
            "errValidate" => Some(Stage::Validate),
            _ => None,
        }
    }
}

/// A single parser diagnostic with its source position
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("Syntax error")]
pub struct SyntaxErrorItem {
    /// Position of the offending input
    #[diagmarker("{message}")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,

    /// Parser context message
    pub message: &'static str,
}

/// Parser failure carrying every context the parser recorded
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("{} syntax error(s) detected", .errors.len())]
pub struct SyntaxError {
    /// The individual diagnostics
    #[nested]
    pub errors: Vec<SyntaxErrorItem>
}

/// Structural precondition violated by a node
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("Invalid node: {message}")]
#[diag(code = "rill::error::invalid_node")]
pub struct InvalidNode {
    /// What precondition was violated
    pub message: String,

    /// Position of the offending node
    #[diagmarker("this node is malformed")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// Malformed `${…}` segment inside a string literal
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("Invalid interpolation: {message}")]
#[diag(code = "rill::error::interpolate", help = "interpolation segments look like ${name}")]
pub struct BadInterpolation {
    /// What is wrong with the segment
    pub message: String,

    /// Position of the string literal
    #[diagmarker("inside this string literal")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// Default help message when no similar names are found in scope
pub static NOT_IN_SCOPE_HELP: &str = "declare the name before using it, or check the spelling";

/// A name was used but never declared in the enclosing scopes
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("'{name}' not in scope at point of use")]
#[diag(code = "rill::error::not_in_scope")]
pub struct NotInScope {
    /// The missing name
    pub name: String,

    /// Position of the use
    #[diagmarker("nothing with this name is in scope here")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,

    /// Contextual advice including similar name suggestions
    #[advice]
    pub advice: String,
}

/// A name was declared twice within one program block
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("Already defined")]
#[diag(code = "rill::error::already_defined", help = "rename one of the definitions or remove it")]
pub struct AlreadyDefined {
    /// Location of the original definition
    #[diagmarker("already defined here")]
    pub old_position: Range<usize>,

    /// Location of the duplicate definition
    #[diagmarker("but it is defined again here")]
    pub new_position: Range<usize>,

    /// Source code context showing both definitions
    #[snippet]
    pub code: Snippet,
}

/// The ordering graph of a program block contains a cycle
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("recursive reference involving {names}")]
#[diag(code = "rill::error::recursive_reference", help = "break the cycle between these definitions")]
pub struct RecursiveReference {
    /// The names taking part in the cycle
    pub names: String,

    /// Position of one definition on the cycle
    #[diagmarker("this definition depends on itself")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A module transitively imports itself
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("import cycle through '{module}'")]
#[diag(code = "rill::error::import_cycle", help = "imports must form a DAG")]
pub struct ImportCycle {
    /// The module closing the cycle
    pub module: String,

    /// Position of the import
    #[diagmarker("this import closes a cycle")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// An imported module could not be found
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("'{module}' not found")]
#[diag(code = "rill::error::import_not_found", help = "check the module name, or remove the import")]
pub struct ImportNotFound {
    /// The module that could not be found
    pub module: String,

    /// Position of the import
    #[diagmarker("no module found with this name")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// An imported module contains a statement that is not allowed at module
/// top level
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("statement not allowed in an imported module")]
#[diag(code = "rill::error::module_unsafe", help = "imported modules may only contain import, bind, func and class statements")]
pub struct ModuleUnsafe {
    /// Position of the offending statement
    #[diagmarker("this statement would be unreachable")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A class transitively includes itself
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("recursive class '{name}'")]
#[diag(code = "rill::error::class_recursion", help = "class recursion is not supported")]
pub struct ClassRecursion {
    /// The class closing the recursion
    pub name: String,

    /// Position of the include
    #[diagmarker("this include re-enters the class being instantiated")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A function transitively calls itself
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("recursive function '{name}'")]
#[diag(code = "rill::error::func_recursion", help = "function recursion is not supported")]
pub struct FuncRecursion {
    /// The function closing the recursion
    pub name: String,

    /// Position of the call
    #[diagmarker("this call re-enters the function being called")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// An include or call passed the wrong number of arguments
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("'{name}' takes {expected} argument(s), {actual} given")]
#[diag(code = "rill::error::arity_mismatch")]
pub struct ArityMismatch {
    /// The class or function name
    pub name: String,

    /// Declared parameter count
    pub expected: usize,

    /// Supplied argument count
    pub actual: usize,

    /// Position of the use site
    #[diagmarker("wrong number of arguments here")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// Two constraints assign contradictory types to one expression
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("type mismatch: expected {expected}, found {actual}")]
#[diag(code = "rill::error::type_mismatch")]
pub struct TypeMismatch {
    /// Type required by the surrounding context
    pub expected: String,

    /// Type the expression actually has
    pub actual: String,

    /// Position of the expression
    #[diagmarker("this expression has type {actual}")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// No signature of an overloaded function fits the call site
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("no signature of '{name}' matches this call")]
#[diag(code = "rill::error::no_signature", help = "check the argument types against the function's signatures")]
pub struct NoSignatureMatches {
    /// The overloaded function name
    pub name: String,

    /// Position of the call
    #[diagmarker("no overload fits these arguments")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// More than one alternative of an exclusive constraint fits
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("ambiguous overload")]
#[diag(code = "rill::error::ambiguous_exclusive", help = "add a type annotation or constrain the arguments further")]
pub struct AmbiguousExclusive {
    /// Position of the expression the alternatives compete over
    #[diagmarker("several overloads fit this expression")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// An expression's type could not be determined
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("cannot infer type")]
#[diag(code = "rill::error::unsolved", help = "the surrounding context does not constrain this expression to any type")]
pub struct Unsolved {
    /// Position of the untyped expression
    #[diagmarker("type of this expression is unknown")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A send/recv edge binding is malformed or type-incompatible
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("invalid send/recv binding: {message}")]
#[diag(code = "rill::error::send_recv")]
pub struct SendRecvMismatch {
    /// What is wrong with the binding
    pub message: String,

    /// Position of the edge
    #[diagmarker("this edge cannot bind the named fields")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// The same edge key was added twice on one function-graph vertex
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("duplicate edge key '{key}'")]
#[diag(code = "rill::error::duplicate_edge_key")]
pub struct DuplicateEdgeKey {
    /// The repeated argument key
    pub key: String,

    /// Position of the expression that produced the vertex
    #[diagmarker("a second input with this key reaches the vertex built here")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// Function graph construction failed without a source position
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("function graph error: {message}")]
#[diag(code = "rill::error::graph")]
pub struct GraphInternal {
    /// What went wrong
    pub message: String,
}

/// The streaming evaluator failed or timed out
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("stream error: {message}")]
#[diag(code = "rill::error::stream")]
pub struct StreamFailure {
    /// What went wrong
    pub message: String,
}

/// A value does not fit the declared type of a resource field
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("field '{field}' expects {expected}, got {actual}")]
#[diag(code = "rill::error::value_type")]
pub struct ValueTypeMismatch {
    /// The resource field being assigned
    pub field: String,

    /// Declared field type
    pub expected: String,

    /// Type of the value produced
    pub actual: String,

    /// Position of the assignment
    #[diagmarker("this value has type {actual}")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A numeric metaparameter or field value does not fit its target width
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("value {value} out of range for '{property}'")]
#[diag(code = "rill::error::numeric_overflow")]
pub struct NumericOverflow {
    /// The property being assigned
    pub property: String,

    /// The out-of-range value
    pub value: i64,

    /// Position of the assignment
    #[diagmarker("this value does not fit the target width")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A resource declaration names an unregistered kind
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("unknown resource kind '{kind}'")]
#[diag(code = "rill::error::unknown_kind")]
pub struct UnknownKind {
    /// The unregistered kind
    pub kind: String,

    /// Position of the declaration
    #[diagmarker("no resource kind registered under this name")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// A resource body assigns a field the kind does not declare
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("resource kind '{kind}' has no field '{field}'")]
#[diag(code = "rill::error::unknown_field")]
pub struct UnknownField {
    /// The resource kind
    pub kind: String,

    /// The unknown field
    pub field: String,

    /// Position of the assignment
    #[diagmarker("this field is not declared by the kind")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// The value table has no entry for an expression's vertex
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("no value streamed for this expression")]
#[diag(code = "rill::error::missing_value")]
pub struct MissingValue {
    /// Position of the expression
    #[diagmarker("the evaluator produced no value here")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[snippet]
    pub code: Snippet,
}

/// The automatic edge pass failed (engine side)
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("auto edge error: {message}")]
#[diag(code = "rill::error::auto_edge")]
pub struct AutoEdgeFailure {
    /// What went wrong
    pub message: String,
}

/// The resource validation pass failed (engine side)
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("validate error: {message}")]
#[diag(code = "rill::error::validate")]
pub struct ValidateFailure {
    /// What went wrong
    pub message: String,
}

/// The compilation was cancelled by its token
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("cancelled during {stage}")]
#[diag(code = "rill::error::cancelled")]
pub struct Cancelled {
    /// The stage that was running when cancellation was observed
    pub stage: Stage,
}

/// Several errors accumulated before the stage aborted
#[derive(Clone, Debug, Diags, thiserror::Error)]
#[error("multiple errors detected")]
pub struct ErrorCollection {
    /// The accumulated errors
    #[nested]
    pub errors: Vec<CompileError>
}

/// Any failure the compilation pipeline can produce, tagged with the stage
/// that produced it.
#[derive(Clone, Debug, Diags, thiserror::Error, EnumDiscriminants, EnumProperty)]
pub enum CompileError {
    #[error(transparent)]
    #[diag(transparent)]
    SyntaxError(Box<SyntaxError>),

    #[error(transparent)]
    #[diag(transparent)]
    InvalidNode(Box<InvalidNode>),

    #[error(transparent)]
    #[diag(transparent)]
    BadInterpolation(Box<BadInterpolation>),

    #[error(transparent)]
    #[diag(transparent)]
    NotInScope(Box<NotInScope>),

    #[error(transparent)]
    #[diag(transparent)]
    AlreadyDefined(Box<AlreadyDefined>),

    #[error(transparent)]
    #[diag(transparent)]
    RecursiveReference(Box<RecursiveReference>),

    #[error(transparent)]
    #[diag(transparent)]
    ImportCycle(Box<ImportCycle>),

    #[error(transparent)]
    #[diag(transparent)]
    ImportNotFound(Box<ImportNotFound>),

    #[error(transparent)]
    #[diag(transparent)]
    ModuleUnsafe(Box<ModuleUnsafe>),

    #[error(transparent)]
    #[diag(transparent)]
    ClassRecursion(Box<ClassRecursion>),

    #[error(transparent)]
    #[diag(transparent)]
    FuncRecursion(Box<FuncRecursion>),

    #[error(transparent)]
    #[diag(transparent)]
    ArityMismatch(Box<ArityMismatch>),

    #[error(transparent)]
    #[diag(transparent)]
    TypeMismatch(Box<TypeMismatch>),

    #[error(transparent)]
    #[diag(transparent)]
    NoSignatureMatches(Box<NoSignatureMatches>),

    #[error(transparent)]
    #[diag(transparent)]
    AmbiguousExclusive(Box<AmbiguousExclusive>),

    #[error(transparent)]
    #[diag(transparent)]
    Unsolved(Box<Unsolved>),

    #[error(transparent)]
    #[diag(transparent)]
    SendRecvMismatch(Box<SendRecvMismatch>),

    #[error(transparent)]
    #[diag(transparent)]
    DuplicateEdgeKey(Box<DuplicateEdgeKey>),

    #[error(transparent)]
    #[diag(transparent)]
    GraphInternal(Box<GraphInternal>),

    #[error(transparent)]
    #[diag(transparent)]
    StreamFailure(Box<StreamFailure>),

    #[error(transparent)]
    #[diag(transparent)]
    ValueTypeMismatch(Box<ValueTypeMismatch>),

    #[error(transparent)]
    #[diag(transparent)]
    NumericOverflow(Box<NumericOverflow>),

    #[error(transparent)]
    #[diag(transparent)]
    UnknownKind(Box<UnknownKind>),

    #[error(transparent)]
    #[diag(transparent)]
    UnknownField(Box<UnknownField>),

    #[error(transparent)]
    #[diag(transparent)]
    MissingValue(Box<MissingValue>),

    #[error(transparent)]
    #[diag(transparent)]
    AutoEdgeFailure(Box<AutoEdgeFailure>),

    #[error(transparent)]
    #[diag(transparent)]
    ValidateFailure(Box<ValidateFailure>),

    #[error(transparent)]
    #[diag(transparent)]
    Cancelled(Box<Cancelled>),

    #[error(transparent)]
    #[diag(transparent)]
    ErrorCollection(Box<ErrorCollection>),
}

impl CompileError {
    /// Returns the pipeline stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            CompileError::SyntaxError(_) => Stage::LexParse,
            CompileError::InvalidNode(_) => Stage::Init,
            CompileError::BadInterpolation(_) => Stage::Interpolate,
            CompileError::NotInScope(_)
            | CompileError::AlreadyDefined(_)
            | CompileError::RecursiveReference(_)
            | CompileError::ImportCycle(_)
            | CompileError::ImportNotFound(_)
            | CompileError::ModuleUnsafe(_)
            | CompileError::ClassRecursion(_)
            | CompileError::FuncRecursion(_)
            | CompileError::ArityMismatch(_) => Stage::SetScope,
            CompileError::TypeMismatch(_)
            | CompileError::NoSignatureMatches(_)
            | CompileError::AmbiguousExclusive(_)
            | CompileError::Unsolved(_)
            | CompileError::SendRecvMismatch(_) => Stage::Unify,
            CompileError::DuplicateEdgeKey(_) | CompileError::GraphInternal(_) => Stage::Graph,
            CompileError::StreamFailure(_) => Stage::Stream,
            CompileError::ValueTypeMismatch(_)
            | CompileError::NumericOverflow(_)
            | CompileError::UnknownKind(_)
            | CompileError::UnknownField(_)
            | CompileError::MissingValue(_) => Stage::Interpret,
            CompileError::AutoEdgeFailure(_) => Stage::AutoEdge,
            CompileError::ValidateFailure(_) => Stage::Validate,
            CompileError::Cancelled(cancelled) => cancelled.stage,
            CompileError::ErrorCollection(collection) => {
                collection.errors.first().map(|error| error.stage()).unwrap_or(Stage::Validate)
            }
        }
    }

    pub fn syntax_error(errors: Vec<SyntaxErrorItem>) -> Self {
        CompileError::SyntaxError(SyntaxError { errors }.into())
    }

    pub fn invalid_node(message: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::InvalidNode(InvalidNode {
            message: message.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn bad_interpolation(message: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::BadInterpolation(BadInterpolation {
            message: message.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn not_in_scope(name: impl Into<String>, similar: Vec<String>, position: Range<usize>, source: SourceFile) -> Self {
        let advice = if !similar.is_empty() {
            let list = similar.iter().map(|item| format!(" - {item}")).collect::<Vec<_>>().join("\n");
            format!("The following names are in scope:\n{list}")
        } else {
            NOT_IN_SCOPE_HELP.to_string()
        };

        CompileError::NotInScope(NotInScope {
            name: name.into(),
            position,
            code: source.snippet(),
            advice,
        }.into())
    }

    pub fn already_defined(new_position: Range<usize>, old_position: Range<usize>, source: SourceFile) -> Self {
        CompileError::AlreadyDefined(AlreadyDefined {
            new_position,
            old_position,
            code: source.snippet(),
        }.into())
    }

    pub fn recursive_reference(names: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::RecursiveReference(RecursiveReference {
            names: names.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn import_cycle(module: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ImportCycle(ImportCycle {
            module: module.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn import_not_found(module: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ImportNotFound(ImportNotFound {
            module: module.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn module_unsafe(position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ModuleUnsafe(ModuleUnsafe {
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn class_recursion(name: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ClassRecursion(ClassRecursion {
            name: name.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn func_recursion(name: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::FuncRecursion(FuncRecursion {
            name: name.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn arity_mismatch(name: impl Into<String>, expected: usize, actual: usize, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ArityMismatch(ArityMismatch {
            name: name.into(),
            expected,
            actual,
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::TypeMismatch(TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn no_signature_matches(name: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::NoSignatureMatches(NoSignatureMatches {
            name: name.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn ambiguous_exclusive(position: Range<usize>, source: SourceFile) -> Self {
        CompileError::AmbiguousExclusive(AmbiguousExclusive {
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn unsolved(position: Range<usize>, source: SourceFile) -> Self {
        CompileError::Unsolved(Unsolved {
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn send_recv_mismatch(message: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::SendRecvMismatch(SendRecvMismatch {
            message: message.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn duplicate_edge_key(key: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::DuplicateEdgeKey(DuplicateEdgeKey {
            key: key.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn graph_internal(message: impl Into<String>) -> Self {
        CompileError::GraphInternal(GraphInternal {
            message: message.into(),
        }.into())
    }

    pub fn stream_failure(message: impl Into<String>) -> Self {
        CompileError::StreamFailure(StreamFailure {
            message: message.into(),
        }.into())
    }

    pub fn value_type_mismatch(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ValueTypeMismatch(ValueTypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn numeric_overflow(property: impl Into<String>, value: i64, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::NumericOverflow(NumericOverflow {
            property: property.into(),
            value,
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn unknown_kind(kind: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::UnknownKind(UnknownKind {
            kind: kind.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn unknown_field(kind: impl Into<String>, field: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::UnknownField(UnknownField {
            kind: kind.into(),
            field: field.into(),
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn missing_value(position: Range<usize>, source: SourceFile) -> Self {
        CompileError::MissingValue(MissingValue {
            position,
            code: source.snippet(),
        }.into())
    }

    pub fn cancelled(stage: Stage) -> Self {
        CompileError::Cancelled(Cancelled { stage }.into())
    }

    pub fn multiple_errors(errors: Vec<CompileError>) -> Self {
        CompileError::ErrorCollection(ErrorCollection {
            errors
        }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceFile {
        SourceFile::new(vec!["<memory>".into()], "$a = $b".to_string())
    }

    #[test]
    fn stage_tags_round_trip() {
        for stage in [
            Stage::LexParse, Stage::Init, Stage::Interpolate, Stage::SetScope,
            Stage::Unify, Stage::Graph, Stage::Stream, Stage::Interpret,
            Stage::AutoEdge, Stage::Validate,
        ] {
            assert_eq!(Stage::from_tag(&stage.to_string()), Some(stage));
        }
        assert_eq!(Stage::from_tag("errNope"), None);
    }

    #[test]
    fn errors_carry_their_stage() {
        assert_eq!(CompileError::not_in_scope("b", vec![], 5..7, source()).stage(), Stage::SetScope);
        assert_eq!(CompileError::unsolved(0..2, source()).stage(), Stage::Unify);
        assert_eq!(CompileError::stream_failure("timeout").stage(), Stage::Stream);
        assert_eq!(CompileError::unknown_kind("svc", 0..3, source()).stage(), Stage::Interpret);
    }

    #[test]
    fn collection_takes_first_stage() {
        let error = CompileError::multiple_errors(vec![
            CompileError::unsolved(0..2, source()),
            CompileError::not_in_scope("b", vec![], 5..7, source()),
        ]);
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn not_in_scope_lists_similar_names() {
        let error = CompileError::not_in_scope("coont", vec!["count".to_string()], 0..5, source());
        if let CompileError::NotInScope(inner) = error {
            assert!(inner.advice.contains("count"));
        } else {
            panic!("expected NotInScope");
        }
    }
}
