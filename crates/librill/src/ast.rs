//! Abstract Syntax Tree definitions for the rill language.
//!
//! Two node families make up the tree: statements, which contribute to the
//! resource graph or to scope, and expressions, which produce typed value
//! streams. Expression nodes are reference counted and immutable after
//! interpolation; every per-node compilation result (resolved scope, solved
//! type, instantiated copies) lives in side tables inside
//! [`crate::compile::CompileContext`], keyed by [`NodeId`].
//!
//! # Ownership
//!
//! Each node is owned by its parent through `Rc`. [`Expr::copy`] is a *light*
//! copy: it re-indexes only nodes whose later resolution depends on the use
//! site; literals and built-in function nodes are shared between copies.
//! `Include` and `Call` copy their class/callee per use site so each site
//! carries its own types and bound arguments.

use std::{borrow::Cow, rc::Rc, sync::atomic::{AtomicUsize, Ordering}, sync::Arc};

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::{nom_tools::Span, types::Type};

/// Unique identifier of an AST node within one compilation.
///
/// Ids are handed out by the parser state's indexer and, for nodes
/// synthesized later (copies, interpolation pieces, placeholders), by the
/// compile context sharing the same counter.
#[derive(PartialEq, Debug, Copy, Clone, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

fn next_id(indexer: &Arc<AtomicUsize>) -> NodeId {
    NodeId(indexer.fetch_add(1, Ordering::SeqCst))
}

/// A boolean literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct BoolExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// The literal value
    pub value: bool,
}

/// An integer literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct IntExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// The literal value
    pub value: i64,
}

/// A float literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct FloatExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// The literal value
    pub value: f64,
}

/// A string literal expression.
///
/// Until [interpolation](crate::compile::interpolate) runs, the cooked value
/// may still contain `${…}` segments; interpolation rewrites such literals
/// into `concat` call trees.
#[derive(Debug, Clone, PartialEq)]
pub struct StrExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// The cooked string contents
    pub value: Cow<'base, str>,
}

/// A list literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct ListExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// Element expressions in source order
    pub elems: Vec<Rc<Expr<'base>>>,
}

/// A map literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// Key/value expression pairs in source order
    pub entries: Vec<(Rc<Expr<'base>>, Rc<Expr<'base>>)>,
}

/// A struct literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct StructExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the literal
    pub span: Span<'base>,
    /// Ordered (field name, expression) pairs
    pub fields: Vec<(Span<'base>, Rc<Expr<'base>>)>,
}

/// A function parameter declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Param<'base> {
    /// Parameter name (without the `$` sigil)
    pub name: Span<'base>,
    /// Optional declared type
    pub ty: Option<Type>,
}

/// The representation behind a function expression.
///
/// Exactly one representation exists per function: a rill-defined body, a
/// single built-in implementation, or a set of overloaded simple values
/// resolved from the registry.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum FuncKind<'base> {
    /// rill-defined function with a body expression
    Body(Rc<Expr<'base>>),
    /// A single built-in node implementation, named in the registry
    Builtin(String),
    /// A set of overloaded simple values, named in the registry
    Overload(String),
}

/// A function expression
#[derive(Debug, Clone, PartialEq)]
pub struct FuncExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the function
    pub span: Span<'base>,
    /// Display title of the function
    pub title: Cow<'base, str>,
    /// Ordered parameter declarations (empty for builtins)
    pub params: Vec<Param<'base>>,
    /// Optional declared return type
    pub ret: Option<Type>,
    /// The function's representation
    pub kind: FuncKind<'base>,
}

/// A call expression
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the call
    pub span: Span<'base>,
    /// Callee name; may be dotted for imported functions
    pub name: Cow<'base, str>,
    /// Argument expressions in source order
    pub args: Vec<Rc<Expr<'base>>>,
    /// True when the callee is resolved from the variable scope (`$f(…)`)
    pub is_var: bool,
    /// Id of the originating call this node was copied from; used by the
    /// scope chain for recursion detection
    pub orig: NodeId,
}

/// A lexical variable reference
#[derive(Debug, Clone, PartialEq)]
pub struct VarExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the reference
    pub span: Span<'base>,
    /// Variable name; may be dotted for imported variables
    pub name: Cow<'base, str>,
}

/// An expression-level conditional; both branches are required and must
/// unify to the same type
#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span of the conditional
    pub span: Span<'base>,
    /// Condition expression
    pub cond: Rc<Expr<'base>>,
    /// Value when the condition is true
    pub then: Rc<Expr<'base>>,
    /// Value when the condition is false
    pub els: Rc<Expr<'base>>,
}

/// A unification placeholder for empty composites that still need an
/// element type. Never appears in user source.
#[derive(Debug, Clone, PartialEq)]
pub struct AnyExpr<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Source span borrowed from the composite that spawned this node
    pub span: Span<'base>,
}

/// An expression node producing a typed value stream
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(ExprKind), vis(pub))]
pub enum Expr<'base> {
    /// Boolean literal
    Bool(BoolExpr<'base>),
    /// Integer literal
    Int(IntExpr<'base>),
    /// Float literal
    Float(FloatExpr<'base>),
    /// String literal
    Str(StrExpr<'base>),
    /// List literal
    List(ListExpr<'base>),
    /// Map literal
    Map(MapExpr<'base>),
    /// Struct literal
    Struct(StructExpr<'base>),
    /// Function expression
    Func(FuncExpr<'base>),
    /// Call expression
    Call(CallExpr<'base>),
    /// Variable reference
    Var(VarExpr<'base>),
    /// Expression-level conditional
    If(IfExpr<'base>),
    /// Unification placeholder
    Any(AnyExpr<'base>),
}

impl<'base> Expr<'base> {
    /// Returns the unique id of this node
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Bool(node) => node.id,
            Expr::Int(node) => node.id,
            Expr::Float(node) => node.id,
            Expr::Str(node) => node.id,
            Expr::List(node) => node.id,
            Expr::Map(node) => node.id,
            Expr::Struct(node) => node.id,
            Expr::Func(node) => node.id,
            Expr::Call(node) => node.id,
            Expr::Var(node) => node.id,
            Expr::If(node) => node.id,
            Expr::Any(node) => node.id,
        }
    }

    /// Returns the source span of this node
    pub fn span(&self) -> &Span<'base> {
        match self {
            Expr::Bool(node) => &node.span,
            Expr::Int(node) => &node.span,
            Expr::Float(node) => &node.span,
            Expr::Str(node) => &node.span,
            Expr::List(node) => &node.span,
            Expr::Map(node) => &node.span,
            Expr::Struct(node) => &node.span,
            Expr::Func(node) => &node.span,
            Expr::Call(node) => &node.span,
            Expr::Var(node) => &node.span,
            Expr::If(node) => &node.span,
            Expr::Any(node) => &node.span,
        }
    }

    /// Depth-first traversal, children before self.
    pub fn apply<F: FnMut(&Expr<'base>)>(&self, visit: &mut F) {
        match self {
            Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Var(_) | Expr::Any(_) => {}
            Expr::List(node) => {
                for elem in node.elems.iter() {
                    elem.apply(visit);
                }
            }
            Expr::Map(node) => {
                for (key, val) in node.entries.iter() {
                    key.apply(visit);
                    val.apply(visit);
                }
            }
            Expr::Struct(node) => {
                for (_, field) in node.fields.iter() {
                    field.apply(visit);
                }
            }
            Expr::Func(node) => {
                if let FuncKind::Body(body) = &node.kind {
                    body.apply(visit);
                }
            }
            Expr::Call(node) => {
                for arg in node.args.iter() {
                    arg.apply(visit);
                }
            }
            Expr::If(node) => {
                node.cond.apply(visit);
                node.then.apply(visit);
                node.els.apply(visit);
            }
        }
        visit(self);
    }

    /// Light copy: re-indexes nodes whose resolution depends on the use
    /// site, sharing literals and built-in function nodes.
    pub fn copy(self: &Rc<Self>, indexer: &Arc<AtomicUsize>) -> Rc<Expr<'base>> {
        match self.as_ref() {
            Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => self.clone(),
            Expr::Func(node) if !node.kind.is_body() => self.clone(),
            Expr::List(node) => Rc::new(Expr::List(ListExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                elems: node.elems.iter().map(|elem| elem.copy(indexer)).collect(),
            })),
            Expr::Map(node) => Rc::new(Expr::Map(MapExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                entries: node.entries.iter().map(|(key, val)| (key.copy(indexer), val.copy(indexer))).collect(),
            })),
            Expr::Struct(node) => Rc::new(Expr::Struct(StructExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                fields: node.fields.iter().map(|(name, field)| (name.clone(), field.copy(indexer))).collect(),
            })),
            Expr::Func(node) => {
                let body = match &node.kind {
                    FuncKind::Body(body) => FuncKind::Body(body.copy(indexer)),
                    other => other.clone(),
                };
                Rc::new(Expr::Func(FuncExpr {
                    id: next_id(indexer),
                    span: node.span.clone(),
                    title: node.title.clone(),
                    params: node.params.clone(),
                    ret: node.ret.clone(),
                    kind: body,
                }))
            }
            Expr::Call(node) => Rc::new(Expr::Call(CallExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                name: node.name.clone(),
                args: node.args.iter().map(|arg| arg.copy(indexer)).collect(),
                is_var: node.is_var,
                orig: node.orig,
            })),
            Expr::Var(node) => Rc::new(Expr::Var(VarExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                name: node.name.clone(),
            })),
            Expr::If(node) => Rc::new(Expr::If(IfExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                cond: node.cond.copy(indexer),
                then: node.then.copy(indexer),
                els: node.els.copy(indexer),
            })),
            Expr::Any(node) => Rc::new(Expr::Any(AnyExpr {
                id: next_id(indexer),
                span: node.span.clone(),
            })),
        }
    }
}

impl std::fmt::Display for Expr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Bool(node) => write!(f, "{}", node.value),
            Expr::Int(node) => write!(f, "{}", node.value),
            Expr::Float(node) => write!(f, "{}", node.value),
            Expr::Str(node) => write!(f, "{:?}", node.value),
            Expr::List(node) => {
                write!(f, "[")?;
                for (i, elem) in node.elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
            Expr::Map(node) => {
                write!(f, "{{")?;
                for (i, (key, val)) in node.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} => {val}")?;
                }
                write!(f, "}}")
            }
            Expr::Struct(node) => {
                write!(f, "struct{{")?;
                for (i, (name, field)) in node.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} => {field}")?;
                }
                write!(f, "}}")
            }
            Expr::Func(node) => write!(f, "func({})", node.title),
            Expr::Call(node) => {
                write!(f, "{}(", node.name)?;
                for (i, arg) in node.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Var(node) => write!(f, "${}", node.name),
            Expr::If(node) => write!(f, "if {} {{ {} }} else {{ {} }}", node.cond, node.then, node.els),
            Expr::Any(_) => write!(f, "?"),
        }
    }
}

/// A `$name = expr` binding in the enclosing program scope
#[derive(Debug, Clone, PartialEq)]
pub struct BindStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Bound name (without the `$` sigil)
    pub name: Span<'base>,
    /// Bound expression
    pub expr: Rc<Expr<'base>>,
}

/// A named function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FuncStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Declared function name
    pub name: Span<'base>,
    /// The function expression; always a [`FuncKind::Body`] function
    pub func: Rc<Expr<'base>>,
}

/// A parameterized reusable body of statements
#[derive(Debug, Clone, PartialEq)]
pub struct ClassStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Declared class name
    pub name: Span<'base>,
    /// Ordered parameter names (without the `$` sigil)
    pub params: Vec<Span<'base>>,
    /// The class body
    pub body: Rc<Prog<'base>>,
}

/// An instantiation of a previously declared class
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Name of the class being instantiated
    pub name: Span<'base>,
    /// Argument expressions in source order
    pub args: Vec<Rc<Expr<'base>>>,
    /// Id of the originating include this node was copied from; used by the
    /// scope chain for recursion detection
    pub orig: NodeId,
}

/// An `import "path" [as alias]` statement
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// The import path as written in source
    pub path: Span<'base>,
    /// Optional alias; defaults to the last path segment
    pub alias: Option<Span<'base>>,
}

/// A statement-level conditional; either branch is optional
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Condition expression
    pub cond: Rc<Expr<'base>>,
    /// Statements emitted when the condition is true
    pub then: Option<Rc<Prog<'base>>>,
    /// Statements emitted when the condition is false
    pub els: Option<Rc<Prog<'base>>>,
}

/// The edge property of a resource edge entry
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIs)]
pub enum EdgeProp {
    /// Edge from this resource to the target, carrying a notification
    Notify,
    /// Edge from this resource to the target
    Before,
    /// Edge from the target to this resource, carrying a notification
    Listen,
    /// Edge from the target to this resource
    Depend,
}

impl std::fmt::Display for EdgeProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeProp::Notify => write!(f, "Notify"),
            EdgeProp::Before => write!(f, "Before"),
            EdgeProp::Listen => write!(f, "Listen"),
            EdgeProp::Depend => write!(f, "Depend"),
        }
    }
}

/// One half of an edge: a resource reference with an optional field name
/// for send/recv bindings
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeHalf<'base> {
    /// Resource kind, lowercased from the capitalized source form
    pub kind: Span<'base>,
    /// Resource name expression
    pub name: Rc<Expr<'base>>,
    /// Optional send/recv field name
    pub field: Option<Span<'base>>,
}

/// A `field => value [if cond]` entry in a resource body
#[derive(Debug, Clone, PartialEq)]
pub struct ResField<'base> {
    /// Field name
    pub field: Span<'base>,
    /// Value expression
    pub value: Rc<Expr<'base>>,
    /// Optional guard; the entry is skipped when it evaluates false
    pub cond: Option<Rc<Expr<'base>>>,
}

/// A `Notify/Before/Listen/Depend => Kind["name"] [if cond]` entry
#[derive(Debug, Clone, PartialEq)]
pub struct ResEdge<'base> {
    /// Direction and notification semantics of the edge
    pub property: EdgeProp,
    /// The other endpoint
    pub half: EdgeHalf<'base>,
    /// Optional guard; the entry is skipped when it evaluates false
    pub cond: Option<Rc<Expr<'base>>>,
}

/// A `Meta:prop => value [if cond]` or aggregate `Meta => struct{…}` entry
#[derive(Debug, Clone, PartialEq)]
pub struct ResMeta<'base> {
    /// Metaparameter name, or `meta` for the aggregate struct form
    pub property: Span<'base>,
    /// Value expression
    pub value: Rc<Expr<'base>>,
    /// Optional guard; the entry is skipped when it evaluates false
    pub cond: Option<Rc<Expr<'base>>>,
}

/// An ordered entry in a resource body
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum ResContent<'base> {
    /// Field assignment
    Field(ResField<'base>),
    /// Edge declaration
    Edge(ResEdge<'base>),
    /// Metaparameter assignment
    Meta(ResMeta<'base>),
}

/// A resource declaration.
///
/// The name expression evaluates to either a string (one resource) or a
/// list of strings (one resource per element).
#[derive(Debug, Clone, PartialEq)]
pub struct ResStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Resource kind
    pub kind: Span<'base>,
    /// Name expression
    pub name: Rc<Expr<'base>>,
    /// Ordered body entries
    pub contents: Vec<ResContent<'base>>,
}

/// An edge chain `a -> b -> c`, compiled to pairwise edges.
///
/// When exactly two halves carry send/recv field names this is a send/recv
/// binding and field compatibility is checked during unification.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStmt<'base> {
    /// Unique node id
    pub id: NodeId,
    /// The chain endpoints in source order; always at least two
    pub halves: Vec<EdgeHalf<'base>>,
    /// Whether the produced edges carry notifications
    pub notify: bool,
}

/// A statement node
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(StmtKind), vis(pub))]
pub enum Stmt<'base> {
    /// Name binding
    Bind(BindStmt<'base>),
    /// Function declaration
    Func(FuncStmt<'base>),
    /// Class declaration
    Class(ClassStmt<'base>),
    /// Class instantiation
    Include(IncludeStmt<'base>),
    /// Module import
    Import(ImportStmt<'base>),
    /// Conditional emission
    If(IfStmt<'base>),
    /// Resource declaration
    Res(ResStmt<'base>),
    /// Edge chain
    Edge(EdgeStmt<'base>),
}

impl<'base> Stmt<'base> {
    /// Returns the unique id of this statement
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::Bind(node) => node.id,
            Stmt::Func(node) => node.id,
            Stmt::Class(node) => node.id,
            Stmt::Include(node) => node.id,
            Stmt::Import(node) => node.id,
            Stmt::If(node) => node.id,
            Stmt::Res(node) => node.id,
            Stmt::Edge(node) => node.id,
        }
    }

    /// Visits every expression directly contained in this statement.
    ///
    /// Nested programs (if branches, class bodies) are not descended into;
    /// callers that need them recurse explicitly.
    pub fn apply_exprs<F: FnMut(&Rc<Expr<'base>>)>(&self, visit: &mut F) {
        match self {
            Stmt::Bind(node) => visit(&node.expr),
            Stmt::Func(node) => visit(&node.func),
            Stmt::Class(_) => {}
            Stmt::Include(node) => {
                for arg in node.args.iter() {
                    visit(arg);
                }
            }
            Stmt::Import(_) => {}
            Stmt::If(node) => visit(&node.cond),
            Stmt::Res(node) => {
                visit(&node.name);
                for content in node.contents.iter() {
                    match content {
                        ResContent::Field(field) => {
                            visit(&field.value);
                            if let Some(cond) = &field.cond {
                                visit(cond);
                            }
                        }
                        ResContent::Edge(edge) => {
                            visit(&edge.half.name);
                            if let Some(cond) = &edge.cond {
                                visit(cond);
                            }
                        }
                        ResContent::Meta(meta) => {
                            visit(&meta.value);
                            if let Some(cond) = &meta.cond {
                                visit(cond);
                            }
                        }
                    }
                }
            }
            Stmt::Edge(node) => {
                for half in node.halves.iter() {
                    visit(&half.name);
                }
            }
        }
    }

    /// Copies this statement with fresh node ids, copying contained
    /// expressions via [`Expr::copy`].
    pub fn copy(&self, indexer: &Arc<AtomicUsize>) -> Stmt<'base> {
        match self {
            Stmt::Bind(node) => Stmt::Bind(BindStmt {
                id: next_id(indexer),
                name: node.name.clone(),
                expr: node.expr.copy(indexer),
            }),
            Stmt::Func(node) => Stmt::Func(FuncStmt {
                id: next_id(indexer),
                name: node.name.clone(),
                func: node.func.copy(indexer),
            }),
            Stmt::Class(node) => Stmt::Class(ClassStmt {
                id: next_id(indexer),
                name: node.name.clone(),
                params: node.params.clone(),
                body: Rc::new(node.body.copy(indexer)),
            }),
            Stmt::Include(node) => Stmt::Include(IncludeStmt {
                id: next_id(indexer),
                name: node.name.clone(),
                args: node.args.iter().map(|arg| arg.copy(indexer)).collect(),
                orig: node.orig,
            }),
            Stmt::Import(node) => Stmt::Import(ImportStmt {
                id: next_id(indexer),
                path: node.path.clone(),
                alias: node.alias.clone(),
            }),
            Stmt::If(node) => Stmt::If(IfStmt {
                id: next_id(indexer),
                cond: node.cond.copy(indexer),
                then: node.then.as_ref().map(|block| Rc::new(block.copy(indexer))),
                els: node.els.as_ref().map(|block| Rc::new(block.copy(indexer))),
            }),
            Stmt::Res(node) => Stmt::Res(ResStmt {
                id: next_id(indexer),
                kind: node.kind.clone(),
                name: node.name.copy(indexer),
                contents: node.contents.iter().map(|content| content.copy(indexer)).collect(),
            }),
            Stmt::Edge(node) => Stmt::Edge(EdgeStmt {
                id: next_id(indexer),
                halves: node.halves.iter().map(|half| half.copy(indexer)).collect(),
                notify: node.notify,
            }),
        }
    }
}

impl<'base> ResContent<'base> {
    fn copy(&self, indexer: &Arc<AtomicUsize>) -> ResContent<'base> {
        match self {
            ResContent::Field(field) => ResContent::Field(ResField {
                field: field.field.clone(),
                value: field.value.copy(indexer),
                cond: field.cond.as_ref().map(|cond| cond.copy(indexer)),
            }),
            ResContent::Edge(edge) => ResContent::Edge(ResEdge {
                property: edge.property,
                half: edge.half.copy(indexer),
                cond: edge.cond.as_ref().map(|cond| cond.copy(indexer)),
            }),
            ResContent::Meta(meta) => ResContent::Meta(ResMeta {
                property: meta.property.clone(),
                value: meta.value.copy(indexer),
                cond: meta.cond.as_ref().map(|cond| cond.copy(indexer)),
            }),
        }
    }
}

impl<'base> EdgeHalf<'base> {
    fn copy(&self, indexer: &Arc<AtomicUsize>) -> EdgeHalf<'base> {
        EdgeHalf {
            kind: self.kind.clone(),
            name: self.name.copy(indexer),
            field: self.field.clone(),
        }
    }
}

/// A statement sequence; the topmost node of every compilation unit and of
/// every nested block (if branches, class bodies).
///
/// The resolved local scope and the imported child programs are stored in
/// the compile context rather than on the node, keyed by [`NodeId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prog<'base> {
    /// Unique node id
    pub id: NodeId,
    /// Statements in source order
    pub stmts: Vec<Stmt<'base>>,
}

impl<'base> Prog<'base> {
    /// Copies this program with fresh node ids
    pub fn copy(&self, indexer: &Arc<AtomicUsize>) -> Prog<'base> {
        Prog {
            id: next_id(indexer),
            stmts: self.stmts.iter().map(|stmt| stmt.copy(indexer)).collect(),
        }
    }
}
