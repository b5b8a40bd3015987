/// Module for the arena-allocated syntax tree that every obfuscation pass operates on.
///
/// Nodes live in a single `Vec` owned by [`Ast`] and refer to their children through
/// [`NodeId`] indices. A node has exactly one parent; replacing a node means writing a new id
/// into the parent's slot, which leaves the old subtree detached but still allocated. The
/// enum of node kinds is closed, and both [`Node::children`] and [`Node::slots_mut`] match
/// every variant explicitly, so adding a kind without describing its slots is a compile error.
use serde::{Deserialize, Serialize};
use shroud_utils::errors::TransformError;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Index of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in the arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-semantic text attached to a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trivia {
    Comment(String),
    Whitespace(String),
}

/// Lexical token of a leaf node: the raw source text plus leading trivia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    #[serde(default)]
    pub trivia: Vec<Trivia>,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            trivia: Vec::new(),
        }
    }
}

/// Binary operators, also reused by compound assignments (`+=`, `.=`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    BoolAnd,
    BoolOr,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Spaceship,
    Coalesce,
}

impl BinOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Concat => ".",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::BoolAnd => "&&",
            Self::BoolOr => "||",
            Self::LogicalAnd => "and",
            Self::LogicalOr => "or",
            Self::LogicalXor => "xor",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Identical => "===",
            Self::NotIdentical => "!==",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Spaceship => "<=>",
            Self::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
    Plus,
    BitNot,
}

impl UnOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Plus => "+",
            Self::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastKind {
    Int,
    Float,
    String,
    Bool,
    Array,
    Object,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UseKind {
    #[default]
    Normal,
    Function,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Member and class modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_readonly: bool,
}

/// Every kind of node the obfuscator understands.
///
/// Child fields hold [`NodeId`]s. Leaf payloads (names, literals) are stored inline. Fields
/// named `stmts` always point at a [`Node::Block`], the statement-list node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum Node {
    // === Leaves ===
    /// Bare identifier: variable names (without `$`), declared names, member names, labels.
    Ident { name: String },
    /// Possibly qualified name reference (`Foo`, `Foo\Bar`, `\strlen`).
    Name { name: String },
    Int { value: i64 },
    Float { value: f64 },
    Str { value: String },
    InlineHtml { value: String },
    Nop,

    // === Statements ===
    /// Statement list.
    Block { stmts: Vec<NodeId> },
    Echo { exprs: Vec<NodeId> },
    Expression { expr: NodeId },
    Return { expr: Option<NodeId> },
    Throw { expr: NodeId },
    Break { levels: Option<NodeId> },
    Continue { levels: Option<NodeId> },
    Global { vars: Vec<NodeId> },
    Static { vars: Vec<NodeId> },
    StaticVar { var: NodeId, default: Option<NodeId> },
    Unset { vars: Vec<NodeId> },
    If {
        cond: NodeId,
        stmts: NodeId,
        #[serde(default)]
        elseifs: Vec<NodeId>,
        #[serde(default)]
        else_: Option<NodeId>,
    },
    ElseIf { cond: NodeId, stmts: NodeId },
    Else { stmts: NodeId },
    While { cond: NodeId, stmts: NodeId },
    DoWhile { stmts: NodeId, cond: NodeId },
    For {
        init: Vec<NodeId>,
        cond: Vec<NodeId>,
        step: Vec<NodeId>,
        stmts: NodeId,
    },
    Foreach {
        expr: NodeId,
        key: Option<NodeId>,
        value: NodeId,
        #[serde(default)]
        by_ref: bool,
        stmts: NodeId,
    },
    Switch { cond: NodeId, cases: Vec<NodeId> },
    /// `case cond:` or `default:` when `cond` is `None`.
    Case { cond: Option<NodeId>, stmts: NodeId },
    TryCatch {
        stmts: NodeId,
        catches: Vec<NodeId>,
        finally: Option<NodeId>,
    },
    Catch {
        types: Vec<NodeId>,
        var: Option<NodeId>,
        stmts: NodeId,
    },
    Finally { stmts: NodeId },
    Function {
        name: NodeId,
        params: Vec<NodeId>,
        stmts: NodeId,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        return_type: Option<NodeId>,
    },
    Class {
        name: NodeId,
        #[serde(default)]
        modifiers: Modifiers,
        extends: Option<NodeId>,
        #[serde(default)]
        implements: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    Interface {
        name: NodeId,
        #[serde(default)]
        extends: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    Trait { name: NodeId, members: Vec<NodeId> },
    ClassMethod {
        #[serde(default)]
        modifiers: Modifiers,
        name: NodeId,
        params: Vec<NodeId>,
        /// `None` for abstract and interface methods.
        stmts: Option<NodeId>,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        return_type: Option<NodeId>,
    },
    PropertyDecl {
        #[serde(default)]
        modifiers: Modifiers,
        #[serde(default)]
        type_hint: Option<NodeId>,
        props: Vec<NodeId>,
    },
    PropertyItem { name: NodeId, default: Option<NodeId> },
    ClassConstDecl {
        #[serde(default)]
        modifiers: Modifiers,
        consts: Vec<NodeId>,
    },
    ConstDecl { consts: Vec<NodeId> },
    ConstItem { name: NodeId, value: NodeId },
    TraitUse { traits: Vec<NodeId> },
    Namespace {
        name: Option<NodeId>,
        stmts: NodeId,
        #[serde(default)]
        braced: bool,
    },
    Use {
        #[serde(default)]
        kind: UseKind,
        uses: Vec<NodeId>,
    },
    UseItem { name: NodeId, alias: Option<NodeId> },
    Declare {
        declares: Vec<NodeId>,
        stmts: Option<NodeId>,
    },
    DeclareItem { key: NodeId, value: NodeId },
    Label { name: NodeId },
    Goto { name: NodeId },

    // === Expressions ===
    /// `$name` when `name` is an [`Node::Ident`], `${expr}` otherwise.
    Variable { name: NodeId },
    /// Double-quoted string with embedded expressions; literal fragments are `Str` nodes.
    Interpolated { parts: Vec<NodeId> },
    Array { items: Vec<NodeId> },
    ArrayItem {
        key: Option<NodeId>,
        value: NodeId,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        unpack: bool,
    },
    /// Destructuring target (`list($a, $b)` / `[$a, $b] = ...`); holes are `None`.
    List { items: Vec<Option<NodeId>> },
    ArrayDimFetch { var: NodeId, dim: Option<NodeId> },
    PropertyFetch {
        var: NodeId,
        name: NodeId,
        #[serde(default)]
        nullsafe: bool,
    },
    StaticPropertyFetch { class: NodeId, name: NodeId },
    ClassConstFetch { class: NodeId, name: NodeId },
    ConstFetch { name: NodeId },
    FuncCall { name: NodeId, args: Vec<NodeId> },
    MethodCall {
        var: NodeId,
        name: NodeId,
        args: Vec<NodeId>,
        #[serde(default)]
        nullsafe: bool,
    },
    StaticCall {
        class: NodeId,
        name: NodeId,
        args: Vec<NodeId>,
    },
    New { class: NodeId, args: Vec<NodeId> },
    Arg {
        value: NodeId,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        unpack: bool,
    },
    Assign { var: NodeId, expr: NodeId },
    AssignRef { var: NodeId, expr: NodeId },
    AssignOp { op: BinOp, var: NodeId, expr: NodeId },
    Binary { op: BinOp, left: NodeId, right: NodeId },
    Unary { op: UnOp, expr: NodeId },
    IncDec { op: IncDecOp, var: NodeId },
    Ternary {
        cond: NodeId,
        then: Option<NodeId>,
        else_: NodeId,
    },
    Isset { vars: Vec<NodeId> },
    Empty { expr: NodeId },
    Instanceof { expr: NodeId, class: NodeId },
    Cast { kind: CastKind, expr: NodeId },
    Closure {
        params: Vec<NodeId>,
        #[serde(default)]
        uses: Vec<NodeId>,
        stmts: NodeId,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        is_static: bool,
        #[serde(default)]
        return_type: Option<NodeId>,
    },
    ClosureUse {
        var: NodeId,
        #[serde(default)]
        by_ref: bool,
    },
    ArrowFn {
        params: Vec<NodeId>,
        expr: NodeId,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        is_static: bool,
        #[serde(default)]
        return_type: Option<NodeId>,
    },
    Param {
        var: NodeId,
        default: Option<NodeId>,
        #[serde(default)]
        type_hint: Option<NodeId>,
        #[serde(default)]
        by_ref: bool,
        #[serde(default)]
        variadic: bool,
    },
    Print { expr: NodeId },
    Exit { expr: Option<NodeId> },
    Include { kind: IncludeKind, expr: NodeId },
    ErrorSuppress { expr: NodeId },
    Clone { expr: NodeId },
}

impl Node {
    /// Stable kind name used in diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Ident { .. } => "Ident",
            Self::Name { .. } => "Name",
            Self::Int { .. } => "Int",
            Self::Float { .. } => "Float",
            Self::Str { .. } => "Str",
            Self::InlineHtml { .. } => "InlineHtml",
            Self::Nop => "Nop",
            Self::Block { .. } => "Block",
            Self::Echo { .. } => "Echo",
            Self::Expression { .. } => "Expression",
            Self::Return { .. } => "Return",
            Self::Throw { .. } => "Throw",
            Self::Break { .. } => "Break",
            Self::Continue { .. } => "Continue",
            Self::Global { .. } => "Global",
            Self::Static { .. } => "Static",
            Self::StaticVar { .. } => "StaticVar",
            Self::Unset { .. } => "Unset",
            Self::If { .. } => "If",
            Self::ElseIf { .. } => "ElseIf",
            Self::Else { .. } => "Else",
            Self::While { .. } => "While",
            Self::DoWhile { .. } => "DoWhile",
            Self::For { .. } => "For",
            Self::Foreach { .. } => "Foreach",
            Self::Switch { .. } => "Switch",
            Self::Case { .. } => "Case",
            Self::TryCatch { .. } => "TryCatch",
            Self::Catch { .. } => "Catch",
            Self::Finally { .. } => "Finally",
            Self::Function { .. } => "Function",
            Self::Class { .. } => "Class",
            Self::Interface { .. } => "Interface",
            Self::Trait { .. } => "Trait",
            Self::ClassMethod { .. } => "ClassMethod",
            Self::PropertyDecl { .. } => "PropertyDecl",
            Self::PropertyItem { .. } => "PropertyItem",
            Self::ClassConstDecl { .. } => "ClassConstDecl",
            Self::ConstDecl { .. } => "ConstDecl",
            Self::ConstItem { .. } => "ConstItem",
            Self::TraitUse { .. } => "TraitUse",
            Self::Namespace { .. } => "Namespace",
            Self::Use { .. } => "Use",
            Self::UseItem { .. } => "UseItem",
            Self::Declare { .. } => "Declare",
            Self::DeclareItem { .. } => "DeclareItem",
            Self::Label { .. } => "Label",
            Self::Goto { .. } => "Goto",
            Self::Variable { .. } => "Variable",
            Self::Interpolated { .. } => "Interpolated",
            Self::Array { .. } => "Array",
            Self::ArrayItem { .. } => "ArrayItem",
            Self::List { .. } => "List",
            Self::ArrayDimFetch { .. } => "ArrayDimFetch",
            Self::PropertyFetch { .. } => "PropertyFetch",
            Self::StaticPropertyFetch { .. } => "StaticPropertyFetch",
            Self::ClassConstFetch { .. } => "ClassConstFetch",
            Self::ConstFetch { .. } => "ConstFetch",
            Self::FuncCall { .. } => "FuncCall",
            Self::MethodCall { .. } => "MethodCall",
            Self::StaticCall { .. } => "StaticCall",
            Self::New { .. } => "New",
            Self::Arg { .. } => "Arg",
            Self::Assign { .. } => "Assign",
            Self::AssignRef { .. } => "AssignRef",
            Self::AssignOp { .. } => "AssignOp",
            Self::Binary { .. } => "Binary",
            Self::Unary { .. } => "Unary",
            Self::IncDec { .. } => "IncDec",
            Self::Ternary { .. } => "Ternary",
            Self::Isset { .. } => "Isset",
            Self::Empty { .. } => "Empty",
            Self::Instanceof { .. } => "Instanceof",
            Self::Cast { .. } => "Cast",
            Self::Closure { .. } => "Closure",
            Self::ClosureUse { .. } => "ClosureUse",
            Self::ArrowFn { .. } => "ArrowFn",
            Self::Param { .. } => "Param",
            Self::Print { .. } => "Print",
            Self::Exit { .. } => "Exit",
            Self::Include { .. } => "Include",
            Self::ErrorSuppress { .. } => "ErrorSuppress",
            Self::Clone { .. } => "Clone",
        }
    }

    /// Child ids in source order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self {
            Self::Ident { .. }
            | Self::Name { .. }
            | Self::Int { .. }
            | Self::Float { .. }
            | Self::Str { .. }
            | Self::InlineHtml { .. }
            | Self::Nop => {}
            Self::Block { stmts } => out.extend(stmts),
            Self::Echo { exprs } => out.extend(exprs),
            Self::Expression { expr }
            | Self::Throw { expr }
            | Self::Empty { expr }
            | Self::Print { expr }
            | Self::ErrorSuppress { expr }
            | Self::Clone { expr }
            | Self::Unary { expr, .. }
            | Self::Cast { expr, .. }
            | Self::Include { expr, .. } => out.push(*expr),
            Self::Return { expr } | Self::Exit { expr } => out.extend(expr),
            Self::Break { levels } | Self::Continue { levels } => out.extend(levels),
            Self::Global { vars } | Self::Static { vars } | Self::Unset { vars } => {
                out.extend(vars)
            }
            Self::Isset { vars } => out.extend(vars),
            Self::StaticVar { var, default } => {
                out.push(*var);
                out.extend(default);
            }
            Self::If {
                cond,
                stmts,
                elseifs,
                else_,
            } => {
                out.push(*cond);
                out.push(*stmts);
                out.extend(elseifs);
                out.extend(else_);
            }
            Self::ElseIf { cond, stmts } | Self::While { cond, stmts } => {
                out.push(*cond);
                out.push(*stmts);
            }
            Self::Else { stmts } | Self::Finally { stmts } => out.push(*stmts),
            Self::DoWhile { stmts, cond } => {
                out.push(*stmts);
                out.push(*cond);
            }
            Self::For {
                init,
                cond,
                step,
                stmts,
            } => {
                out.extend(init);
                out.extend(cond);
                out.extend(step);
                out.push(*stmts);
            }
            Self::Foreach {
                expr,
                key,
                value,
                stmts,
                ..
            } => {
                out.push(*expr);
                out.extend(key);
                out.push(*value);
                out.push(*stmts);
            }
            Self::Switch { cond, cases } => {
                out.push(*cond);
                out.extend(cases);
            }
            Self::Case { cond, stmts } => {
                out.extend(cond);
                out.push(*stmts);
            }
            Self::TryCatch {
                stmts,
                catches,
                finally,
            } => {
                out.push(*stmts);
                out.extend(catches);
                out.extend(finally);
            }
            Self::Catch { types, var, stmts } => {
                out.extend(types);
                out.extend(var);
                out.push(*stmts);
            }
            Self::Function {
                name,
                params,
                stmts,
                return_type,
                ..
            } => {
                out.push(*name);
                out.extend(params);
                out.extend(return_type);
                out.push(*stmts);
            }
            Self::Class {
                name,
                extends,
                implements,
                members,
                ..
            } => {
                out.push(*name);
                out.extend(extends);
                out.extend(implements);
                out.extend(members);
            }
            Self::Interface {
                name,
                extends,
                members,
            } => {
                out.push(*name);
                out.extend(extends);
                out.extend(members);
            }
            Self::Trait { name, members } => {
                out.push(*name);
                out.extend(members);
            }
            Self::ClassMethod {
                name,
                params,
                stmts,
                return_type,
                ..
            } => {
                out.push(*name);
                out.extend(params);
                out.extend(return_type);
                out.extend(stmts);
            }
            Self::PropertyDecl {
                type_hint, props, ..
            } => {
                out.extend(type_hint);
                out.extend(props);
            }
            Self::PropertyItem { name, default } => {
                out.push(*name);
                out.extend(default);
            }
            Self::ClassConstDecl { consts, .. } | Self::ConstDecl { consts } => {
                out.extend(consts)
            }
            Self::ConstItem { name, value } => {
                out.push(*name);
                out.push(*value);
            }
            Self::TraitUse { traits } => out.extend(traits),
            Self::Namespace { name, stmts, .. } => {
                out.extend(name);
                out.push(*stmts);
            }
            Self::Use { uses, .. } => out.extend(uses),
            Self::UseItem { name, alias } => {
                out.push(*name);
                out.extend(alias);
            }
            Self::Declare { declares, stmts } => {
                out.extend(declares);
                out.extend(stmts);
            }
            Self::DeclareItem { key, value } => {
                out.push(*key);
                out.push(*value);
            }
            Self::Label { name } | Self::Goto { name } | Self::ConstFetch { name } => {
                out.push(*name)
            }
            Self::Variable { name } => out.push(*name),
            Self::Interpolated { parts } => out.extend(parts),
            Self::Array { items } => out.extend(items),
            Self::ArrayItem { key, value, .. } => {
                out.extend(key);
                out.push(*value);
            }
            Self::List { items } => out.extend(items.iter().flatten()),
            Self::ArrayDimFetch { var, dim } => {
                out.push(*var);
                out.extend(dim);
            }
            Self::PropertyFetch { var, name, .. } => {
                out.push(*var);
                out.push(*name);
            }
            Self::StaticPropertyFetch { class, name } | Self::ClassConstFetch { class, name } => {
                out.push(*class);
                out.push(*name);
            }
            Self::FuncCall { name, args } => {
                out.push(*name);
                out.extend(args);
            }
            Self::MethodCall {
                var, name, args, ..
            } => {
                out.push(*var);
                out.push(*name);
                out.extend(args);
            }
            Self::StaticCall { class, name, args } => {
                out.push(*class);
                out.push(*name);
                out.extend(args);
            }
            Self::New { class, args } => {
                out.push(*class);
                out.extend(args);
            }
            Self::Arg { value, .. } => out.push(*value),
            Self::Assign { var, expr }
            | Self::AssignRef { var, expr }
            | Self::AssignOp { var, expr, .. } => {
                out.push(*var);
                out.push(*expr);
            }
            Self::Binary { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            Self::IncDec { var, .. } => out.push(*var),
            Self::Ternary { cond, then, else_ } => {
                out.push(*cond);
                out.extend(then);
                out.push(*else_);
            }
            Self::Instanceof { expr, class } => {
                out.push(*expr);
                out.push(*class);
            }
            Self::Closure {
                params,
                uses,
                stmts,
                return_type,
                ..
            } => {
                out.extend(params);
                out.extend(uses);
                out.extend(return_type);
                out.push(*stmts);
            }
            Self::ClosureUse { var, .. } => out.push(*var),
            Self::ArrowFn {
                params,
                expr,
                return_type,
                ..
            } => {
                out.extend(params);
                out.extend(return_type);
                out.push(*expr);
            }
            Self::Param {
                var,
                default,
                type_hint,
                ..
            } => {
                out.extend(type_hint);
                out.push(*var);
                out.extend(default);
            }
        }
        out
    }

    /// Mutable references to every child slot, in the same order as [`Node::children`].
    pub fn slots_mut(&mut self) -> Vec<&mut NodeId> {
        let mut out: Vec<&mut NodeId> = Vec::new();
        match self {
            Self::Ident { .. }
            | Self::Name { .. }
            | Self::Int { .. }
            | Self::Float { .. }
            | Self::Str { .. }
            | Self::InlineHtml { .. }
            | Self::Nop => {}
            Self::Block { stmts } => out.extend(stmts.iter_mut()),
            Self::Echo { exprs } => out.extend(exprs.iter_mut()),
            Self::Expression { expr }
            | Self::Throw { expr }
            | Self::Empty { expr }
            | Self::Print { expr }
            | Self::ErrorSuppress { expr }
            | Self::Clone { expr }
            | Self::Unary { expr, .. }
            | Self::Cast { expr, .. }
            | Self::Include { expr, .. } => out.push(expr),
            Self::Return { expr } | Self::Exit { expr } => out.extend(expr.as_mut()),
            Self::Break { levels } | Self::Continue { levels } => out.extend(levels.as_mut()),
            Self::Global { vars } | Self::Static { vars } | Self::Unset { vars } => {
                out.extend(vars.iter_mut())
            }
            Self::Isset { vars } => out.extend(vars.iter_mut()),
            Self::StaticVar { var, default } => {
                out.push(var);
                out.extend(default.as_mut());
            }
            Self::If {
                cond,
                stmts,
                elseifs,
                else_,
            } => {
                out.push(cond);
                out.push(stmts);
                out.extend(elseifs.iter_mut());
                out.extend(else_.as_mut());
            }
            Self::ElseIf { cond, stmts } | Self::While { cond, stmts } => {
                out.push(cond);
                out.push(stmts);
            }
            Self::Else { stmts } | Self::Finally { stmts } => out.push(stmts),
            Self::DoWhile { stmts, cond } => {
                out.push(stmts);
                out.push(cond);
            }
            Self::For {
                init,
                cond,
                step,
                stmts,
            } => {
                out.extend(init.iter_mut());
                out.extend(cond.iter_mut());
                out.extend(step.iter_mut());
                out.push(stmts);
            }
            Self::Foreach {
                expr,
                key,
                value,
                stmts,
                ..
            } => {
                out.push(expr);
                out.extend(key.as_mut());
                out.push(value);
                out.push(stmts);
            }
            Self::Switch { cond, cases } => {
                out.push(cond);
                out.extend(cases.iter_mut());
            }
            Self::Case { cond, stmts } => {
                out.extend(cond.as_mut());
                out.push(stmts);
            }
            Self::TryCatch {
                stmts,
                catches,
                finally,
            } => {
                out.push(stmts);
                out.extend(catches.iter_mut());
                out.extend(finally.as_mut());
            }
            Self::Catch { types, var, stmts } => {
                out.extend(types.iter_mut());
                out.extend(var.as_mut());
                out.push(stmts);
            }
            Self::Function {
                name,
                params,
                stmts,
                return_type,
                ..
            } => {
                out.push(name);
                out.extend(params.iter_mut());
                out.extend(return_type.as_mut());
                out.push(stmts);
            }
            Self::Class {
                name,
                extends,
                implements,
                members,
                ..
            } => {
                out.push(name);
                out.extend(extends.as_mut());
                out.extend(implements.iter_mut());
                out.extend(members.iter_mut());
            }
            Self::Interface {
                name,
                extends,
                members,
            } => {
                out.push(name);
                out.extend(extends.iter_mut());
                out.extend(members.iter_mut());
            }
            Self::Trait { name, members } => {
                out.push(name);
                out.extend(members.iter_mut());
            }
            Self::ClassMethod {
                name,
                params,
                stmts,
                return_type,
                ..
            } => {
                out.push(name);
                out.extend(params.iter_mut());
                out.extend(return_type.as_mut());
                out.extend(stmts.as_mut());
            }
            Self::PropertyDecl {
                type_hint, props, ..
            } => {
                out.extend(type_hint.as_mut());
                out.extend(props.iter_mut());
            }
            Self::PropertyItem { name, default } => {
                out.push(name);
                out.extend(default.as_mut());
            }
            Self::ClassConstDecl { consts, .. } | Self::ConstDecl { consts } => {
                out.extend(consts.iter_mut())
            }
            Self::ConstItem { name, value } => {
                out.push(name);
                out.push(value);
            }
            Self::TraitUse { traits } => out.extend(traits.iter_mut()),
            Self::Namespace { name, stmts, .. } => {
                out.extend(name.as_mut());
                out.push(stmts);
            }
            Self::Use { uses, .. } => out.extend(uses.iter_mut()),
            Self::UseItem { name, alias } => {
                out.push(name);
                out.extend(alias.as_mut());
            }
            Self::Declare { declares, stmts } => {
                out.extend(declares.iter_mut());
                out.extend(stmts.as_mut());
            }
            Self::DeclareItem { key, value } => {
                out.push(key);
                out.push(value);
            }
            Self::Label { name } | Self::Goto { name } | Self::ConstFetch { name } => {
                out.push(name)
            }
            Self::Variable { name } => out.push(name),
            Self::Interpolated { parts } => out.extend(parts.iter_mut()),
            Self::Array { items } => out.extend(items.iter_mut()),
            Self::ArrayItem { key, value, .. } => {
                out.extend(key.as_mut());
                out.push(value);
            }
            Self::List { items } => out.extend(items.iter_mut().flatten()),
            Self::ArrayDimFetch { var, dim } => {
                out.push(var);
                out.extend(dim.as_mut());
            }
            Self::PropertyFetch { var, name, .. } => {
                out.push(var);
                out.push(name);
            }
            Self::StaticPropertyFetch { class, name } | Self::ClassConstFetch { class, name } => {
                out.push(class);
                out.push(name);
            }
            Self::FuncCall { name, args } => {
                out.push(name);
                out.extend(args.iter_mut());
            }
            Self::MethodCall {
                var, name, args, ..
            } => {
                out.push(var);
                out.push(name);
                out.extend(args.iter_mut());
            }
            Self::StaticCall { class, name, args } => {
                out.push(class);
                out.push(name);
                out.extend(args.iter_mut());
            }
            Self::New { class, args } => {
                out.push(class);
                out.extend(args.iter_mut());
            }
            Self::Arg { value, .. } => out.push(value),
            Self::Assign { var, expr }
            | Self::AssignRef { var, expr }
            | Self::AssignOp { var, expr, .. } => {
                out.push(var);
                out.push(expr);
            }
            Self::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Self::IncDec { var, .. } => out.push(var),
            Self::Ternary { cond, then, else_ } => {
                out.push(cond);
                out.extend(then.as_mut());
                out.push(else_);
            }
            Self::Instanceof { expr, class } => {
                out.push(expr);
                out.push(class);
            }
            Self::Closure {
                params,
                uses,
                stmts,
                return_type,
                ..
            } => {
                out.extend(params.iter_mut());
                out.extend(uses.iter_mut());
                out.extend(return_type.as_mut());
                out.push(stmts);
            }
            Self::ClosureUse { var, .. } => out.push(var),
            Self::ArrowFn {
                params,
                expr,
                return_type,
                ..
            } => {
                out.extend(params.iter_mut());
                out.extend(return_type.as_mut());
                out.push(expr);
            }
            Self::Param {
                var,
                default,
                type_hint,
                ..
            } => {
                out.extend(type_hint.as_mut());
                out.push(var);
                out.extend(default.as_mut());
            }
        }
        out
    }

    /// Writes `replacement` into the slot currently holding `original`.
    ///
    /// Returns `false` when `original` is not a child of this node.
    pub fn replace_child(&mut self, original: NodeId, replacement: NodeId) -> bool {
        match self.slots_mut().into_iter().find(|slot| **slot == original) {
            Some(slot) => {
                *slot = replacement;
                true
            }
            None => false,
        }
    }

    /// True for nodes that may appear directly in a statement list.
    pub const fn is_statement(&self) -> bool {
        matches!(
            self,
            Self::Block { .. }
                | Self::Echo { .. }
                | Self::Expression { .. }
                | Self::Return { .. }
                | Self::Throw { .. }
                | Self::Break { .. }
                | Self::Continue { .. }
                | Self::Global { .. }
                | Self::Static { .. }
                | Self::Unset { .. }
                | Self::If { .. }
                | Self::While { .. }
                | Self::DoWhile { .. }
                | Self::For { .. }
                | Self::Foreach { .. }
                | Self::Switch { .. }
                | Self::TryCatch { .. }
                | Self::Function { .. }
                | Self::Class { .. }
                | Self::Interface { .. }
                | Self::Trait { .. }
                | Self::ConstDecl { .. }
                | Self::Namespace { .. }
                | Self::Use { .. }
                | Self::Declare { .. }
                | Self::Label { .. }
                | Self::Goto { .. }
                | Self::InlineHtml { .. }
                | Self::Nop
        )
    }
}

/// Arena slot: the node plus its optional lexical token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

/// The syntax tree of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    /// Creates a tree whose root is an empty statement list.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: Node::Block { stmts: Vec::new() },
                token: None,
            }],
            root: NodeId(0),
        }
    }

    pub const fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    /// Allocates a node and returns its id.
    pub fn alloc(&mut self, kind: Node) -> NodeId {
        self.push(NodeData { kind, token: None })
    }

    pub fn alloc_with_token(&mut self, kind: Node, token: Token) -> NodeId {
        self.push(NodeData {
            kind,
            token: Some(token),
        })
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    /// Number of allocated nodes, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).map(|d| &d.kind)
    }

    pub fn token(&self, id: NodeId) -> Option<&Token> {
        self.nodes.get(id.index()).and_then(|d| d.token.as_ref())
    }

    pub fn token_mut(&mut self, id: NodeId) -> Option<&mut Token> {
        self.nodes.get_mut(id.index()).and_then(|d| d.token.as_mut())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self[id].children()
    }

    /// Statements of a [`Node::Block`]; empty for any other kind.
    pub fn stmts(&self, block: NodeId) -> &[NodeId] {
        match &self[block] {
            Node::Block { stmts } => stmts,
            _ => &[],
        }
    }

    /// Text of an [`Node::Ident`] or [`Node::Name`] leaf.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        match &self[id] {
            Node::Ident { name } | Node::Name { name } => Some(name),
            _ => None,
        }
    }

    /// Name of a plain `$name` variable; `None` for variable-variables.
    pub fn var_name(&self, id: NodeId) -> Option<&str> {
        match &self[id] {
            Node::Variable { name } => match &self[*name] {
                Node::Ident { name } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Node ids reachable from `from` in depth-first pre-order.
    pub fn pre_order(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.children(id);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Node ids reachable from `from` in depth-first post-order (children before parents).
    pub fn post_order(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(from, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.children(id).into_iter().rev() {
                stack.push((child, false));
            }
        }
        out
    }

    /// Copies the subtree rooted at `id` into fresh arena slots.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let mut data = self.nodes[id.index()].clone();
        let children = data.kind.children();
        let mut copies = Vec::with_capacity(children.len());
        for child in children {
            copies.push(self.deep_clone(child));
        }
        for (slot, copy) in data.kind.slots_mut().into_iter().zip(copies) {
            *slot = copy;
        }
        self.push(data)
    }

    /// Checks that every child id is in range and that no node is reachable twice.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.root.index() >= self.nodes.len() {
            return Err(TransformError::InvalidTree(format!(
                "root {} out of range",
                self.root
            )));
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if seen[id.index()] {
                return Err(TransformError::InvalidTree(format!(
                    "node {id} reachable from more than one parent"
                )));
            }
            seen[id.index()] = true;
            for child in self.children(id) {
                if child.index() >= self.nodes.len() {
                    return Err(TransformError::InvalidTree(format!(
                        "node {id} refers to missing child {child}"
                    )));
                }
                stack.push(child);
            }
        }
        Ok(())
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()].kind
    }
}

impl IndexMut<NodeId> for Ast {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()].kind
    }
}
