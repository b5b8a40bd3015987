/// Module for turning an [`Ast`] back into PHP source text.
///
/// The printer favours unambiguous output over faithful formatting: any compound expression
/// used as an operand is parenthesised, strings are single-quoted, and interpolated strings
/// fall back to concatenation when an embedded expression cannot live inside `{$...}`.
/// Comments survive only when [`PrintOptions::preserve_comments`] is set.
use crate::ast::{Ast, CastKind, IncDecOp, IncludeKind, Modifiers, Node, NodeId, Trivia, UseKind, Visibility};
use tracing::warn;

/// Formatting options for [`Printer`].
#[derive(Debug, Clone)]
pub struct PrintOptions {
    /// Indentation unit.
    pub indent: String,
    /// Emit comment trivia attached to tokens.
    pub preserve_comments: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            preserve_comments: false,
        }
    }
}

/// Prints `ast` with default options.
pub fn print(ast: &Ast) -> String {
    Printer::new(ast, PrintOptions::default()).print()
}

/// Prints a single expression node; used by tests and diagnostics.
pub fn print_expr(ast: &Ast, id: NodeId) -> String {
    Printer::new(ast, PrintOptions::default()).expr(id)
}

#[derive(Debug)]
pub struct Printer<'a> {
    ast: &'a Ast,
    options: PrintOptions,
    out: String,
    level: usize,
}

impl<'a> Printer<'a> {
    pub fn new(ast: &'a Ast, options: PrintOptions) -> Self {
        Self {
            ast,
            options,
            out: String::new(),
            level: 0,
        }
    }

    /// Renders the whole file, starting with the `<?php` open tag.
    pub fn print(mut self) -> String {
        let ast = self.ast;
        let root = ast.root();
        let stmts = match &ast[root] {
            Node::Block { stmts } => stmts.clone(),
            _ => vec![root],
        };
        let mut in_php = false;
        for stmt in stmts {
            if let Node::InlineHtml { value } = &ast[stmt] {
                if in_php {
                    self.out.push_str("?>");
                }
                self.out.push_str(value);
                in_php = false;
                continue;
            }
            if !in_php {
                self.out.push_str("<?php\n");
                in_php = true;
            }
            self.stmt(stmt);
        }
        self.out
    }

    fn indent(&mut self) {
        for _ in 0..self.level {
            self.out.push_str(&self.options.indent);
        }
    }

    fn line(&mut self, text: &str) {
        self.indent();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn comments(&mut self, stmt: NodeId) {
        if !self.options.preserve_comments {
            return;
        }
        let first = self
            .ast
            .pre_order(stmt)
            .into_iter()
            .find_map(|id| self.ast.token(id));
        let Some(token) = first else {
            return;
        };
        let comments: Vec<String> = token
            .trivia
            .iter()
            .filter_map(|t| match t {
                Trivia::Comment(c) => Some(c.trim_end().to_string()),
                Trivia::Whitespace(_) => None,
            })
            .collect();
        for c in comments {
            self.line(&c);
        }
    }

    /// Prints the statements of a block at one deeper indentation level.
    fn body(&mut self, block: NodeId) {
        self.level += 1;
        let ast = self.ast;
        match &ast[block] {
            Node::Block { stmts } => {
                for stmt in stmts {
                    self.stmt(*stmt);
                }
            }
            _ => self.stmt(block),
        }
        self.level -= 1;
    }

    /// Renders `{ ... }` contents into a string, for closures embedded in expressions.
    fn body_string(&mut self, block: NodeId) -> String {
        let saved = std::mem::take(&mut self.out);
        self.body(block);
        let body = std::mem::replace(&mut self.out, saved);
        let mut s = String::from("{\n");
        s.push_str(&body);
        for _ in 0..self.level {
            s.push_str(&self.options.indent);
        }
        s.push('}');
        s
    }

    fn stmt(&mut self, id: NodeId) {
        self.comments(id);
        let ast = self.ast;
        match &ast[id] {
            Node::Nop => {}
            Node::InlineHtml { value } => {
                self.out.push_str("?>");
                self.out.push_str(value);
                self.out.push_str("<?php\n");
            }
            Node::Block { .. } => {
                self.line("{");
                self.body(id);
                self.line("}");
            }
            Node::Echo { exprs } => {
                let parts = self.list(exprs);
                self.line(&format!("echo {parts};"));
            }
            Node::Expression { expr } => {
                let e = self.expr(*expr);
                self.line(&format!("{e};"));
            }
            Node::Return { expr } => match expr {
                Some(e) => {
                    let e = self.expr(*e);
                    self.line(&format!("return {e};"));
                }
                None => self.line("return;"),
            },
            Node::Throw { expr } => {
                let e = self.expr(*expr);
                self.line(&format!("throw {e};"));
            }
            Node::Break { levels } | Node::Continue { levels } => {
                let kw = if matches!(ast[id], Node::Break { .. }) {
                    "break"
                } else {
                    "continue"
                };
                match levels {
                    Some(l) => {
                        let l = self.expr(*l);
                        self.line(&format!("{kw} {l};"));
                    }
                    None => self.line(&format!("{kw};")),
                }
            }
            Node::Global { vars } => {
                let vars = self.list(vars);
                self.line(&format!("global {vars};"));
            }
            Node::Static { vars } => {
                let vars = self.list(vars);
                self.line(&format!("static {vars};"));
            }
            Node::Unset { vars } => {
                let vars = self.list(vars);
                self.line(&format!("unset({vars});"));
            }
            Node::If {
                cond,
                stmts,
                elseifs,
                else_,
            } => {
                let c = self.expr(*cond);
                self.line(&format!("if ({c}) {{"));
                self.body(*stmts);
                for elseif in elseifs {
                    if let Node::ElseIf { cond, stmts } = &ast[*elseif] {
                        let c = self.expr(*cond);
                        self.line(&format!("}} elseif ({c}) {{"));
                        self.body(*stmts);
                    }
                }
                if let Some(else_) = else_ {
                    if let Node::Else { stmts } = &ast[*else_] {
                        self.line("} else {");
                        self.body(*stmts);
                    }
                }
                self.line("}");
            }
            Node::While { cond, stmts } => {
                let c = self.expr(*cond);
                self.line(&format!("while ({c}) {{"));
                self.body(*stmts);
                self.line("}");
            }
            Node::DoWhile { stmts, cond } => {
                self.line("do {");
                self.body(*stmts);
                let c = self.expr(*cond);
                self.line(&format!("}} while ({c});"));
            }
            Node::For {
                init,
                cond,
                step,
                stmts,
            } => {
                let i = self.list(init);
                let c = self.list(cond);
                let s = self.list(step);
                self.line(&format!("for ({i}; {c}; {s}) {{"));
                self.body(*stmts);
                self.line("}");
            }
            Node::Foreach {
                expr,
                key,
                value,
                by_ref,
                stmts,
            } => {
                let e = self.expr(*expr);
                let k = key.map(|k| format!("{} => ", self.expr(k))).unwrap_or_default();
                let r = if *by_ref { "&" } else { "" };
                let v = self.expr(*value);
                self.line(&format!("foreach ({e} as {k}{r}{v}) {{"));
                self.body(*stmts);
                self.line("}");
            }
            Node::Switch { cond, cases } => {
                let c = self.expr(*cond);
                self.line(&format!("switch ({c}) {{"));
                self.level += 1;
                for case in cases {
                    if let Node::Case { cond, stmts } = &ast[*case] {
                        match cond {
                            Some(c) => {
                                let c = self.expr(*c);
                                self.line(&format!("case {c}:"));
                            }
                            None => self.line("default:"),
                        }
                        self.body(*stmts);
                    }
                }
                self.level -= 1;
                self.line("}");
            }
            Node::TryCatch {
                stmts,
                catches,
                finally,
            } => {
                self.line("try {");
                self.body(*stmts);
                for catch in catches {
                    if let Node::Catch { types, var, stmts } = &ast[*catch] {
                        let types: Vec<String> = types.iter().map(|t| self.expr(*t)).collect();
                        let var = var.map(|v| format!(" {}", self.expr(v))).unwrap_or_default();
                        self.line(&format!("}} catch ({}{var}) {{", types.join(" | ")));
                        self.body(*stmts);
                    }
                }
                if let Some(finally) = finally {
                    if let Node::Finally { stmts } = &ast[*finally] {
                        self.line("} finally {");
                        self.body(*stmts);
                    }
                }
                self.line("}");
            }
            Node::Function {
                name,
                params,
                stmts,
                by_ref,
                return_type,
            } => {
                let sig = self.signature(*name, params, *by_ref, *return_type);
                self.line(&format!("function {sig} {{"));
                self.body(*stmts);
                self.line("}");
            }
            Node::Class {
                name,
                modifiers,
                extends,
                implements,
                members,
            } => {
                let mut head = modifier_prefix(modifiers);
                head.push_str("class ");
                head.push_str(&self.expr(*name));
                if let Some(parent) = extends {
                    head.push_str(" extends ");
                    head.push_str(&self.expr(*parent));
                }
                if !implements.is_empty() {
                    head.push_str(" implements ");
                    head.push_str(&self.list(implements));
                }
                self.class_like(&head, members);
            }
            Node::Interface {
                name,
                extends,
                members,
            } => {
                let mut head = format!("interface {}", self.expr(*name));
                if !extends.is_empty() {
                    head.push_str(" extends ");
                    head.push_str(&self.list(extends));
                }
                self.class_like(&head, members);
            }
            Node::Trait { name, members } => {
                let head = format!("trait {}", self.expr(*name));
                self.class_like(&head, members);
            }
            Node::ClassMethod {
                modifiers,
                name,
                params,
                stmts,
                by_ref,
                return_type,
            } => {
                let sig = self.signature(*name, params, *by_ref, *return_type);
                let prefix = modifier_prefix(modifiers);
                match stmts {
                    Some(body) => {
                        self.line(&format!("{prefix}function {sig} {{"));
                        self.body(*body);
                        self.line("}");
                    }
                    None => self.line(&format!("{prefix}function {sig};")),
                }
            }
            Node::PropertyDecl {
                modifiers,
                type_hint,
                props,
            } => {
                let mut prefix = modifier_prefix(modifiers);
                if prefix.is_empty() {
                    prefix.push_str("public ");
                }
                if let Some(t) = type_hint {
                    prefix.push_str(&self.expr(*t));
                    prefix.push(' ');
                }
                let props = self.list(props);
                self.line(&format!("{prefix}{props};"));
            }
            Node::ClassConstDecl { modifiers, consts } => {
                let prefix = modifier_prefix(modifiers);
                let consts = self.list(consts);
                self.line(&format!("{prefix}const {consts};"));
            }
            Node::ConstDecl { consts } => {
                let consts = self.list(consts);
                self.line(&format!("const {consts};"));
            }
            Node::TraitUse { traits } => {
                let traits = self.list(traits);
                self.line(&format!("use {traits};"));
            }
            Node::Namespace {
                name,
                stmts,
                braced,
            } => {
                let name = name.map(|n| format!(" {}", self.expr(n))).unwrap_or_default();
                if *braced {
                    self.line(&format!("namespace{name} {{"));
                    self.body(*stmts);
                    self.line("}");
                } else {
                    self.line(&format!("namespace{name};"));
                    for stmt in ast.stmts(*stmts).to_vec() {
                        self.stmt(stmt);
                    }
                }
            }
            Node::Use { kind, uses } => {
                let kw = match kind {
                    UseKind::Normal => "use ",
                    UseKind::Function => "use function ",
                    UseKind::Const => "use const ",
                };
                let uses = self.list(uses);
                self.line(&format!("{kw}{uses};"));
            }
            Node::Declare { declares, stmts } => {
                let declares = self.list(declares);
                match stmts {
                    Some(body) => {
                        self.line(&format!("declare({declares}) {{"));
                        self.body(*body);
                        self.line("}");
                    }
                    None => self.line(&format!("declare({declares});")),
                }
            }
            Node::Label { name } => {
                let n = self.expr(*name);
                self.line(&format!("{n}:"));
            }
            Node::Goto { name } => {
                let n = self.expr(*name);
                self.line(&format!("goto {n};"));
            }
            _ => {
                let e = self.expr(id);
                self.line(&format!("{e};"));
            }
        }
    }

    fn class_like(&mut self, head: &str, members: &[NodeId]) {
        self.line(&format!("{head} {{"));
        self.level += 1;
        for member in members {
            self.stmt(*member);
        }
        self.level -= 1;
        self.line("}");
    }

    fn signature(
        &mut self,
        name: NodeId,
        params: &[NodeId],
        by_ref: bool,
        return_type: Option<NodeId>,
    ) -> String {
        let r = if by_ref { "&" } else { "" };
        let name = self.expr(name);
        let params = self.list(params);
        let ret = return_type
            .map(|t| format!(": {}", self.expr(t)))
            .unwrap_or_default();
        format!("{r}{name}({params}){ret}")
    }

    fn list(&mut self, ids: &[NodeId]) -> String {
        ids.iter()
            .map(|id| self.expr(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Prints an expression, parenthesising it when it is compound.
    fn operand(&mut self, id: NodeId) -> String {
        let s = self.expr(id);
        if needs_parens(&self.ast[id]) {
            format!("({s})")
        } else {
            s
        }
    }

    /// Prints the base of `->`, `::` and `[...]`, parenthesising anything but a variable chain.
    fn deref(&mut self, id: NodeId) -> String {
        let s = self.expr(id);
        match &self.ast[id] {
            Node::Variable { .. }
            | Node::ArrayDimFetch { .. }
            | Node::PropertyFetch { .. }
            | Node::StaticPropertyFetch { .. }
            | Node::FuncCall { .. }
            | Node::MethodCall { .. }
            | Node::StaticCall { .. }
            | Node::Name { .. }
            | Node::Array { .. } => s,
            Node::Str { .. } => s,
            _ => format!("({s})"),
        }
    }

    /// Prints a member name: identifiers verbatim, expressions in braces.
    fn member(&mut self, id: NodeId) -> String {
        let ast = self.ast;
        match &ast[id] {
            Node::Ident { name } => name.clone(),
            Node::Variable { .. } => self.expr(id),
            _ => format!("{{{}}}", self.expr(id)),
        }
    }

    fn class_ref(&mut self, id: NodeId) -> String {
        let ast = self.ast;
        match &ast[id] {
            Node::Name { name } => name.clone(),
            _ => self.deref(id),
        }
    }

    fn args(&mut self, args: &[NodeId]) -> String {
        format!("({})", self.list(args))
    }

    pub fn expr(&mut self, id: NodeId) -> String {
        let ast = self.ast;
        match &ast[id] {
            Node::Ident { name } | Node::Name { name } => name.clone(),
            Node::Int { value } => {
                if *value == i64::MIN {
                    "(-9223372036854775807 - 1)".to_string()
                } else {
                    value.to_string()
                }
            }
            Node::Float { value } => float_literal(*value),
            Node::Str { value } => single_quoted(value),
            Node::InlineHtml { value } => single_quoted(value),
            Node::Nop => String::new(),
            Node::Variable { name } => match &ast[*name] {
                Node::Ident { name } => format!("${name}"),
                Node::Variable { .. } => format!("${}", self.expr(*name)),
                _ => format!("${{{}}}", self.expr(*name)),
            },
            Node::Interpolated { parts } => self.interpolated(parts),
            Node::Array { items } => format!("[{}]", self.list(items)),
            Node::ArrayItem {
                key,
                value,
                by_ref,
                unpack,
            } => {
                let mut s = String::new();
                if let Some(k) = key {
                    s.push_str(&self.expr(*k));
                    s.push_str(" => ");
                }
                if *unpack {
                    s.push_str("...");
                }
                if *by_ref {
                    s.push('&');
                }
                s.push_str(&self.expr(*value));
                s
            }
            Node::List { items } => {
                let items: Vec<String> = items
                    .iter()
                    .map(|item| item.map(|i| self.expr(i)).unwrap_or_default())
                    .collect();
                format!("[{}]", items.join(", "))
            }
            Node::ArrayDimFetch { var, dim } => {
                let base = self.deref(*var);
                let dim = dim.map(|d| self.expr(d)).unwrap_or_default();
                format!("{base}[{dim}]")
            }
            Node::PropertyFetch {
                var,
                name,
                nullsafe,
            } => {
                let base = self.deref(*var);
                let arrow = if *nullsafe { "?->" } else { "->" };
                let name = self.member(*name);
                format!("{base}{arrow}{name}")
            }
            Node::StaticPropertyFetch { class, name } => {
                let class = self.class_ref(*class);
                let name = match &ast[*name] {
                    Node::Ident { name } => format!("${name}"),
                    _ => self.expr(*name),
                };
                format!("{class}::{name}")
            }
            Node::ClassConstFetch { class, name } => {
                let class = self.class_ref(*class);
                let name = self.member(*name);
                format!("{class}::{name}")
            }
            Node::ConstFetch { name } => self.expr(*name),
            Node::FuncCall { name, args } => {
                let callee = match &ast[*name] {
                    Node::Name { name } => name.clone(),
                    _ => self.deref(*name),
                };
                let args = self.args(args);
                format!("{callee}{args}")
            }
            Node::MethodCall {
                var,
                name,
                args,
                nullsafe,
            } => {
                let base = self.deref(*var);
                let arrow = if *nullsafe { "?->" } else { "->" };
                let name = self.member(*name);
                let args = self.args(args);
                format!("{base}{arrow}{name}{args}")
            }
            Node::StaticCall { class, name, args } => {
                let class = self.class_ref(*class);
                let name = self.member(*name);
                let args = self.args(args);
                format!("{class}::{name}{args}")
            }
            Node::New { class, args } => {
                let class = match &ast[*class] {
                    Node::Name { name } => name.clone(),
                    Node::Variable { .. } => self.expr(*class),
                    _ => format!("({})", self.expr(*class)),
                };
                let args = self.args(args);
                format!("new {class}{args}")
            }
            Node::Arg { value, unpack, .. } => {
                let v = self.expr(*value);
                if *unpack {
                    format!("...{v}")
                } else {
                    v
                }
            }
            Node::Assign { var, expr } => {
                let l = self.expr(*var);
                let r = self.expr(*expr);
                format!("{l} = {r}")
            }
            Node::AssignRef { var, expr } => {
                let l = self.expr(*var);
                let r = self.expr(*expr);
                format!("{l} =& {r}")
            }
            Node::AssignOp { op, var, expr } => {
                let l = self.expr(*var);
                let r = self.expr(*expr);
                format!("{l} {}= {r}", op.symbol())
            }
            Node::Binary { op, left, right } => {
                let l = self.operand(*left);
                let r = self.operand(*right);
                format!("{l} {} {r}", op.symbol())
            }
            Node::Unary { op, expr } => {
                let e = self.operand(*expr);
                format!("{}{e}", op.symbol())
            }
            Node::IncDec { op, var } => {
                let v = self.expr(*var);
                match op {
                    IncDecOp::PreInc => format!("++{v}"),
                    IncDecOp::PreDec => format!("--{v}"),
                    IncDecOp::PostInc => format!("{v}++"),
                    IncDecOp::PostDec => format!("{v}--"),
                }
            }
            Node::Ternary { cond, then, else_ } => {
                let c = self.operand(*cond);
                let e = self.operand(*else_);
                match then {
                    Some(t) => {
                        let t = self.operand(*t);
                        format!("{c} ? {t} : {e}")
                    }
                    None => format!("{c} ?: {e}"),
                }
            }
            Node::Isset { vars } => format!("isset({})", self.list(vars)),
            Node::Empty { expr } => format!("empty({})", self.expr(*expr)),
            Node::Instanceof { expr, class } => {
                let e = self.operand(*expr);
                let c = self.class_ref(*class);
                format!("{e} instanceof {c}")
            }
            Node::Cast { kind, expr } => {
                let e = self.operand(*expr);
                let k = match kind {
                    CastKind::Int => "int",
                    CastKind::Float => "float",
                    CastKind::String => "string",
                    CastKind::Bool => "bool",
                    CastKind::Array => "array",
                    CastKind::Object => "object",
                    CastKind::Unset => "unset",
                };
                format!("({k}) {e}")
            }
            Node::Closure {
                params,
                uses,
                stmts,
                by_ref,
                is_static,
                return_type,
            } => {
                let st = if *is_static { "static " } else { "" };
                let r = if *by_ref { "&" } else { "" };
                let params = self.list(params);
                let uses = if uses.is_empty() {
                    String::new()
                } else {
                    format!(" use ({})", self.list(uses))
                };
                let ret = return_type
                    .map(|t| format!(": {}", self.expr(t)))
                    .unwrap_or_default();
                let body = self.body_string(*stmts);
                format!("{st}function {r}({params}){uses}{ret} {body}")
            }
            Node::ClosureUse { var, by_ref } => {
                let v = self.expr(*var);
                if *by_ref {
                    format!("&{v}")
                } else {
                    v
                }
            }
            Node::ArrowFn {
                params,
                expr,
                by_ref,
                is_static,
                return_type,
            } => {
                let st = if *is_static { "static " } else { "" };
                let r = if *by_ref { "&" } else { "" };
                let params = self.list(params);
                let ret = return_type
                    .map(|t| format!(": {}", self.expr(t)))
                    .unwrap_or_default();
                let e = self.expr(*expr);
                format!("{st}fn {r}({params}){ret} => {e}")
            }
            Node::Param {
                var,
                default,
                type_hint,
                by_ref,
                variadic,
            } => {
                let mut s = String::new();
                if let Some(t) = type_hint {
                    s.push_str(&self.expr(*t));
                    s.push(' ');
                }
                if *by_ref {
                    s.push('&');
                }
                if *variadic {
                    s.push_str("...");
                }
                s.push_str(&self.expr(*var));
                if let Some(d) = default {
                    s.push_str(" = ");
                    s.push_str(&self.expr(*d));
                }
                s
            }
            Node::Print { expr } => format!("print {}", self.operand(*expr)),
            Node::Exit { expr } => match expr {
                Some(e) => format!("exit({})", self.expr(*e)),
                None => "exit".to_string(),
            },
            Node::Include { kind, expr } => {
                let kw = match kind {
                    IncludeKind::Include => "include",
                    IncludeKind::IncludeOnce => "include_once",
                    IncludeKind::Require => "require",
                    IncludeKind::RequireOnce => "require_once",
                };
                format!("{kw} {}", self.operand(*expr))
            }
            Node::ErrorSuppress { expr } => format!("@{}", self.operand(*expr)),
            Node::Clone { expr } => format!("clone {}", self.operand(*expr)),
            Node::StaticVar { var, default } | Node::PropertyItem { name: var, default } => {
                let v = match &ast[*var] {
                    Node::Ident { name } => format!("${name}"),
                    _ => self.expr(*var),
                };
                match default {
                    Some(d) => format!("{v} = {}", self.expr(*d)),
                    None => v,
                }
            }
            Node::ConstItem { name, value } | Node::DeclareItem { key: name, value } => {
                let n = self.expr(*name);
                let v = self.expr(*value);
                format!("{n} = {v}")
            }
            Node::UseItem { name, alias } => {
                let n = self.expr(*name);
                match alias {
                    Some(a) => format!("{n} as {}", self.expr(*a)),
                    None => n,
                }
            }
            Node::Block { .. }
            | Node::Echo { .. }
            | Node::Expression { .. }
            | Node::Return { .. }
            | Node::Throw { .. }
            | Node::Break { .. }
            | Node::Continue { .. }
            | Node::Global { .. }
            | Node::Static { .. }
            | Node::Unset { .. }
            | Node::If { .. }
            | Node::ElseIf { .. }
            | Node::Else { .. }
            | Node::While { .. }
            | Node::DoWhile { .. }
            | Node::For { .. }
            | Node::Foreach { .. }
            | Node::Switch { .. }
            | Node::Case { .. }
            | Node::TryCatch { .. }
            | Node::Catch { .. }
            | Node::Finally { .. }
            | Node::Function { .. }
            | Node::Class { .. }
            | Node::Interface { .. }
            | Node::Trait { .. }
            | Node::ClassMethod { .. }
            | Node::PropertyDecl { .. }
            | Node::ClassConstDecl { .. }
            | Node::ConstDecl { .. }
            | Node::TraitUse { .. }
            | Node::Namespace { .. }
            | Node::Use { .. }
            | Node::Declare { .. }
            | Node::Label { .. }
            | Node::Goto { .. } => {
                warn!(node = %id, kind = ast[id].kind_name(), "statement in expression position");
                String::new()
            }
        }
    }

    fn interpolated(&mut self, parts: &[NodeId]) -> String {
        let ast = self.ast;
        let curly_safe = parts
            .iter()
            .all(|p| matches!(ast[*p], Node::Str { .. }) || is_variable_chain(ast, *p));
        if curly_safe {
            let mut s = String::from("\"");
            for part in parts {
                match &ast[*part] {
                    Node::Str { value } => s.push_str(&double_quoted_body(value)),
                    _ => {
                        s.push('{');
                        s.push_str(&self.expr(*part));
                        s.push('}');
                    }
                }
            }
            s.push('"');
            return s;
        }
        let pieces: Vec<String> = parts.iter().map(|p| self.operand(*p)).collect();
        if pieces.is_empty() {
            "''".to_string()
        } else {
            format!("({})", pieces.join(" . "))
        }
    }
}

fn modifier_prefix(m: &Modifiers) -> String {
    let mut s = String::new();
    if m.is_abstract {
        s.push_str("abstract ");
    }
    if m.is_final {
        s.push_str("final ");
    }
    match m.visibility {
        Some(Visibility::Public) => s.push_str("public "),
        Some(Visibility::Protected) => s.push_str("protected "),
        Some(Visibility::Private) => s.push_str("private "),
        None => {}
    }
    if m.is_static {
        s.push_str("static ");
    }
    if m.is_readonly {
        s.push_str("readonly ");
    }
    s
}

fn needs_parens(node: &Node) -> bool {
    match node {
        Node::Int { value } => *value < 0,
        Node::Float { value } => value.is_sign_negative(),
        Node::Binary { .. }
        | Node::Assign { .. }
        | Node::AssignRef { .. }
        | Node::AssignOp { .. }
        | Node::Ternary { .. }
        | Node::Unary { .. }
        | Node::IncDec { .. }
        | Node::Cast { .. }
        | Node::Instanceof { .. }
        | Node::Closure { .. }
        | Node::ArrowFn { .. }
        | Node::Print { .. }
        | Node::Include { .. }
        | Node::ErrorSuppress { .. }
        | Node::Clone { .. }
        | Node::New { .. } => true,
        _ => false,
    }
}

fn is_variable_chain(ast: &Ast, id: NodeId) -> bool {
    match &ast[id] {
        Node::Variable { name } => matches!(ast[*name], Node::Ident { .. }),
        Node::ArrayDimFetch { var, .. }
        | Node::PropertyFetch { var, .. }
        | Node::MethodCall { var, .. } => is_variable_chain(ast, *var),
        _ => false,
    }
}

fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        format!("{value:?}")
    }
}

/// PHP single-quoted literal: only `\` and `'` need escaping.
pub fn single_quoted(value: &str) -> String {
    let mut s = String::with_capacity(value.len() + 2);
    s.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            s.push('\\');
        }
        s.push(c);
    }
    s.push('\'');
    s
}

fn double_quoted_body(value: &str) -> String {
    let mut s = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => s.push_str("\\\\"),
            '"' => s.push_str("\\\""),
            '$' => s.push_str("\\$"),
            '\n' => s.push_str("\\n"),
            '\r' => s.push_str("\\r"),
            '\t' => s.push_str("\\t"),
            c if (c as u32) < 0x20 => s.push_str(&format!("\\x{:02x}", c as u32)),
            c => s.push(c),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    #[test]
    fn test_prints_function_with_body() {
        let mut ast = Ast::new();
        let a = ast.param("a", None);
        let b = ast.param("b", None);
        let va = ast.var("a");
        let vb = ast.var("b");
        let sum = ast.binary(BinOp::Add, va, vb);
        let c = ast.var("c");
        let assign = ast.assign(c, sum);
        let s1 = ast.expr_stmt(assign);
        let rc = ast.var("c");
        let s2 = ast.ret(Some(rc));
        let f = ast.function("f", vec![a, b], vec![s1, s2]);
        ast.push_stmt(f);

        let out = print(&ast);
        assert_eq!(
            out,
            "<?php\nfunction f($a, $b) {\n    $c = $a + $b;\n    return $c;\n}\n"
        );
    }

    #[test]
    fn test_nested_operands_get_parentheses() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        let two = ast.int(2);
        let three = ast.int(3);
        let inner = ast.binary(BinOp::Add, one, two);
        let outer = ast.binary(BinOp::Mul, inner, three);
        assert_eq!(print_expr(&ast, outer), "(1 + 2) * 3");

        let neg = ast.int(-4);
        let minus = ast.unary(crate::ast::UnOp::Neg, neg);
        assert_eq!(print_expr(&ast, minus), "-(-4)");
    }

    #[test]
    fn test_single_quoted_escapes() {
        assert_eq!(single_quoted(r"it's a \ test"), r"'it\'s a \\ test'");
    }

    #[test]
    fn test_interpolated_uses_braces_for_variables() {
        let mut ast = Ast::new();
        let hello = ast.string("Hello $");
        let name = ast.var("name");
        let node = ast.alloc(Node::Interpolated {
            parts: vec![hello, name],
        });
        assert_eq!(print_expr(&ast, node), "\"Hello \\${$name}\"");
    }

    #[test]
    fn test_interpolated_falls_back_to_concat() {
        let mut ast = Ast::new();
        let a = ast.string("n=");
        let one = ast.int(1);
        let two = ast.int(2);
        let sum = ast.binary(BinOp::Add, one, two);
        let node = ast.alloc(Node::Interpolated {
            parts: vec![a, sum],
        });
        assert_eq!(print_expr(&ast, node), "('n=' . (1 + 2))");
    }

    #[test]
    fn test_inline_html_switches_tags() {
        let mut ast = Ast::new();
        let html = ast.alloc(Node::InlineHtml {
            value: "<p>hi</p>\n".to_string(),
        });
        let s = ast.string("x");
        let echo = ast.echo(vec![s]);
        let ast = ast.with_statements(vec![html, echo]);
        assert_eq!(print(&ast), "<p>hi</p>\n<?php\necho 'x';\n");
    }

    #[test]
    fn test_comments_only_when_requested() {
        let mut ast = Ast::new();
        let v = ast.var("a");
        let one = ast.int(1);
        let assign = ast.assign(v, one);
        let stmt = ast.expr_stmt(assign);
        ast.push_stmt(stmt);
        let Node::Variable { name } = ast[v] else {
            panic!("expected variable");
        };
        if let Some(token) = ast.token_mut(name) {
            token.trivia.push(Trivia::Comment("// note".to_string()));
        }

        assert!(!print(&ast).contains("// note"));
        let with = Printer::new(
            &ast,
            PrintOptions {
                preserve_comments: true,
                ..Default::default()
            },
        )
        .print();
        assert!(with.contains("// note\n$a = 1;"));
    }
}
