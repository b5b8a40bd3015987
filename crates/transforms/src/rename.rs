//! Identifier renaming.
//!
//! Renaming runs in two sweeps over the tree. The first sweep assigns generated names to
//! every declaration (functions, class-likes, methods, properties, constants, namespaces,
//! labels, variables). The second sweep rewrites declarations and references alike, but
//! references only ever *look up* an existing assignment: a call to `strlen` or a
//! `new Exception` keeps its name because nothing declared it. State lives in the shared
//! [`ScramblerSet`], so names stay consistent across every file of a run.

use crate::Transform;
use rand::rngs::StdRng;
use shroud_core::ast::{Ast, Node, NodeId, UseKind};
use shroud_core::printer::single_quoted;
use shroud_core::rewrite::ParentMap;
use shroud_core::scramble::{IdentifierCategory, Scrambler, ScramblerSet};
use shroud_utils::errors::TransformError;
use std::collections::HashMap;
use tracing::debug;

/// Builtins taking a variable name as a string argument.
const VARIABLE_NAME_ARGS: &[&str] = &["compact"];
/// Builtins taking a function name as a string argument, with the argument's position.
const CALLBACK_ARGS: &[(&str, usize)] = &[
    ("array_filter", 1),
    ("array_map", 0),
    ("array_reduce", 1),
    ("array_walk", 1),
    ("array_walk_recursive", 1),
    ("call_user_func", 0),
    ("call_user_func_array", 0),
    ("forward_static_call", 0),
    ("forward_static_call_array", 0),
    ("function_exists", 0),
    ("is_callable", 0),
    ("iterator_apply", 1),
    ("ob_start", 0),
    ("preg_replace_callback", 1),
    ("register_shutdown_function", 0),
    ("set_error_handler", 0),
    ("set_exception_handler", 0),
    ("spl_autoload_register", 0),
    ("uasort", 1),
    ("uksort", 1),
    ("usort", 1),
];
/// Builtins taking a constant name as their first string argument.
const CONSTANT_NAME_ARGS: &[&str] = &["constant", "defined"];

/// What a name-bearing node means at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Declares a name of the category.
    Declare(IdentifierCategory),
    /// Refers to a name of the category.
    Refer(IdentifierCategory),
    /// `namespace A\B;`
    Namespace,
    /// Possibly qualified function name at a call site.
    Function,
    /// Possibly qualified constant name.
    Constant,
    /// Possibly qualified class, interface or trait reference, or a type.
    ClassLike,
    /// Imported name in a `use` statement.
    Use(UseKind),
}

/// Scrambles identifiers through a shared [`ScramblerSet`].
pub struct Renamer<'a> {
    scramblers: &'a ScramblerSet,
}

impl<'a> Renamer<'a> {
    pub fn new(scramblers: &'a ScramblerSet) -> Self {
        Self { scramblers }
    }

    fn scrambler(&self, category: IdentifierCategory) -> &Scrambler {
        self.scramblers.get(category)
    }

    /// Assigns generated names to every declaration in `ast` without editing it.
    ///
    /// Running this over all files of a run before renaming any of them makes references
    /// resolve no matter which file is processed first.
    pub fn declare_tree(&self, ast: &Ast) {
        let roles = collect_roles(ast);
        self.declare_roles(ast, &roles);
    }

    fn declare_roles(&self, ast: &Ast, roles: &[(NodeId, Role)]) {
        for (target, role) in roles {
            if let Some(text) = text_of(ast, *target) {
                self.declare(text, *role);
            }
        }
    }

    fn declare(&self, text: &str, role: Role) {
        match role {
            Role::Declare(category) => {
                self.scrambler(category).scramble(text);
            }
            Role::Namespace => {
                for segment in text.split('\\').filter(|s| !s.is_empty()) {
                    self.scrambler(IdentifierCategory::Namespace)
                        .scramble(segment);
                }
            }
            _ => {}
        }
    }

    /// The new text for a name, or `None` when it stays as written.
    fn renamed(&self, text: &str, role: Role) -> Option<String> {
        let new = match role {
            Role::Declare(category) | Role::Refer(category) => {
                self.scrambler(category).lookup(text)?
            }
            Role::Namespace => self.qualified(text, |s| self.namespace(s)),
            Role::Function => {
                self.qualified(text, |s| self.scrambler(IdentifierCategory::Function).lookup(s))
            }
            Role::Constant => {
                self.qualified(text, |s| self.scrambler(IdentifierCategory::Constant).lookup(s))
            }
            Role::ClassLike => self.type_name(text),
            Role::Use(UseKind::Function) => {
                self.qualified(text, |s| self.scrambler(IdentifierCategory::Function).lookup(s))
            }
            Role::Use(UseKind::Const) => {
                self.qualified(text, |s| self.scrambler(IdentifierCategory::Constant).lookup(s))
            }
            Role::Use(UseKind::Normal) => self.qualified(text, |s| {
                self.class_like(s).or_else(|| self.namespace(s))
            }),
        };
        (new != text).then_some(new)
    }

    fn namespace(&self, segment: &str) -> Option<String> {
        self.scrambler(IdentifierCategory::Namespace).lookup(segment)
    }

    /// Class, then interface, then trait.
    fn class_like(&self, name: &str) -> Option<String> {
        [
            IdentifierCategory::Class,
            IdentifierCategory::Interface,
            IdentifierCategory::Trait,
        ]
        .into_iter()
        .find_map(|category| self.scrambler(category).lookup(name))
    }

    /// Handles nullable (`?Foo`) and union (`Foo|Bar`) types around qualified names.
    fn type_name(&self, text: &str) -> String {
        text.split('|')
            .map(|part| match part.strip_prefix('?') {
                Some(rest) => format!("?{}", self.qualified(rest, |s| self.class_like(s))),
                None => self.qualified(part, |s| self.class_like(s)),
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Renames namespace segments of `text` and its last segment with `last`.
    fn qualified<F>(&self, text: &str, last: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let segments: Vec<&str> = text.split('\\').collect();
        let count = segments.len();
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if segment.is_empty() {
                    String::new()
                } else if i + 1 == count {
                    last(segment).unwrap_or_else(|| segment.to_string())
                } else {
                    self.namespace(segment)
                        .unwrap_or_else(|| segment.to_string())
                }
            })
            .collect::<Vec<_>>()
            .join("\\")
    }
}

/// Every name-bearing node of the tree with its role, in pre-order.
fn collect_roles(ast: &Ast) -> Vec<(NodeId, Role)> {
    let parents = ParentMap::build(ast);
    ast.pre_order(ast.root())
        .into_iter()
        .flat_map(|id| roles(ast, &parents, id))
        .collect()
}

/// Name-bearing children of `id` together with their role.
fn roles(ast: &Ast, parents: &ParentMap, id: NodeId) -> Vec<(NodeId, Role)> {
    use IdentifierCategory as C;

    let mut out = Vec::new();
    let is_name = |n: NodeId| matches!(ast[n], Node::Name { .. });
    let is_ident = |n: NodeId| matches!(ast[n], Node::Ident { .. });

    match &ast[id] {
        Node::Variable { name } if is_ident(*name) => out.push((*name, Role::Declare(C::Variable))),
        Node::StaticVar { var, .. } if is_ident(*var) => {
            out.push((*var, Role::Declare(C::Variable)))
        }
        Node::Function {
            name, return_type, ..
        } => {
            out.push((*name, Role::Declare(C::Function)));
            out.extend(return_type.filter(|t| is_name(*t)).map(|t| (t, Role::ClassLike)));
        }
        Node::Class {
            name,
            extends,
            implements,
            ..
        } => {
            out.push((*name, Role::Declare(C::Class)));
            out.extend(extends.iter().map(|e| (*e, Role::ClassLike)));
            out.extend(implements.iter().map(|i| (*i, Role::ClassLike)));
        }
        Node::Interface { name, extends, .. } => {
            out.push((*name, Role::Declare(C::Interface)));
            out.extend(extends.iter().map(|e| (*e, Role::ClassLike)));
        }
        Node::Trait { name, .. } => out.push((*name, Role::Declare(C::Trait))),
        Node::ClassMethod {
            name, return_type, ..
        } => {
            out.push((*name, Role::Declare(C::Method)));
            out.extend(return_type.filter(|t| is_name(*t)).map(|t| (t, Role::ClassLike)));
        }
        Node::Closure { return_type, .. } | Node::ArrowFn { return_type, .. } => {
            out.extend(return_type.filter(|t| is_name(*t)).map(|t| (t, Role::ClassLike)));
        }
        Node::Param { type_hint, .. } | Node::PropertyDecl { type_hint, .. } => {
            out.extend(type_hint.filter(|t| is_name(*t)).map(|t| (t, Role::ClassLike)));
        }
        Node::PropertyItem { name, .. } if is_ident(*name) => {
            out.push((*name, Role::Declare(C::Property)))
        }
        Node::ConstItem { name, .. } => {
            let in_class = parents
                .parent(id)
                .is_some_and(|p| matches!(ast[p], Node::ClassConstDecl { .. }));
            let category = if in_class { C::ClassConstant } else { C::Constant };
            out.push((*name, Role::Declare(category)));
        }
        Node::Namespace { name: Some(n), .. } => out.push((*n, Role::Namespace)),
        Node::Label { name } => out.push((*name, Role::Declare(C::Label))),
        Node::Goto { name } => out.push((*name, Role::Refer(C::Label))),
        Node::TraitUse { traits } => out.extend(traits.iter().map(|t| (*t, Role::ClassLike))),
        Node::Catch { types, .. } => out.extend(types.iter().map(|t| (*t, Role::ClassLike))),
        Node::New { class, .. } | Node::Instanceof { class, .. } if is_name(*class) => {
            out.push((*class, Role::ClassLike))
        }
        Node::StaticCall { class, name, .. } => {
            if is_name(*class) {
                out.push((*class, Role::ClassLike));
            }
            if is_ident(*name) {
                out.push((*name, Role::Refer(C::Method)));
            }
        }
        Node::ClassConstFetch { class, name } => {
            if is_name(*class) {
                out.push((*class, Role::ClassLike));
            }
            if is_ident(*name) {
                out.push((*name, Role::Refer(C::ClassConstant)));
            }
        }
        Node::StaticPropertyFetch { class, name } => {
            if is_name(*class) {
                out.push((*class, Role::ClassLike));
            }
            if is_ident(*name) {
                out.push((*name, Role::Refer(C::Property)));
            }
        }
        Node::MethodCall { name, .. } if is_ident(*name) => {
            out.push((*name, Role::Refer(C::Method)))
        }
        Node::PropertyFetch { name, .. } if is_ident(*name) => {
            out.push((*name, Role::Refer(C::Property)))
        }
        Node::ConstFetch { name } => out.push((*name, Role::Constant)),
        Node::FuncCall { name, args } if is_name(*name) => {
            out.push((*name, Role::Function));
            out.extend(string_arg_roles(ast, *name, args));
        }
        Node::UseItem { name, .. } => {
            let kind = parents
                .parent(id)
                .and_then(|p| match ast[p] {
                    Node::Use { kind, .. } => Some(kind),
                    _ => None,
                })
                .unwrap_or_default();
            out.push((*name, Role::Use(kind)));
        }
        _ => {}
    }
    out
}

/// Roles of literal name arguments passed to builtins such as `define` and `compact`.
fn string_arg_roles(ast: &Ast, callee: NodeId, args: &[NodeId]) -> Vec<(NodeId, Role)> {
    use IdentifierCategory as C;

    let Some(function) = ast.name_of(callee) else {
        return Vec::new();
    };
    let function = function.trim_start_matches('\\').to_ascii_lowercase();
    let literal_at = |position: usize| {
        args.get(position).and_then(|arg| match ast[*arg] {
            Node::Arg { value, .. } if matches!(ast[value], Node::Str { .. }) => Some(value),
            _ => None,
        })
    };

    if function == "define" {
        literal_at(0)
            .map(|s| (s, Role::Declare(C::Constant)))
            .into_iter()
            .collect()
    } else if VARIABLE_NAME_ARGS.contains(&function.as_str()) {
        (0..args.len())
            .filter_map(literal_at)
            .map(|s| (s, Role::Refer(C::Variable)))
            .collect()
    } else if let Some(&(_, position)) = CALLBACK_ARGS.iter().find(|(f, _)| *f == function) {
        literal_at(position)
            .map(|s| (s, Role::Refer(C::Function)))
            .into_iter()
            .collect()
    } else if CONSTANT_NAME_ARGS.contains(&function.as_str()) {
        literal_at(0)
            .map(|s| (s, Role::Refer(C::Constant)))
            .into_iter()
            .collect()
    } else {
        Vec::new()
    }
}

fn text_of(ast: &Ast, id: NodeId) -> Option<&str> {
    match &ast[id] {
        Node::Ident { name } | Node::Name { name } => Some(name),
        Node::Str { value } => Some(value),
        _ => None,
    }
}

fn set_text(ast: &mut Ast, id: NodeId, text: String) {
    let token_text = match &mut ast[id] {
        Node::Ident { name } | Node::Name { name } => {
            *name = text.clone();
            text
        }
        Node::Str { value } => {
            *value = text.clone();
            single_quoted(&text)
        }
        _ => return,
    };
    if let Some(token) = ast.token_mut(id) {
        token.text = token_text;
    }
}

impl Transform for Renamer<'_> {
    fn name(&self) -> &'static str {
        "Rename"
    }

    fn apply(&self, ast: &mut Ast, _rng: &mut StdRng) -> Result<bool, TransformError> {
        let roles = collect_roles(ast);
        self.declare_roles(ast, &roles);

        let mut edits: HashMap<NodeId, String> = HashMap::new();
        for (target, role) in &roles {
            let Some(text) = text_of(ast, *target) else {
                continue;
            };
            if let Some(new) = self.renamed(text, *role) {
                edits.insert(*target, new);
            }
        }

        debug!(names = roles.len(), renamed = edits.len(), "renaming");
        let changed = !edits.is_empty();
        for (target, text) in edits {
            set_text(ast, target, text);
        }
        Ok(changed)
    }

    fn gated(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use shroud_core::scramble::ScramblerConfig;

    fn set() -> ScramblerSet {
        ScramblerSet::new(|_| ScramblerConfig {
            seed: 9,
            ..ScramblerConfig::default()
        })
    }

    fn rename(set: &ScramblerSet, ast: &mut Ast) -> bool {
        let mut rng = StdRng::seed_from_u64(0);
        Renamer::new(set).apply(ast, &mut rng).unwrap()
    }

    /// function add($a) { return $a; } add(1); strlen('x');
    fn sample() -> (Ast, NodeId, NodeId, NodeId) {
        let mut ast = Ast::new();
        let param = ast.param("a", None);
        let a = ast.var("a");
        let ret = ast.ret(Some(a));
        let decl = ast.function("add", vec![param], vec![ret]);
        let one = ast.int(1);
        let call = ast.call("add", vec![one]);
        let call_stmt = ast.expr_stmt(call);
        let x = ast.string("x");
        let builtin = ast.call("strlen", vec![x]);
        let builtin_stmt = ast.expr_stmt(builtin);
        let ast = ast.with_statements(vec![decl, call_stmt, builtin_stmt]);
        (ast, decl, call, builtin)
    }

    fn callee(ast: &Ast, call: NodeId) -> String {
        let Node::FuncCall { name, .. } = ast[call] else {
            panic!("expected call");
        };
        ast.name_of(name).unwrap().to_string()
    }

    #[test]
    fn test_declaration_and_call_renamed_together() {
        let set = set();
        let (mut ast, decl, call, builtin) = sample();
        assert!(rename(&set, &mut ast));

        let Node::Function { name, .. } = ast[decl] else {
            panic!("expected function");
        };
        let declared = ast.name_of(name).unwrap().to_string();
        assert_ne!(declared, "add");
        assert_eq!(callee(&ast, call), declared);
        assert_eq!(callee(&ast, builtin), "strlen");
        assert_eq!(ast.token(name).unwrap().text, declared);
    }

    #[test]
    fn test_variables_share_one_name() {
        let set = set();
        let (mut ast, _, _, _) = sample();
        rename(&set, &mut ast);
        let names: Vec<&str> = ast
            .pre_order(ast.root())
            .into_iter()
            .filter_map(|id| ast.var_name(id))
            .collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], names[1]);
        assert_ne!(names[0], "a");
    }

    #[test]
    fn test_this_and_superglobals_untouched() {
        let set = set();
        let mut ast = Ast::new();
        let this = ast.var("this");
        let get = ast.var("_GET");
        let s1 = ast.expr_stmt(this);
        let s2 = ast.expr_stmt(get);
        let mut ast = ast.with_statements(vec![s1, s2]);
        assert!(!rename(&set, &mut ast));
        assert_eq!(ast.var_name(this), Some("this"));
        assert_eq!(ast.var_name(get), Some("_GET"));
    }

    #[test]
    fn test_state_carries_across_files() {
        let set = set();
        let (mut first, decl, _, _) = sample();
        rename(&set, &mut first);
        let Node::Function { name, .. } = first[decl] else {
            panic!("expected function");
        };
        let declared = first.name_of(name).unwrap().to_string();

        // A second file only calls the function.
        let mut second = Ast::new();
        let call = second.call("ADD", Vec::new());
        let stmt = second.expr_stmt(call);
        let mut second = second.with_statements(vec![stmt]);
        rename(&set, &mut second);
        assert_eq!(callee(&second, call), declared);
    }

    #[test]
    fn test_class_instantiation_and_methods() {
        let set = set();
        let mut ast = Ast::new();
        let method_name = ast.ident("total");
        let body = ast.block(Vec::new());
        let method = ast.alloc(Node::ClassMethod {
            modifiers: Default::default(),
            name: method_name,
            params: Vec::new(),
            stmts: Some(body),
            by_ref: false,
            return_type: None,
        });
        let class_name = ast.ident("Invoice");
        let class = ast.alloc(Node::Class {
            name: class_name,
            modifiers: Default::default(),
            extends: None,
            implements: Vec::new(),
            members: vec![method],
        });
        let class_ref = ast.name("invoice");
        let new = ast.alloc(Node::New {
            class: class_ref,
            args: Vec::new(),
        });
        let call = ast.method_call(new, "Total", Vec::new());
        let stmt = ast.expr_stmt(call);
        let mut ast = ast.with_statements(vec![class, stmt]);
        rename(&set, &mut ast);

        let class_new = ast.name_of(class_name).unwrap().to_ascii_lowercase();
        assert_ne!(class_new, "invoice");
        assert_eq!(ast.name_of(class_ref).unwrap().to_ascii_lowercase(), class_new);
        let Node::MethodCall { name, .. } = ast[call] else {
            panic!("expected method call");
        };
        assert_eq!(
            ast.name_of(name).unwrap().to_ascii_lowercase(),
            ast.name_of(method_name).unwrap().to_ascii_lowercase()
        );
    }

    #[test]
    fn test_define_and_constant_fetch() {
        let set = set();
        let mut ast = Ast::new();
        let key = ast.string("LIMIT");
        let ten = ast.int(10);
        let define = ast.call("define", vec![key, ten]);
        let s1 = ast.expr_stmt(define);
        let fetch = ast.constant("LIMIT");
        let echo = ast.echo(vec![fetch]);
        let null = ast.constant("null");
        let s3 = ast.expr_stmt(null);
        let mut ast = ast.with_statements(vec![s1, echo, s3]);
        rename(&set, &mut ast);

        let Node::Str { value } = &ast[key] else {
            panic!("expected string");
        };
        let Node::ConstFetch { name } = ast[fetch] else {
            panic!("expected constant");
        };
        assert_ne!(value, "LIMIT");
        assert_eq!(ast.name_of(name), Some(value.as_str()));
        let Node::ConstFetch { name } = ast[null] else {
            panic!("expected constant");
        };
        assert_eq!(ast.name_of(name), Some("null"));
    }

    fn string_value(ast: &Ast, id: NodeId) -> &str {
        let Node::Str { value } = &ast[id] else {
            panic!("expected string");
        };
        value
    }

    #[test]
    fn test_callback_arguments_follow_declaration() {
        let set = set();
        let (mut ast, decl, _, _) = sample();
        let mapped = ast.string("add");
        let list = ast.var("list");
        let map = ast.call("array_map", vec![mapped, list]);
        let s1 = ast.expr_stmt(map);
        let items = ast.var("items");
        let sorted = ast.string("add");
        let usort = ast.call("usort", vec![items, sorted]);
        let s2 = ast.expr_stmt(usort);
        let label = ast.string("add");
        let values = ast.var("values");
        let filter = ast.call("array_filter", vec![label, values]);
        let s3 = ast.expr_stmt(filter);
        ast.push_stmt(s1);
        ast.push_stmt(s2);
        ast.push_stmt(s3);
        rename(&set, &mut ast);

        let Node::Function { name, .. } = ast[decl] else {
            panic!("expected function");
        };
        let declared = ast.name_of(name).unwrap();
        assert_eq!(string_value(&ast, mapped), declared);
        assert_eq!(string_value(&ast, sorted), declared);
        // array_filter takes its callback second; the first argument is data.
        assert_eq!(string_value(&ast, label), "add");
    }

    #[test]
    fn test_declare_tree_leaves_tree_unchanged() {
        let set = set();
        let (ast, decl, _, _) = sample();
        Renamer::new(&set).declare_tree(&ast);
        let Node::Function { name, .. } = ast[decl] else {
            panic!("expected function");
        };
        assert_eq!(ast.name_of(name), Some("add"));
        assert!(set.get(IdentifierCategory::Function).lookup("add").is_some());
        assert!(set.get(IdentifierCategory::Variable).lookup("a").is_some());
    }

    #[test]
    fn test_ignore_list_respected() {
        let set = ScramblerSet::new(|category| ScramblerConfig {
            ignore: if category == IdentifierCategory::Variable {
                vec!["keep".to_string()]
            } else {
                Vec::new()
            },
            ..ScramblerConfig::default()
        });
        let mut ast = Ast::new();
        let keep = ast.var("keep");
        let stmt = ast.expr_stmt(keep);
        let mut ast = ast.with_statements(vec![stmt]);
        rename(&set, &mut ast);
        assert_eq!(ast.var_name(keep), Some("keep"));
    }

    #[test]
    fn test_qualified_function_name() {
        let set = set();
        set.get(IdentifierCategory::Namespace).scramble("App");
        set.get(IdentifierCategory::Function).scramble("boot");
        let renamer = Renamer::new(&set);
        let out = renamer.renamed("\\App\\boot", Role::Function).unwrap();
        let parts: Vec<&str> = out.split('\\').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "");
        assert_eq!(
            Some(parts[1].to_string()),
            set.get(IdentifierCategory::Namespace).lookup("App")
        );
        assert_eq!(
            Some(parts[2].to_string()),
            set.get(IdentifierCategory::Function).lookup("boot")
        );
    }
}
