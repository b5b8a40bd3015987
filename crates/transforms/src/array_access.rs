use crate::Transform;
use crate::config::ArrayAccessConfig;
use crate::util::{self, chance, in_const_context, leading_declares, uses_namespaces};
use rand::rngs::StdRng;
use shroud_core::ast::{Ast, Node, NodeId, UnOp};
use shroud_core::rewrite::{ParentMap, Rewriter};
use shroud_utils::errors::TransformError;
use std::collections::HashMap;
use tracing::debug;

/// Builtins that take at least one argument by reference.
const REF_BUILTINS: &[&str] = &[
    "array_multisort",
    "array_pop",
    "array_push",
    "array_shift",
    "array_splice",
    "array_unshift",
    "array_walk",
    "array_walk_recursive",
    "arsort",
    "asort",
    "current",
    "each",
    "end",
    "extract",
    "key",
    "krsort",
    "ksort",
    "natcasesort",
    "natsort",
    "next",
    "openssl_sign",
    "parse_str",
    "preg_match",
    "preg_match_all",
    "preg_replace_callback",
    "prev",
    "reset",
    "rsort",
    "settype",
    "shuffle",
    "similar_text",
    "sort",
    "str_ireplace",
    "str_replace",
    "uasort",
    "uksort",
    "usort",
];

/// By-reference flags of user-declared parameters, per lowercased name.
#[derive(Debug, Default)]
struct RefParams {
    functions: HashMap<String, Vec<(bool, bool)>>,
    methods: HashMap<String, Vec<(bool, bool)>>,
}

impl RefParams {
    fn collect(ast: &Ast) -> Self {
        let mut refs = Self::default();
        for id in ast.pre_order(ast.root()) {
            let (name, params, table) = match &ast[id] {
                Node::Function { name, params, .. } => (*name, params, &mut refs.functions),
                Node::ClassMethod { name, params, .. } => (*name, params, &mut refs.methods),
                _ => continue,
            };
            let flags: Vec<(bool, bool)> = params
                .iter()
                .map(|p| match ast[*p] {
                    Node::Param {
                        by_ref, variadic, ..
                    } => (by_ref, variadic),
                    _ => (false, false),
                })
                .collect();
            if !flags.iter().any(|(by_ref, _)| *by_ref) {
                continue;
            }
            if let Some(name) = ast.name_of(name) {
                table.insert(name.to_ascii_lowercase(), flags);
            }
        }
        refs
    }

    fn lookup(table: &HashMap<String, Vec<(bool, bool)>>, name: &str, position: usize) -> bool {
        let Some(flags) = table.get(&name.to_ascii_lowercase()) else {
            return false;
        };
        match flags.get(position) {
            Some((by_ref, _)) => *by_ref,
            None => flags.last().is_some_and(|(by_ref, variadic)| *by_ref && *variadic),
        }
    }
}

/// Rewrites `$container[$key]` reads into calls to an existence-checking helper.
pub struct ArrayAccessRewriter {
    rate: u32,
    helper: String,
}

impl ArrayAccessRewriter {
    pub fn new(config: &ArrayAccessConfig) -> Self {
        Self {
            rate: config.rate,
            helper: config.helper.clone(),
        }
    }

    /// Whether the argument `arg` of its call is passed by reference.
    fn by_ref_argument(ast: &Ast, parents: &ParentMap, arg: NodeId, refs: &RefParams) -> bool {
        let Some(call) = parents.parent(arg) else {
            return false;
        };
        let position_in = |args: &[NodeId]| args.iter().position(|a| *a == arg).unwrap_or(0);
        match &ast[call] {
            Node::FuncCall { name, args } => {
                let Some(function) = ast.name_of(*name) else {
                    return false;
                };
                let short = function.rsplit('\\').next().unwrap_or(function);
                REF_BUILTINS.contains(&short.to_ascii_lowercase().as_str())
                    || RefParams::lookup(&refs.functions, short, position_in(args))
            }
            Node::MethodCall { name, args, .. } | Node::StaticCall { name, args, .. } => ast
                .name_of(*name)
                .is_some_and(|m| RefParams::lookup(&refs.methods, m, position_in(args))),
            Node::New { args, .. } => {
                RefParams::lookup(&refs.methods, "__construct", position_in(args))
            }
            _ => false,
        }
    }

    /// True when the value at `id` may be written or bound by reference.
    fn is_lvalue(ast: &Ast, parents: &ParentMap, id: NodeId, refs: &RefParams) -> bool {
        let mut child = id;
        for parent in parents.ancestors(id) {
            match &ast[parent] {
                Node::Assign { var, .. } | Node::AssignOp { var, .. } => return *var == child,
                Node::AssignRef { .. }
                | Node::IncDec { .. }
                | Node::List { .. }
                | Node::Unset { .. }
                | Node::Isset { .. }
                | Node::Empty { .. }
                | Node::Global { .. }
                | Node::StaticVar { .. }
                | Node::ClosureUse { .. } => return true,
                Node::ArrayItem { by_ref: true, .. } => return true,
                Node::Array { .. } | Node::ArrayItem { .. } => {}
                Node::Foreach { expr, by_ref, .. } => return child != *expr || *by_ref,
                Node::Arg { by_ref: true, .. } => return true,
                Node::Arg { .. } => return Self::by_ref_argument(ast, parents, parent, refs),
                Node::ArrayDimFetch { var, .. } | Node::PropertyFetch { var, .. } => {
                    if *var != child {
                        return false;
                    }
                }
                Node::Return { .. } => {
                    return parents.ancestors(parent).into_iter().any(|a| {
                        matches!(
                            ast[a],
                            Node::Function { by_ref: true, .. }
                                | Node::ClassMethod { by_ref: true, .. }
                                | Node::Closure { by_ref: true, .. }
                        )
                    });
                }
                _ => return false,
            }
            child = parent;
        }
        false
    }

    /// Function declared as `function h($a, $k, $d = null) { return isset($a[$k]) ? $a[$k] : $d; }`
    /// under any name.
    fn is_helper(ast: &Ast, id: NodeId) -> bool {
        let Node::Function { params, stmts, .. } = &ast[id] else {
            return false;
        };
        if params.len() != 3 {
            return false;
        }
        match ast.stmts(*stmts) {
            [only] => match ast[*only] {
                Node::Return { expr: Some(e) } => match ast[e] {
                    Node::Ternary { cond, .. } => matches!(ast[cond], Node::Isset { .. }),
                    _ => false,
                },
                _ => false,
            },
            _ => false,
        }
    }

    /// `if (!function_exists('h')) { function h($a, $k, $d = null) { … } }`
    fn build_helper(&self, ast: &mut Ast) -> NodeId {
        let a = ast.var("a");
        let k = ast.var("k");
        let probe = ast.dim_fetch(a, Some(k));
        let isset = ast.isset(vec![probe]);
        let a2 = ast.var("a");
        let k2 = ast.var("k");
        let hit = ast.dim_fetch(a2, Some(k2));
        let fallback = ast.var("d");
        let ternary = ast.ternary(isset, Some(hit), fallback);
        let ret = ast.ret(Some(ternary));

        let pa = ast.param("a", None);
        let pk = ast.param("k", None);
        let null = ast.constant("null");
        let pd = ast.param("d", Some(null));
        let function = ast.function(&self.helper, vec![pa, pk, pd], vec![ret]);

        let name = ast.string(&self.helper);
        let exists = ast.call("function_exists", vec![name]);
        let missing = ast.unary(UnOp::Not, exists);
        ast.if_stmt(missing, vec![function], None)
    }
}

impl Transform for ArrayAccessRewriter {
    fn name(&self) -> &'static str {
        "ArrayAccess"
    }

    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError> {
        if uses_namespaces(ast) {
            debug!("namespaced file, array access left untouched");
            return Ok(false);
        }

        let existing = ast
            .pre_order(ast.root())
            .into_iter()
            .find(|id| Self::is_helper(ast, *id));
        let helper = match existing {
            Some(id) => match ast[id] {
                Node::Function { name, .. } => ast
                    .name_of(name)
                    .unwrap_or(self.helper.as_str())
                    .to_string(),
                _ => self.helper.clone(),
            },
            None => self.helper.clone(),
        };

        let refs = RefParams::collect(ast);
        let mut rewriter = Rewriter::for_ast(ast);
        let fetches: Vec<NodeId> = ast
            .post_order(ast.root())
            .into_iter()
            .filter(|id| matches!(ast[*id], Node::ArrayDimFetch { dim: Some(_), .. }))
            .collect();

        for fetch in fetches {
            let parents = rewriter.parents();
            if existing.is_some_and(|h| parents.ancestors(fetch).contains(&h))
                || in_const_context(ast, parents, fetch)
                || Self::is_lvalue(ast, parents, fetch, &refs)
            {
                continue;
            }
            if !chance(rng, self.rate) {
                continue;
            }
            let Node::ArrayDimFetch { var, dim: Some(dim) } = ast[fetch] else {
                continue;
            };
            let var = rewriter.resolve(var);
            let dim = rewriter.resolve(dim);
            let call = ast.call(&helper, vec![var, dim]);
            debug!(node = %fetch, "array access routed through helper");
            rewriter.request(fetch, call);
        }

        if !util::commit(rewriter, ast, self.name()) {
            return Ok(false);
        }

        if existing.is_none() {
            let guard = self.build_helper(ast);
            let root = ast.root();
            let at = leading_declares(ast, ast.stmts(root));
            if let Node::Block { stmts } = &mut ast[root] {
                stmts.insert(at, guard);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rewriter() -> ArrayAccessRewriter {
        ArrayAccessRewriter::new(&ArrayAccessConfig {
            enabled: true,
            rate: 100,
            helper: "_sg".to_string(),
        })
    }

    fn run(ast: &mut Ast) -> bool {
        let mut rng = StdRng::seed_from_u64(1);
        rewriter().apply(ast, &mut rng).unwrap()
    }

    #[test]
    fn test_assignment_target_untouched() {
        let mut ast = Ast::new();
        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let one = ast.int(1);
        let assign = ast.assign(fetch, one);
        let stmt = ast.expr_stmt(assign);
        let mut ast = ast.with_statements(vec![stmt]);
        assert!(!run(&mut ast));
        assert_eq!(ast.stmts(ast.root()), &[stmt]);
        assert!(matches!(ast[assign], Node::Assign { var, .. } if var == fetch));
    }

    #[test]
    fn test_read_routed_through_helper() {
        let mut ast = Ast::new();
        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let echo = ast.echo(vec![fetch]);
        let mut ast = ast.with_statements(vec![echo]);
        assert!(run(&mut ast));

        let root = ast.stmts(ast.root()).to_vec();
        assert_eq!(root.len(), 2);
        let Node::If { stmts: guarded, .. } = ast[root[0]] else {
            panic!("expected helper guard");
        };
        assert!(ArrayAccessRewriter::is_helper(&ast, ast.stmts(guarded)[0]));

        let Node::Echo { ref exprs } = ast[echo] else {
            panic!("expected echo");
        };
        let Node::FuncCall { name, ref args } = ast[exprs[0]] else {
            panic!("expected call");
        };
        assert_eq!(ast.name_of(name), Some("_sg"));
        let values: Vec<NodeId> = args
            .iter()
            .map(|a| match ast[*a] {
                Node::Arg { value, .. } => value,
                _ => panic!("expected arg"),
            })
            .collect();
        assert_eq!(values, vec![arr, k]);
        assert!(ast.validate().is_ok());
    }

    #[test]
    fn test_reference_contexts_untouched() {
        let mut ast = Ast::new();
        let mut stmts = Vec::new();

        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let sort = ast.call("sort", vec![fetch]);
        stmts.push(ast.expr_stmt(sort));

        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let isset = ast.isset(vec![fetch]);
        stmts.push(ast.expr_stmt(isset));

        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let inc = ast.alloc(Node::IncDec {
            op: shroud_core::ast::IncDecOp::PostInc,
            var: fetch,
        });
        stmts.push(ast.expr_stmt(inc));

        let arr = ast.var("arr");
        let k = ast.var("k");
        let inner = ast.dim_fetch(arr, Some(k));
        let j = ast.var("j");
        let outer = ast.dim_fetch(inner, Some(j));
        let two = ast.int(2);
        let assign = ast.assign(outer, two);
        stmts.push(ast.expr_stmt(assign));

        let mut ast = ast.with_statements(stmts);
        assert!(!run(&mut ast));
    }

    #[test]
    fn test_helper_inserted_once() {
        let mut ast = Ast::new();
        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let echo = ast.echo(vec![fetch]);
        let mut ast = ast.with_statements(vec![echo]);
        assert!(run(&mut ast));

        let arr = ast.var("arr");
        let j = ast.var("j");
        let fetch = ast.dim_fetch(arr, Some(j));
        let echo = ast.echo(vec![fetch]);
        ast.push_stmt(echo);
        assert!(run(&mut ast));

        let helpers = ast
            .pre_order(ast.root())
            .into_iter()
            .filter(|id| ArrayAccessRewriter::is_helper(&ast, *id))
            .count();
        assert_eq!(helpers, 1);
    }

    #[test]
    fn test_namespaced_file_skipped() {
        let mut ast = Ast::new();
        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let echo = ast.echo(vec![fetch]);
        let body = ast.block(vec![echo]);
        let ns_name = ast.name("App");
        let ns = ast.alloc(Node::Namespace {
            name: Some(ns_name),
            stmts: body,
            braced: true,
        });
        let mut ast = ast.with_statements(vec![ns]);
        assert!(!run(&mut ast));
    }

    #[test]
    fn test_by_ref_user_parameter_untouched() {
        let mut ast = Ast::new();
        let var = ast.var("list");
        let param = ast.alloc(Node::Param {
            var,
            default: None,
            type_hint: None,
            by_ref: true,
            variadic: false,
        });
        let decl = ast.function("fill", vec![param], Vec::new());
        let arr = ast.var("arr");
        let k = ast.var("k");
        let fetch = ast.dim_fetch(arr, Some(k));
        let call = ast.call("fill", vec![fetch]);
        let stmt = ast.expr_stmt(call);
        let mut ast = ast.with_statements(vec![decl, stmt]);
        assert!(!run(&mut ast));
    }
}
