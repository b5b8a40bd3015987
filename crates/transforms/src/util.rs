//! Helpers shared by the structural passes: probability rolls, opaque conditions, context
//! queries over the parent map and the commit wrapper.

use rand::Rng;
use rand::rngs::StdRng;
use shroud_core::ast::{Ast, BinOp, Node, NodeId, UnOp};
use shroud_core::rewrite::{ParentMap, Rewriter};
use tracing::warn;

/// Rolls a percentage: `true` with probability `rate / 100`.
pub fn chance(rng: &mut StdRng, rate: u32) -> bool {
    match rate {
        0 => false,
        r if r >= 100 => true,
        r => rng.random_range(0..100) < r,
    }
}

/// Builds a condition that always evaluates to true.
///
/// Shapes: small integer, `!0`, `N == N`, `A > B` with `A > B`, `N || 0`. With
/// `deterministic` the condition is always the literal `1`.
pub fn true_condition(ast: &mut Ast, rng: &mut StdRng, deterministic: bool) -> NodeId {
    if deterministic {
        return ast.int(1);
    }
    match rng.random_range(0..5) {
        0 => ast.int(rng.random_range(1..10)),
        1 => {
            let zero = ast.int(0);
            ast.unary(UnOp::Not, zero)
        }
        2 => {
            let n = rng.random_range(1..100);
            let l = ast.int(n);
            let r = ast.int(n);
            ast.binary(BinOp::Equal, l, r)
        }
        3 => {
            let low = rng.random_range(0..50);
            let high = low + rng.random_range(1..50);
            let l = ast.int(high);
            let r = ast.int(low);
            ast.binary(BinOp::Greater, l, r)
        }
        _ => {
            let n = rng.random_range(1..10);
            let l = ast.int(n);
            let r = ast.int(0);
            ast.binary(BinOp::BoolOr, l, r)
        }
    }
}

/// Builds a condition that always evaluates to false.
///
/// Shapes: `false`, `0`, `!1`, `A === B` with `A != B`, `A < B` with `A > B`.
pub fn false_condition(ast: &mut Ast, rng: &mut StdRng) -> NodeId {
    match rng.random_range(0..5) {
        0 => ast.constant("false"),
        1 => ast.int(0),
        2 => {
            let one = ast.int(rng.random_range(1..10));
            ast.unary(UnOp::Not, one)
        }
        3 => {
            let a = rng.random_range(0..50);
            let l = ast.int(a);
            let r = ast.int(a + rng.random_range(1..50));
            ast.binary(BinOp::Identical, l, r)
        }
        _ => {
            let low = rng.random_range(0..50);
            let l = ast.int(low + rng.random_range(1..50));
            let r = ast.int(low);
            ast.binary(BinOp::Less, l, r)
        }
    }
}

fn int_value(ast: &Ast, id: NodeId) -> Option<i64> {
    match ast[id] {
        Node::Int { value } => Some(value),
        _ => None,
    }
}

fn const_name(ast: &Ast, id: NodeId) -> Option<String> {
    match ast[id] {
        Node::ConstFetch { name } => ast.name_of(name).map(|n| n.to_ascii_lowercase()),
        _ => None,
    }
}

/// Recognises the shapes produced by [`true_condition`] (and `true`).
pub fn is_always_true(ast: &Ast, id: NodeId) -> bool {
    match &ast[id] {
        Node::Int { value } => *value != 0,
        Node::ConstFetch { .. } => const_name(ast, id).as_deref() == Some("true"),
        Node::Unary {
            op: UnOp::Not,
            expr,
        } => is_always_false(ast, *expr),
        Node::Binary { op, left, right } => {
            let pair = int_value(ast, *left).zip(int_value(ast, *right));
            match op {
                BinOp::Equal | BinOp::Identical => pair.is_some_and(|(l, r)| l == r),
                BinOp::Greater => pair.is_some_and(|(l, r)| l > r),
                BinOp::Less => pair.is_some_and(|(l, r)| l < r),
                BinOp::BoolOr | BinOp::LogicalOr => is_always_true(ast, *left),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Recognises the shapes produced by [`false_condition`].
pub fn is_always_false(ast: &Ast, id: NodeId) -> bool {
    match &ast[id] {
        Node::Int { value } => *value == 0,
        Node::ConstFetch { .. } => const_name(ast, id).as_deref() == Some("false"),
        Node::Unary {
            op: UnOp::Not,
            expr,
        } => matches!(ast[*expr], Node::Int { value } if value != 0),
        Node::Binary { op, left, right } => {
            let pair = int_value(ast, *left).zip(int_value(ast, *right));
            match op {
                BinOp::Identical | BinOp::Equal => pair.is_some_and(|(l, r)| l != r),
                BinOp::Less => pair.is_some_and(|(l, r)| l >= r),
                BinOp::Greater => pair.is_some_and(|(l, r)| l <= r),
                _ => false,
            }
        }
        _ => false,
    }
}

/// An `if` without `elseif` branches whose condition is an opaque constant.
pub fn is_guard(ast: &Ast, id: NodeId) -> bool {
    match &ast[id] {
        Node::If { cond, elseifs, .. } => {
            elseifs.is_empty() && (is_always_true(ast, *cond) || is_always_false(ast, *cond))
        }
        _ => false,
    }
}

/// True when `id` sits in a constant-expression slot: constant values, property and parameter
/// defaults, static-variable defaults and `declare` values. Function bodies end the search.
pub fn in_const_context(ast: &Ast, parents: &ParentMap, id: NodeId) -> bool {
    for ancestor in parents.ancestors(id) {
        match ast[ancestor] {
            Node::ConstItem { .. }
            | Node::PropertyItem { .. }
            | Node::StaticVar { .. }
            | Node::DeclareItem { .. }
            | Node::Param { .. } => return true,
            Node::Function { .. }
            | Node::ClassMethod { .. }
            | Node::Closure { .. }
            | Node::ArrowFn { .. }
            | Node::Block { .. } => return false,
            _ => {}
        }
    }
    false
}

/// True when the root statement list contains a namespace declaration.
pub fn uses_namespaces(ast: &Ast) -> bool {
    ast.stmts(ast.root())
        .iter()
        .any(|s| matches!(ast[*s], Node::Namespace { .. }))
}

/// Index of the first root statement that may precede injected code (after leading `declare`s
/// and inline HTML).
pub fn leading_declares(ast: &Ast, stmts: &[NodeId]) -> usize {
    stmts
        .iter()
        .take_while(|s| matches!(ast[**s], Node::Declare { .. } | Node::InlineHtml { .. }))
        .count()
}

/// Kinds whose `Block` child is a statement list that passes may rewrite.
pub fn owns_statement_list(node: &Node) -> bool {
    matches!(
        node,
        Node::Function { .. }
            | Node::ClassMethod { .. }
            | Node::Closure { .. }
            | Node::If { .. }
            | Node::ElseIf { .. }
            | Node::Else { .. }
            | Node::While { .. }
            | Node::DoWhile { .. }
            | Node::For { .. }
            | Node::Foreach { .. }
            | Node::TryCatch { .. }
            | Node::Catch { .. }
            | Node::Finally { .. }
            | Node::Case { .. }
    )
}

/// Commits `rewriter`, warning about replacements that could not be placed.
pub fn commit(rewriter: Rewriter, ast: &mut Ast, pass: &str) -> bool {
    let report = rewriter.commit(ast);
    if report.pending > 0 {
        warn!(pass, pending = report.pending, "replacements left pending");
    }
    report.changed()
}
