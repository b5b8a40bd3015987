/// Module for computing analytical metrics to evaluate source obfuscation passes.
///
/// Implements a small set of metrics quantified by printed size, statement count, branching
/// and nesting depth to assess pass potency (analyst effort) against output growth. The pass
/// runner collects metrics before and after each pass and logs the delta.
///
/// # Usage
/// ```rust,ignore
/// let ast: Ast = serde_json::from_str(&json)?;
/// let metrics = metrics::collect_metrics(&ast)?;
/// println!("{}", serde_json::to_string_pretty(&metrics)?);
/// ```
use serde::{Deserialize, Serialize};
use shroud_core::ast::{Ast, BinOp, Node, NodeId};
use shroud_core::printer;
use shroud_utils::errors::MetricsError;

/// Represents a set of analytical metrics for evaluating obfuscation.
///
/// Used to compare pre- and post-pass states of a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Length of the printed PHP source in bytes.
    pub byte_len: usize,
    /// Nodes reachable from the root.
    pub node_cnt: usize,
    /// Statements reachable from the root (statement lists excluded).
    pub stmt_cnt: usize,
    /// Branching constructs: conditionals, loops, cases, catches, ternaries, short-circuits.
    pub branch_cnt: usize,
    /// Deepest nesting of statement lists.
    pub max_nesting: usize,
    /// Composite potency score (heuristic based on statements, branches and nesting).
    pub potency: f64,
}

/// Collects metrics from a syntax tree.
///
/// # Arguments
/// * `ast` - The tree to measure; its root must be a statement list.
///
/// # Returns
/// A `Metrics` struct with computed metrics, or an error if the tree is malformed.
pub fn collect_metrics(ast: &Ast) -> Result<Metrics, MetricsError> {
    let root = ast.root();
    match ast.get(root) {
        Some(Node::Block { .. }) => {}
        Some(other) => return Err(MetricsError::InvalidRoot(other.kind_name())),
        None => return Err(MetricsError::DanglingNode),
    }

    let mut node_cnt = 0;
    let mut stmt_cnt = 0;
    let mut branch_cnt = 0;
    let mut max_nesting = 0;
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

    while let Some((id, depth)) = stack.pop() {
        let Some(node) = ast.get(id) else {
            return Err(MetricsError::DanglingNode);
        };
        node_cnt += 1;
        if node.is_statement() && !matches!(node, Node::Block { .. }) {
            stmt_cnt += 1;
        }
        if is_branch(node) {
            branch_cnt += 1;
        }
        let depth = if matches!(node, Node::Block { .. }) {
            depth + 1
        } else {
            depth
        };
        max_nesting = max_nesting.max(depth);
        stack.extend(node.children().into_iter().map(|c| (c, depth)));
    }

    let metrics = Metrics {
        byte_len: printer::print(ast).len(),
        node_cnt,
        stmt_cnt,
        branch_cnt,
        max_nesting,
        potency: score(stmt_cnt, branch_cnt, max_nesting),
    };
    tracing::trace!(
        nodes = metrics.node_cnt,
        statements = metrics.stmt_cnt,
        potency = metrics.potency,
        "collected metrics"
    );
    Ok(metrics)
}

fn is_branch(node: &Node) -> bool {
    match node {
        Node::If { .. }
        | Node::ElseIf { .. }
        | Node::While { .. }
        | Node::DoWhile { .. }
        | Node::For { .. }
        | Node::Foreach { .. }
        | Node::Case { .. }
        | Node::Catch { .. }
        | Node::Ternary { .. } => true,
        Node::Binary { op, .. } => matches!(
            op,
            BinOp::BoolAnd | BinOp::BoolOr | BinOp::LogicalAnd | BinOp::LogicalOr | BinOp::Coalesce
        ),
        _ => false,
    }
}

/// Computes a composite potency score.
///
/// Statement count contributes logarithmically; every branch and every level of nesting is
/// something a reader has to keep in their head.
///
/// # Returns
/// A potency score (higher indicates greater complexity).
fn score(stmts: usize, branches: usize, nesting: usize) -> f64 {
    5.0 * (stmts.max(1) as f64).log2() + branches as f64 + 3.0 * nesting as f64
}

/// Compares two sets of metrics to evaluate a pass.
///
/// Computes the difference in potency scores, adjusted for output growth. A positive result
/// indicates the pass increased complexity without excessive size growth.
///
/// # Arguments
/// * `before` - Metrics before the pass.
/// * `after` - Metrics after the pass.
///
/// # Returns
/// A score representing the pass's effectiveness (positive is better).
pub fn compare(before: &Metrics, after: &Metrics) -> f64 {
    after.potency - before.potency - 0.01 * (after.byte_len as f64 - before.byte_len as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_line() -> Ast {
        let mut ast = Ast::new();
        for (name, value) in [("a", 1), ("b", 2)] {
            let var = ast.var(name);
            let lit = ast.int(value);
            let assign = ast.assign(var, lit);
            let stmt = ast.expr_stmt(assign);
            ast.push_stmt(stmt);
        }
        ast
    }

    #[test]
    fn test_collect_metrics_straight_line() {
        let metrics = collect_metrics(&straight_line()).unwrap();
        assert_eq!(metrics.stmt_cnt, 2);
        assert_eq!(metrics.branch_cnt, 0);
        assert_eq!(metrics.max_nesting, 1);
        assert!(metrics.byte_len > 0);
        assert!(metrics.potency > 0.0);
    }

    #[test]
    fn test_wrapping_increases_potency() {
        let before_ast = straight_line();
        let before = collect_metrics(&before_ast).unwrap();

        let mut ast = straight_line();
        let root = ast.root();
        let stmts = ast.stmts(root).to_vec();
        let cond = ast.int(1);
        let wrapped = ast.if_stmt(cond, stmts, None);
        let ast = ast.with_statements(vec![wrapped]);
        let after = collect_metrics(&ast).unwrap();

        assert_eq!(after.branch_cnt, 1);
        assert_eq!(after.max_nesting, 2);
        assert!(compare(&before, &after) > 0.0);
    }

    #[test]
    fn test_rejects_non_block_root() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        ast.set_root(one);
        assert!(matches!(
            collect_metrics(&ast),
            Err(MetricsError::InvalidRoot("Int"))
        ));
    }

    #[test]
    fn test_metrics_serialize() {
        let metrics = collect_metrics(&straight_line()).unwrap();
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["stmt_cnt"], 2);
    }
}
