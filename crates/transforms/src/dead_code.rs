use crate::Transform;
use crate::config::DeadCodeConfig;
use crate::junk::JunkFactory;
use crate::util::{
    self, chance, false_condition, leading_declares, owns_statement_list, uses_namespaces,
};
use rand::{Rng, rngs::StdRng};
use shroud_core::ast::{Ast, Node, NodeId};
use shroud_core::rewrite::{ParentMap, Rewriter};
use shroud_utils::errors::TransformError;
use tracing::debug;

/// Injects unreachable conditionals and inert statements into statement lists.
pub struct DeadCodeInjector {
    rate: u32,
    max_depth: usize,
}

impl DeadCodeInjector {
    pub fn new(config: &DeadCodeConfig) -> Self {
        Self {
            rate: config.rate,
            max_depth: config.max_depth,
        }
    }

    /// Statement lists eligible for injection, with the first index code may go to.
    fn injection_points(&self, ast: &Ast, parents: &ParentMap) -> Vec<(NodeId, usize)> {
        let root = ast.root();
        let mut points = Vec::new();
        for id in ast.pre_order(root) {
            if !matches!(ast[id], Node::Block { .. }) {
                continue;
            }
            let depth = 1 + parents
                .ancestors(id)
                .into_iter()
                .filter(|a| matches!(ast[*a], Node::Block { .. }))
                .count();
            if depth > self.max_depth {
                continue;
            }
            if id == root {
                if !uses_namespaces(ast) {
                    points.push((id, leading_declares(ast, ast.stmts(id))));
                }
                continue;
            }
            let owned = parents
                .parent(id)
                .is_some_and(|p| owns_statement_list(&ast[p]));
            if owned {
                points.push((id, 0));
            }
        }
        points
    }

    /// Either `if (<false>) { junk… }` or a single junk statement.
    fn dead_statement(&self, ast: &mut Ast, rng: &mut StdRng, junk: &mut JunkFactory) -> NodeId {
        if rng.random_bool(0.5) {
            let cond = false_condition(ast, rng);
            let count = rng.random_range(1..=3);
            let body = junk.statements(ast, rng, count);
            ast.if_stmt(cond, body, None)
        } else {
            junk.statement(ast, rng)
        }
    }
}

impl Transform for DeadCodeInjector {
    fn name(&self) -> &'static str {
        "DeadCode"
    }

    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError> {
        let mut rewriter = Rewriter::for_ast(ast);
        let points = self.injection_points(ast, rewriter.parents());
        debug!(points = points.len(), "dead-code injection points");

        let mut junk = JunkFactory::for_ast(ast);
        for (block, first) in points {
            if !chance(rng, self.rate) {
                continue;
            }
            let mut stmts = ast.stmts(block).to_vec();
            let at = rng.random_range(first..=stmts.len().max(first));
            let dead = self.dead_statement(ast, rng, &mut junk);
            stmts.insert(at.min(stmts.len()), dead);
            let replacement = ast.block(stmts);
            rewriter.request(block, replacement);
        }

        Ok(util::commit(rewriter, ast, self.name()))
    }
}
