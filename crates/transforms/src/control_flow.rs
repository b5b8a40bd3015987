use crate::Transform;
use crate::config::ControlFlowConfig;
use crate::junk::JunkFactory;
use crate::util::{self, chance, is_guard, owns_statement_list, true_condition};
use rand::{Rng, rngs::StdRng};
use shroud_core::ast::{Ast, Node, NodeId};
use shroud_core::rewrite::{ParentMap, Rewriter};
use shroud_utils::errors::TransformError;
use tracing::debug;

/// Wraps statement lists in always-true conditionals.
///
/// A wrapped list becomes `if (<true>) { … }`, nested `depth` times. The innermost level may
/// carry an `else` full of junk that can never run.
pub struct ControlFlowWrapper {
    rate: u32,
    depth: usize,
    deterministic: bool,
    junk_else: bool,
}

impl ControlFlowWrapper {
    pub fn new(config: &ControlFlowConfig) -> Self {
        Self {
            rate: config.rate,
            depth: config.depth.max(1),
            deterministic: config.deterministic,
            junk_else: config.junk_else,
        }
    }

    /// Whether `block` may be wrapped.
    fn is_candidate(ast: &Ast, parents: &ParentMap, block: NodeId) -> bool {
        let Some(parent) = parents.parent(block) else {
            return false;
        };
        if !owns_statement_list(&ast[parent]) {
            return false;
        }
        // Bodies of an existing wrapper, including its dead branch.
        if is_guard(ast, parent) {
            return false;
        }
        if matches!(ast[parent], Node::Else { .. })
            && parents.parent(parent).is_some_and(|p| is_guard(ast, p))
        {
            return false;
        }

        let stmts = ast.stmts(block);
        match stmts {
            [] => false,
            [only] if is_guard(ast, *only) => false,
            _ => !stmts.iter().any(|s| matches!(ast[*s], Node::Label { .. })),
        }
    }

    fn wrap(
        &self,
        ast: &mut Ast,
        rng: &mut StdRng,
        junk: &mut JunkFactory,
        stmts: Vec<NodeId>,
    ) -> NodeId {
        let mut body = stmts;
        for level in 0..self.depth {
            let cond = true_condition(ast, rng, self.deterministic);
            let else_stmts = (level == 0 && self.junk_else).then(|| {
                let count = rng.random_range(1..=2);
                junk.statements(ast, rng, count)
            });
            body = vec![ast.if_stmt(cond, body, else_stmts)];
        }
        ast.block(body)
    }
}

impl Transform for ControlFlowWrapper {
    fn name(&self) -> &'static str {
        "ControlFlow"
    }

    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError> {
        let mut rewriter = Rewriter::for_ast(ast);
        let candidates: Vec<NodeId> = ast
            .post_order(ast.root())
            .into_iter()
            .filter(|id| matches!(ast[*id], Node::Block { .. }))
            .filter(|id| Self::is_candidate(ast, rewriter.parents(), *id))
            .collect();
        debug!(candidates = candidates.len(), "control-flow candidates");

        let mut junk = JunkFactory::for_ast(ast);
        for block in candidates {
            if !chance(rng, self.rate) {
                continue;
            }
            let stmts = ast.stmts(block).to_vec();
            let wrapped = self.wrap(ast, rng, &mut junk, stmts);
            rewriter.request(block, wrapped);
        }

        Ok(util::commit(rewriter, ast, self.name()))
    }
}
