use crate::Transform;
use crate::config::RateConfig;
use crate::util::{self, chance, in_const_context};
use rand::{Rng, rngs::StdRng};
use shroud_core::ast::{Ast, BinOp, Node, NodeId};
use shroud_core::rewrite::{ParentMap, Rewriter};
use shroud_utils::errors::TransformError;
use tracing::debug;

/// Literals at or beyond this magnitude are left alone so results stay in 32-bit range.
const LIMIT: i64 = 1 << 31;

/// Replaces integer literals with equivalent arithmetic.
pub struct ArithmeticEncoder {
    rate: u32,
}

impl ArithmeticEncoder {
    pub fn new(config: &RateConfig) -> Self {
        Self { rate: config.rate }
    }

    /// Whether the literal sits where an expression is not allowed or would hide a guard.
    fn is_pinned(ast: &Ast, parents: &ParentMap, id: NodeId) -> bool {
        if in_const_context(ast, parents, id) {
            return true;
        }
        let mut child = id;
        for parent in parents.ancestors(id) {
            match &ast[parent] {
                Node::Break { .. } | Node::Continue { .. } | Node::Declare { .. } => return true,
                Node::If { cond, .. } | Node::ElseIf { cond, .. } => return *cond == child,
                Node::Closure { .. } | Node::ArrowFn { .. } => return false,
                node if node.is_statement() => return false,
                _ => {}
            }
            child = parent;
        }
        false
    }

    fn encode(&self, ast: &mut Ast, rng: &mut StdRng, n: i64) -> NodeId {
        match rng.random_range(0..3) {
            0 => {
                let a = rng.random_range(-1000..1000);
                let l = ast.int(a);
                let r = ast.int(n - a);
                ast.binary(BinOp::Add, l, r)
            }
            1 => {
                let k = rng.random_range(1..0x1_0000);
                let l = ast.int(n ^ k);
                let r = ast.int(k);
                ast.binary(BinOp::BitXor, l, r)
            }
            _ => {
                let m = rng.random_range(2..100);
                let q = ast.int(n.div_euclid(m));
                let factor = ast.int(m);
                let product = ast.binary(BinOp::Mul, q, factor);
                let r = ast.int(n.rem_euclid(m));
                ast.binary(BinOp::Add, product, r)
            }
        }
    }
}

impl Transform for ArithmeticEncoder {
    fn name(&self) -> &'static str {
        "Arithmetic"
    }

    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError> {
        let mut rewriter = Rewriter::for_ast(ast);
        let literals: Vec<(NodeId, i64)> = ast
            .post_order(ast.root())
            .into_iter()
            .filter_map(|id| match ast[id] {
                Node::Int { value } if value.abs() < LIMIT => Some((id, value)),
                _ => None,
            })
            .filter(|(id, _)| !Self::is_pinned(ast, rewriter.parents(), *id))
            .collect();
        debug!(literals = literals.len(), "integer literals eligible");

        for (id, value) in literals {
            if !chance(rng, self.rate) {
                continue;
            }
            let encoded = self.encode(ast, rng, value);
            rewriter.request(id, encoded);
        }

        Ok(util::commit(rewriter, ast, self.name()))
    }
}
