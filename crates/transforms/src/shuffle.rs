use crate::Transform;
use crate::config::ShuffleConfig;
use crate::util::{self, chance};
use rand::{rngs::StdRng, seq::SliceRandom};
use shroud_core::ast::{Ast, Node, NodeId, UnOp};
use shroud_core::rewrite::Rewriter;
use shroud_utils::errors::TransformError;
use std::collections::HashSet;
use tracing::debug;

/// What a safe chunk touches.
#[derive(Debug, Default, Clone)]
struct Effects {
    writes: HashSet<String>,
    reads: HashSet<String>,
    output: bool,
}

impl Effects {
    fn merge(&mut self, other: Effects) {
        self.writes.extend(other.writes);
        self.reads.extend(other.reads);
        self.output |= other.output;
    }

    fn independent_of(&self, other: &Effects) -> bool {
        self.writes.is_disjoint(&other.writes)
            && self.writes.is_disjoint(&other.reads)
            && other.writes.is_disjoint(&self.reads)
            && !(self.output && other.output)
    }
}

/// A run of statements moved as a unit. Pinned chunks carry no effects.
#[derive(Debug)]
struct Chunk {
    stmts: Vec<NodeId>,
    effects: Option<Effects>,
}

/// Reorders independent statements inside statement lists.
pub struct StatementShuffle {
    chunk_size: usize,
    ratio: u32,
}

impl StatementShuffle {
    pub fn new(config: &ShuffleConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            ratio: config.ratio,
        }
    }

    /// Splits `stmts` into safe and pinned chunks. Everything from the last `return` on is
    /// one pinned chunk.
    fn chunks(&self, ast: &Ast, stmts: &[NodeId]) -> Vec<Chunk> {
        let tail_start = stmts
            .iter()
            .rposition(|s| matches!(ast[*s], Node::Return { .. }))
            .unwrap_or(stmts.len());

        let mut chunks: Vec<Chunk> = Vec::new();
        for &stmt in &stmts[..tail_start] {
            match classify(ast, stmt) {
                Some(effects) => match chunks.last_mut() {
                    Some(Chunk {
                        stmts,
                        effects: Some(current),
                    }) if stmts.len() < self.chunk_size => {
                        stmts.push(stmt);
                        current.merge(effects);
                    }
                    _ => chunks.push(Chunk {
                        stmts: vec![stmt],
                        effects: Some(effects),
                    }),
                },
                None => chunks.push(Chunk {
                    stmts: vec![stmt],
                    effects: None,
                }),
            }
        }
        if tail_start < stmts.len() {
            chunks.push(Chunk {
                stmts: stmts[tail_start..].to_vec(),
                effects: None,
            });
        }
        chunks
    }

    /// Shuffles every eligible run of safe chunks. Returns whether the order changed.
    fn shuffle_runs(&self, chunks: &mut [Chunk], rng: &mut StdRng) -> bool {
        let mut changed = false;
        let mut start = 0;
        while start < chunks.len() {
            if chunks[start].effects.is_none() {
                start += 1;
                continue;
            }
            let end = chunks[start..]
                .iter()
                .position(|c| c.effects.is_none())
                .map_or(chunks.len(), |offset| start + offset);
            let run = &mut chunks[start..end];
            if run.len() >= 2 && independent(run) && chance(rng, self.ratio) {
                let before: Vec<NodeId> = run.iter().map(|c| c.stmts[0]).collect();
                run.shuffle(rng);
                let after: Vec<NodeId> = run.iter().map(|c| c.stmts[0]).collect();
                changed |= before != after;
            }
            start = end;
        }
        changed
    }
}

fn independent(run: &[Chunk]) -> bool {
    run.iter().enumerate().all(|(i, a)| {
        run[i + 1..].iter().all(|b| match (&a.effects, &b.effects) {
            (Some(x), Some(y)) => x.independent_of(y),
            _ => false,
        })
    })
}

fn is_scalar(ast: &Ast, id: NodeId) -> bool {
    match &ast[id] {
        Node::Int { .. } | Node::Float { .. } | Node::Str { .. } => true,
        Node::ConstFetch { name } => ast
            .name_of(*name)
            .is_some_and(|n| matches!(n.to_ascii_lowercase().as_str(), "true" | "false" | "null")),
        Node::Unary {
            op: UnOp::Neg | UnOp::Plus,
            expr,
        } => matches!(ast[*expr], Node::Int { .. } | Node::Float { .. }),
        _ => false,
    }
}

/// Effects of a safe statement, or `None` when it must stay in place.
fn classify(ast: &Ast, stmt: NodeId) -> Option<Effects> {
    let mut effects = Effects::default();
    match &ast[stmt] {
        Node::Expression { expr } => {
            let Node::Assign { var, expr } = ast[*expr] else {
                return None;
            };
            let name = ast.var_name(var)?;
            if !is_scalar(ast, expr) {
                return None;
            }
            effects.writes.insert(name.to_string());
        }
        Node::Global { vars } => {
            for var in vars {
                effects.writes.insert(ast.var_name(*var)?.to_string());
            }
        }
        Node::Static { vars } => {
            for item in vars {
                let Node::StaticVar { var, .. } = ast[*item] else {
                    return None;
                };
                let name = match &ast[var] {
                    Node::Ident { name } => name.as_str(),
                    _ => ast.var_name(var)?,
                };
                effects.writes.insert(name.to_string());
            }
        }
        Node::Echo { exprs } if exprs.len() == 1 => {
            match &ast[exprs[0]] {
                Node::Str { .. } => {}
                Node::Variable { .. } => {
                    effects.reads.insert(ast.var_name(exprs[0])?.to_string());
                }
                _ => return None,
            }
            effects.output = true;
        }
        _ => return None,
    }
    Some(effects)
}

impl Transform for StatementShuffle {
    fn name(&self) -> &'static str {
        "StatementShuffle"
    }

    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError> {
        let mut rewriter = Rewriter::for_ast(ast);
        let blocks: Vec<NodeId> = ast
            .post_order(ast.root())
            .into_iter()
            .filter(|id| matches!(ast[*id], Node::Block { .. }))
            .collect();

        for block in blocks {
            let stmts = ast.stmts(block).to_vec();
            if stmts.len() < 2 {
                continue;
            }
            let mut chunks = self.chunks(ast, &stmts);
            if !self.shuffle_runs(&mut chunks, rng) {
                continue;
            }
            // Nested lists were visited first and may already have a replacement.
            let order: Vec<NodeId> = chunks
                .into_iter()
                .flat_map(|c| c.stmts)
                .map(|id| rewriter.resolve(id))
                .collect();
            debug!(block = %block, statements = order.len(), "shuffled statement list");
            let replacement = ast.block(order);
            rewriter.request(block, replacement);
        }

        Ok(util::commit(rewriter, ast, self.name()))
    }
}
