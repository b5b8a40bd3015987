//! Deferred node replacement.
//!
//! Passes never mutate the tree while walking it. They record `(original, replacement)` pairs
//! on a [`Rewriter`] and apply them all in one [`Rewriter::commit`]. Replacements are keyed by
//! the parent recorded in a [`ParentMap`] built before the walk, so commit only has to touch
//! parents that actually changed.

use crate::ast::{Ast, NodeId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Child-to-parent relation for every node reachable from the root.
#[derive(Debug, Clone, Default)]
pub struct ParentMap {
    parents: HashMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl ParentMap {
    /// Walks the tree once, recording the enclosing node for each child.
    ///
    /// The walk keeps an explicit stack of `(node, entered)` frames; a node's parent is
    /// whatever node sits on top of the "entered" path when the child is first visited.
    pub fn build(ast: &Ast) -> Self {
        let mut parents = HashMap::with_capacity(ast.len());
        let mut path: Vec<NodeId> = Vec::new();
        let mut stack = vec![(ast.root(), false)];

        while let Some((id, exit)) = stack.pop() {
            if exit {
                path.pop();
                continue;
            }
            if let Some(&top) = path.last() {
                parents.insert(id, top);
            }
            path.push(id);
            stack.push((id, true));
            for child in ast.children(id).into_iter().rev() {
                stack.push((child, false));
            }
        }

        Self {
            parents,
            root: Some(ast.root()),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Enclosing nodes from the immediate parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.root == Some(id)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// One requested substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replacement {
    pub original: NodeId,
    pub replacement: NodeId,
}

/// Outcome of [`Rewriter::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Replacements written into a parent slot (or swapped in as the root).
    pub applied: usize,
    /// Replacements whose original was no longer found in its parent.
    pub pending: usize,
}

impl CommitReport {
    pub const fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Collects replacements during a walk and applies them afterwards.
#[derive(Debug)]
pub struct Rewriter {
    parents: ParentMap,
    by_parent: HashMap<NodeId, Vec<Replacement>>,
    latest: HashMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl Rewriter {
    pub fn new(parents: ParentMap) -> Self {
        Self {
            parents,
            by_parent: HashMap::new(),
            latest: HashMap::new(),
            root: None,
        }
    }

    /// Convenience constructor building the parent map from `ast`.
    pub fn for_ast(ast: &Ast) -> Self {
        Self::new(ParentMap::build(ast))
    }

    pub const fn parents(&self) -> &ParentMap {
        &self.parents
    }

    /// Records that `original` should be replaced by `replacement`.
    ///
    /// Requesting a replacement for the root swaps the tree's root at commit. Requests for
    /// nodes that have no recorded parent and are not the root are dropped with a warning.
    pub fn request(&mut self, original: NodeId, replacement: NodeId) {
        if original == replacement {
            return;
        }
        self.latest.insert(original, replacement);
        if self.parents.is_root(original) {
            self.root = Some(replacement);
            return;
        }
        match self.parents.parent(original) {
            Some(parent) => self.by_parent.entry(parent).or_default().push(Replacement {
                original,
                replacement,
            }),
            None => warn!(node = %original, "replacement requested for detached node"),
        }
    }

    /// The node that currently stands for `id`, following chains of replacements.
    ///
    /// Passes that build a replacement for a parent after one of its children was already
    /// replaced must splice in `resolve(child)` instead of the stale child id.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        let mut current = id;
        let mut hops = 0;
        while let Some(&next) = self.latest.get(&current) {
            current = next;
            hops += 1;
            if hops > self.latest.len() {
                break;
            }
        }
        current
    }

    pub fn is_replaced(&self, id: NodeId) -> bool {
        self.latest.contains_key(&id)
    }

    /// Number of requests not yet committed.
    pub fn pending(&self) -> usize {
        self.by_parent.values().map(Vec::len).sum::<usize>() + usize::from(self.root.is_some())
    }

    /// Applies every recorded replacement to `ast` and consumes the rewriter.
    ///
    /// Parents are visited in post-order so nested replacements land before their ancestors
    /// are examined. Within one parent, requests are applied in the order they were made, so
    /// a later request for the same original wins once the earlier one has been written.
    pub fn commit(mut self, ast: &mut Ast) -> CommitReport {
        let mut report = CommitReport::default();
        if self.by_parent.is_empty() && self.root.is_none() {
            return report;
        }

        for parent in ast.post_order(ast.root()) {
            let Some(requests) = self.by_parent.remove(&parent) else {
                continue;
            };
            for Replacement {
                original,
                replacement,
            } in requests
            {
                // A node replaced twice in the same parent: only the last request still
                // finds its original, so collapse the chain first.
                let target = self.resolve(original);
                if ast[parent].replace_child(original, target) {
                    report.applied += 1;
                } else if !ast.children(parent).contains(&target) {
                    debug!(node = %original, replacement = %replacement, "original not found in parent");
                    report.pending += 1;
                }
            }
        }

        for requests in self.by_parent.values() {
            report.pending += requests.len();
        }

        if let Some(root) = self.root.take() {
            ast.set_root(self.resolve(root));
            report.applied += 1;
        }

        debug!(
            applied = report.applied,
            pending = report.pending,
            "committed rewrites"
        );
        report
    }
}
