//! Generators for inert statements: assignments to fresh variables and calls whose result is
//! discarded. Nothing produced here reads or writes a variable that exists in the program.

use rand::Rng;
use rand::rngs::StdRng;
use shroud_core::ast::{Ast, BinOp, Node, NodeId};
use std::collections::HashSet;

/// Builtins without side effects, with the argument shape they accept.
const PURE_CALLS: &[(&str, JunkArg)] = &[
    ("strlen", JunkArg::Str),
    ("md5", JunkArg::Str),
    ("strtoupper", JunkArg::Str),
    ("is_numeric", JunkArg::Str),
    ("abs", JunkArg::Int),
    ("intdiv", JunkArg::IntPair),
    ("max", JunkArg::IntPair),
    ("min", JunkArg::IntPair),
];

#[derive(Debug, Clone, Copy)]
enum JunkArg {
    Str,
    Int,
    IntPair,
}

/// Builds junk statements that never collide with the program's variables.
#[derive(Debug)]
pub struct JunkFactory {
    taken: HashSet<String>,
}

impl JunkFactory {
    /// Records every plain variable name used anywhere in `ast`.
    pub fn for_ast(ast: &Ast) -> Self {
        let taken = ast
            .pre_order(ast.root())
            .into_iter()
            .filter_map(|id| ast.var_name(id).map(str::to_string))
            .collect();
        Self { taken }
    }

    /// A variable name unused by the program and by earlier calls.
    pub fn fresh_name(&mut self, rng: &mut StdRng) -> String {
        loop {
            let name = format!("_{:06x}", rng.random_range(0..0x100_0000u32));
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// One inert statement.
    pub fn statement(&mut self, ast: &mut Ast, rng: &mut StdRng) -> NodeId {
        let expr = match rng.random_range(0..3) {
            0 => {
                let var = self.fresh_var(ast, rng);
                let value = ast.int(rng.random_range(0..1000));
                ast.assign(var, value)
            }
            1 => {
                let var = self.fresh_var(ast, rng);
                let n = ast.int(rng.random_range(0..1000));
                let m = rng.random_range(1..100);
                let plus = ast.int(m);
                let minus = ast.int(m);
                let sum = ast.binary(BinOp::Add, n, plus);
                let value = ast.binary(BinOp::Sub, sum, minus);
                ast.assign(var, value)
            }
            _ => {
                let call = pure_call(ast, rng);
                if rng.random_bool(0.5) {
                    call
                } else {
                    let var = self.fresh_var(ast, rng);
                    ast.assign(var, call)
                }
            }
        };
        ast.expr_stmt(expr)
    }

    /// `count` inert statements.
    pub fn statements(&mut self, ast: &mut Ast, rng: &mut StdRng, count: usize) -> Vec<NodeId> {
        (0..count).map(|_| self.statement(ast, rng)).collect()
    }

    fn fresh_var(&mut self, ast: &mut Ast, rng: &mut StdRng) -> NodeId {
        let name = self.fresh_name(rng);
        ast.var(&name)
    }
}

fn pure_call(ast: &mut Ast, rng: &mut StdRng) -> NodeId {
    let (name, shape) = PURE_CALLS[rng.random_range(0..PURE_CALLS.len())];
    let args = match shape {
        JunkArg::Str => {
            let text: String = (0..rng.random_range(3..9))
                .map(|_| char::from(rng.random_range(b'a'..=b'z')))
                .collect();
            vec![ast.string(&text)]
        }
        JunkArg::Int => vec![ast.int(rng.random_range(-500..500))],
        JunkArg::IntPair => vec![
            ast.int(rng.random_range(1..500)),
            ast.int(rng.random_range(1..50)),
        ],
    };
    ast.call(name, args)
}

/// True for statements this module produces: expression statements assigning to or calling
/// nothing but fresh `_xxxxxx` variables and pure builtins.
pub fn is_junk(ast: &Ast, stmt: NodeId) -> bool {
    let Node::Expression { expr } = ast[stmt] else {
        return false;
    };
    let value = match ast[expr] {
        Node::Assign { var, expr } => {
            let fresh = ast
                .var_name(var)
                .is_some_and(|n| n.len() == 7 && n.starts_with('_'));
            if !fresh {
                return false;
            }
            expr
        }
        _ => expr,
    };
    match &ast[value] {
        Node::Int { .. } => true,
        Node::Binary { left, right, .. } => ast
            .pre_order(*left)
            .into_iter()
            .chain(ast.pre_order(*right))
            .all(|id| matches!(ast[id], Node::Int { .. } | Node::Binary { .. })),
        Node::FuncCall { name, .. } => ast
            .name_of(*name)
            .is_some_and(|n| PURE_CALLS.iter().any(|(pure, _)| *pure == n)),
        _ => false,
    }
}
