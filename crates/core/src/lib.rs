pub mod ast;
pub mod build;
pub mod printer;
pub mod rewrite;
pub mod scramble;

pub use ast::{Ast, Node, NodeId};
