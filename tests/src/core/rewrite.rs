use shroud_core::ast::{Ast, BinOp, Node};
use shroud_core::printer;
use shroud_core::rewrite::{ParentMap, Rewriter};

#[test]
fn test_parent_map_and_ancestors() {
    let mut ast = Ast::new();
    let a = ast.var("a");
    let one = ast.int(1);
    let sum = ast.binary(BinOp::Add, a, one);
    let ret = ast.ret(Some(sum));
    let f = ast.function("f", Vec::new(), vec![ret]);
    let ast = ast.with_statements(vec![f]);

    let parents = ParentMap::build(&ast);
    assert_eq!(parents.parent(a), Some(sum));
    assert!(parents.is_root(ast.root()));
    let ancestors = parents.ancestors(one);
    assert_eq!(ancestors[0], sum);
    assert_eq!(ancestors[1], ret);
    assert_eq!(*ancestors.last().unwrap(), ast.root());
    assert!(ancestors.contains(&f));
}

#[test]
fn test_nested_replacements_compose() {
    // echo 1 + 2;  →  echo 3 * (4 - 2);
    let mut ast = Ast::new();
    let one = ast.int(1);
    let two = ast.int(2);
    let sum = ast.binary(BinOp::Add, one, two);
    let echo = ast.echo(vec![sum]);
    let mut ast = ast.with_statements(vec![echo]);

    let mut rewriter = Rewriter::for_ast(&ast);
    let four = ast.int(4);
    let diff = ast.binary(BinOp::Sub, four, two);
    rewriter.request(one, diff);

    let three = ast.int(3);
    let product = ast.binary(BinOp::Mul, three, rewriter.resolve(one));
    rewriter.request(sum, product);
    assert_eq!(rewriter.resolve(sum), product);

    let report = rewriter.commit(&mut ast);
    assert!(report.changed());
    assert_eq!(report.pending, 0);
    assert_eq!(printer::print(&ast), "<?php\necho 3 * (4 - 2);\n");
    assert!(ast.validate().is_ok());
}

#[test]
fn test_root_replacement_swaps_root() {
    let mut ast = Ast::new();
    let old_root = ast.root();
    let mut rewriter = Rewriter::for_ast(&ast);
    let hello = ast.string("hello");
    let echo = ast.echo(vec![hello]);
    let new_root = ast.block(vec![echo]);
    rewriter.request(old_root, new_root);
    assert_eq!(rewriter.pending(), 1);

    let report = rewriter.commit(&mut ast);
    assert_eq!(report.applied, 1);
    assert_eq!(ast.root(), new_root);
    assert!(matches!(ast[ast.root()], Node::Block { .. }));
}

#[test]
fn test_detached_request_is_dropped() {
    let mut ast = Ast::new();
    let stray = ast.int(1);
    let other = ast.int(2);
    let mut rewriter = Rewriter::for_ast(&ast);
    rewriter.request(stray, other);
    assert_eq!(rewriter.pending(), 0);
    assert!(!rewriter.commit(&mut ast).changed());
}
