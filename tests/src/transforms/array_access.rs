use rand::SeedableRng;
use rand::rngs::StdRng;
use shroud_core::ast::{Ast, Node};
use shroud_transform::Transform;
use shroud_transform::array_access::ArrayAccessRewriter;
use shroud_transform::config::ArrayAccessConfig;

fn rewriter() -> ArrayAccessRewriter {
    ArrayAccessRewriter::new(&ArrayAccessConfig {
        enabled: true,
        rate: 100,
        helper: "_sg".to_string(),
    })
}

#[test]
fn test_assignment_target_never_rewritten() {
    // $arr[$k] = 1;
    let mut ast = Ast::new();
    let arr = ast.var("arr");
    let k = ast.var("k");
    let fetch = ast.dim_fetch(arr, Some(k));
    let one = ast.int(1);
    let assign = ast.assign(fetch, one);
    let stmt = ast.expr_stmt(assign);
    let mut ast = ast.with_statements(vec![stmt]);

    let mut rng = StdRng::seed_from_u64(0);
    assert!(!rewriter().apply(&mut ast, &mut rng).unwrap());
    assert_eq!(ast.stmts(ast.root()), &[stmt]);
    assert!(matches!(ast[assign], Node::Assign { var, .. } if var == fetch));
}

#[test]
fn test_read_goes_through_helper() {
    // echo $arr[$k];
    let mut ast = Ast::new();
    let arr = ast.var("arr");
    let k = ast.var("k");
    let fetch = ast.dim_fetch(arr, Some(k));
    let echo = ast.echo(vec![fetch]);
    let mut ast = ast.with_statements(vec![echo]);

    let mut rng = StdRng::seed_from_u64(0);
    assert!(rewriter().apply(&mut ast, &mut rng).unwrap());

    let Node::Echo { ref exprs } = ast[echo] else {
        panic!("expected echo");
    };
    let Node::FuncCall { name, ref args } = ast[exprs[0]] else {
        panic!("expected helper call");
    };
    assert_eq!(ast.name_of(name), Some("_sg"));
    let values: Vec<_> = args
        .iter()
        .map(|a| match ast[*a] {
            Node::Arg { value, .. } => value,
            ref other => panic!("expected argument, found {}", other.kind_name()),
        })
        .collect();
    assert_eq!(values, vec![arr, k]);
    assert_eq!(ast.var_name(arr), Some("arr"));
    assert_eq!(ast.var_name(k), Some("k"));

    // helper definition is emitted once, ahead of the rewritten code
    let root = ast.stmts(ast.root()).to_vec();
    assert_eq!(root.len(), 2);
    assert_eq!(root[1], echo);
    assert!(ast.validate().is_ok());
}
