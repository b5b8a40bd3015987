use rand::SeedableRng;
use rand::rngs::StdRng;
use shroud_core::ast::{Ast, Node, NodeId};
use shroud_core::printer;
use shroud_transform::Transform;
use shroud_transform::config::ControlFlowConfig;
use shroud_transform::control_flow::ControlFlowWrapper;
use shroud_transform::util::is_guard;

fn wrapper(depth: usize, junk_else: bool) -> ControlFlowWrapper {
    ControlFlowWrapper::new(&ControlFlowConfig {
        enabled: true,
        rate: 100,
        depth,
        deterministic: false,
        junk_else,
    })
}

/// function f() { echo 'a'; echo 'b'; }
fn sample() -> (Ast, NodeId) {
    let mut ast = Ast::new();
    let a = ast.string("a");
    let echo_a = ast.echo(vec![a]);
    let b = ast.string("b");
    let echo_b = ast.echo(vec![b]);
    let f = ast.function("f", Vec::new(), vec![echo_a, echo_b]);
    (ast.with_statements(vec![f]), f)
}

fn body(ast: &Ast, f: NodeId) -> Vec<NodeId> {
    let Node::Function { stmts, .. } = ast[f] else {
        panic!("expected function");
    };
    ast.stmts(stmts).to_vec()
}

#[test]
fn test_second_run_adds_no_nesting() {
    for seed in 0..8 {
        for junk_else in [false, true] {
            let (mut ast, f) = sample();
            let mut rng = StdRng::seed_from_u64(seed);
            let pass = wrapper(1, junk_else);
            assert!(pass.apply(&mut ast, &mut rng).unwrap());
            let once = printer::print(&ast);

            let wrapped = body(&ast, f);
            assert_eq!(wrapped.len(), 1);
            assert!(is_guard(&ast, wrapped[0]));

            assert!(!pass.apply(&mut ast, &mut rng).unwrap());
            assert_eq!(printer::print(&ast), once);
        }
    }
}

#[test]
fn test_wrapped_statements_keep_order() {
    let (mut ast, f) = sample();
    let original = body(&ast, f);
    let mut rng = StdRng::seed_from_u64(3);
    wrapper(1, false).apply(&mut ast, &mut rng).unwrap();

    let wrapped = body(&ast, f);
    let Node::If { stmts, .. } = ast[wrapped[0]] else {
        panic!("expected guard");
    };
    assert_eq!(ast.stmts(stmts), original.as_slice());
}
