use shroud_analysis::collect_metrics;
use shroud_core::ast::{Ast, BinOp, Node, NodeId};
use shroud_core::printer;
use shroud_core::scramble::IdentifierCategory;
use shroud_transform::config::ObfuscationConfig;
use shroud_transform::obfuscator::ObfuscationContext;
use std::sync::Arc;

/// function f($a, $b) { $c = $a + $b; return $c; }
fn add_function(ast: &mut Ast, name: &str) -> (NodeId, Vec<NodeId>) {
    let pa = ast.param("a", None);
    let pb = ast.param("b", None);
    let c = ast.var("c");
    let a = ast.var("a");
    let b = ast.var("b");
    let sum = ast.binary(BinOp::Add, a, b);
    let assign = ast.assign(c, sum);
    let s1 = ast.expr_stmt(assign);
    let c2 = ast.var("c");
    let s2 = ast.ret(Some(c2));
    (ast.function(name, vec![pa, pb], vec![s1, s2]), vec![s1, s2])
}

/// echo <name>(1, 2);
fn caller(name: &str) -> Ast {
    let mut ast = Ast::new();
    let one = ast.int(1);
    let two = ast.int(2);
    let call = ast.call(name, vec![one, two]);
    let echo = ast.echo(vec![call]);
    ast.with_statements(vec![echo])
}

fn called_name(ast: &Ast) -> String {
    let root = ast.stmts(ast.root());
    let Node::Echo { ref exprs } = ast[root[0]] else {
        panic!("expected echo");
    };
    let Node::FuncCall { name, .. } = ast[exprs[0]] else {
        panic!("expected call");
    };
    ast.name_of(name).unwrap().to_string()
}

#[test]
fn test_deterministic_wrap_of_function_body() {
    let mut config = ObfuscationConfig::default();
    config.enable_only(&["control_flow".to_string()]).unwrap();
    config.control_flow.rate = 100;
    config.control_flow.depth = 1;
    config.control_flow.deterministic = true;
    config.control_flow.junk_else = false;
    let ctx = ObfuscationContext::new(config).unwrap();

    let mut ast = Ast::new();
    let (f, original) = add_function(&mut ast, "f");
    let mut ast = ast.with_statements(vec![f]);
    let report = ctx.obfuscate(&mut ast, "f.php").unwrap();
    assert_eq!(report.applied(), vec!["ControlFlow"]);

    let Node::Function { stmts, .. } = ast[f] else {
        panic!("expected function");
    };
    let body = ast.stmts(stmts);
    assert_eq!(body.len(), 1);
    let Node::If {
        cond,
        stmts: inner,
        ref elseifs,
        else_,
    } = ast[body[0]]
    else {
        panic!("expected if");
    };
    assert_eq!(ast[cond], Node::Int { value: 1 });
    assert!(elseifs.is_empty());
    assert!(else_.is_none());
    assert_eq!(ast.stmts(inner), original.as_slice());
}

#[tokio::test]
async fn test_files_share_renaming_state() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut config = ObfuscationConfig::default();
    config.enable_only(&["rename".to_string()]).unwrap();
    let ctx = Arc::new(ObfuscationContext::new(config).unwrap());

    let mut library = Ast::new();
    let (f, _) = add_function(&mut library, "render");
    let mut library = library.with_statements(vec![f]);
    ctx.obfuscate(&mut library, "lib.php").unwrap();
    let renamed = ctx
        .lookup(IdentifierCategory::Function, "render")
        .expect("declaration was renamed");

    let handles: Vec<_> = ["a.php", "b.php"]
        .into_iter()
        .map(|key| {
            let ctx = Arc::clone(&ctx);
            tokio::task::spawn_blocking(move || {
                let mut ast = caller("Render");
                ctx.obfuscate(&mut ast, key).map(|_| ast)
            })
        })
        .collect();
    for handle in handles {
        let ast = handle.await.unwrap().unwrap();
        assert_eq!(called_name(&ast).to_ascii_lowercase(), renamed.to_ascii_lowercase());
    }

    let mut unknown = caller("strlen");
    ctx.obfuscate(&mut unknown, "c.php").unwrap();
    assert_eq!(called_name(&unknown), "strlen");
}

#[test]
fn test_caller_processed_before_library() {
    let mut config = ObfuscationConfig::default();
    config.enable_only(&["rename".to_string()]).unwrap();
    let ctx = ObfuscationContext::new(config).unwrap();

    let mut caller = caller("render");
    let mut library = Ast::new();
    let (f, _) = add_function(&mut library, "render");
    let mut library = library.with_statements(vec![f]);

    ctx.declare_all(&[&caller, &library]);
    ctx.obfuscate(&mut caller, "a.php").unwrap();
    ctx.obfuscate(&mut library, "lib.php").unwrap();

    let Node::Function { name, .. } = library[f] else {
        panic!("expected function");
    };
    let declared = library.name_of(name).unwrap();
    assert_ne!(declared, "render");
    assert_eq!(called_name(&caller), declared);
}

#[test]
fn test_full_pipeline_keeps_tree_valid() {
    let ctx = ObfuscationContext::new(ObfuscationConfig::aggressive()).unwrap();
    for seed_key in ["one.php", "two.php", "three.php"] {
        let mut ast = Ast::new();
        let (f, _) = add_function(&mut ast, "sum");
        let greeting = ast.string("hello");
        let echo = ast.echo(vec![greeting]);
        let mut ast = ast.with_statements(vec![f, echo]);

        let report = ctx.obfuscate(&mut ast, seed_key).unwrap();
        assert!(ast.validate().is_ok());
        assert!(collect_metrics(&ast).is_ok());
        assert!(printer::print(&ast).starts_with("<?php\n"));
        assert_eq!(report.passes.len(), 7);
        assert!(report.passes.iter().filter(|p| p.changed).all(|p| p.kept));
        assert!(report.applied().contains(&"Rename"));
    }
}
