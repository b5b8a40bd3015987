use crate::{PassConfig, Transform};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use shroud_analysis::{collect_metrics, compare};
use shroud_core::ast::Ast;
use shroud_utils::errors::TransformError;
use tracing::info;

/// Outcome of one pass inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub name: String,
    /// Whether the transform reported a change
    pub changed: bool,
    /// Potency delta measured against the tree before the pass
    pub delta: f64,
    /// Whether the result was kept
    pub kept: bool,
}

/// Trait for running a sequence of obfuscation transforms on a tree.
pub trait Pass {
    fn run(
        &self,
        ast: &mut Ast,
        passes: &[Box<dyn Transform + '_>],
        cfg: &PassConfig,
        seed: u64,
    ) -> Result<Vec<PassReport>, TransformError>;
}

/// Default implementation of the Pass trait.
pub struct DefaultPass;

impl Pass for DefaultPass {
    fn run(
        &self,
        ast: &mut Ast,
        passes: &[Box<dyn Transform + '_>],
        cfg: &PassConfig,
        seed: u64,
    ) -> Result<Vec<PassReport>, TransformError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut reports = Vec::with_capacity(passes.len());

        for pass in passes {
            let before = collect_metrics(ast)?;

            // Ungated passes carry side effects outside the tree, so they run in place.
            if !pass.gated() {
                let changed = pass.apply(ast, &mut rng)?;
                let delta = if changed {
                    compare(&before, &collect_metrics(ast)?)
                } else {
                    0.0
                };
                info!("{:>14} Δ{:+.2} ✓", pass.name(), delta);
                reports.push(PassReport {
                    name: pass.name().to_string(),
                    changed,
                    delta,
                    kept: true,
                });
                continue;
            }

            let mut snapshot = ast.clone();
            let mutated = pass.apply(&mut snapshot, &mut rng)?;
            if !mutated {
                reports.push(PassReport {
                    name: pass.name().to_string(),
                    changed: false,
                    delta: 0.0,
                    kept: false,
                });
                continue;
            }

            let after = collect_metrics(&snapshot)?;
            let delta = compare(&before, &after);

            let keep = delta >= cfg.accept_threshold || cfg.aggressive;
            info!(
                "{:>14} Δ{:+.2} {}",
                pass.name(),
                delta,
                if keep { "✓" } else { "×" }
            );

            if keep {
                *ast = snapshot;
            }
            reports.push(PassReport {
                name: pass.name().to_string(),
                changed: true,
                delta,
                kept: keep,
            });
        }
        Ok(reports)
    }
}

/// Convenience function to run the default pass.
pub fn run(
    ast: &mut Ast,
    passes: &[Box<dyn Transform + '_>],
    cfg: &PassConfig,
    seed: u64,
) -> Result<Vec<PassReport>, TransformError> {
    DefaultPass.run(ast, passes, cfg, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_core::ast::Node;

    /// Appends `echo 1;` to the root block.
    struct AppendEcho;

    impl Transform for AppendEcho {
        fn name(&self) -> &'static str {
            "AppendEcho"
        }

        fn apply(&self, ast: &mut Ast, _rng: &mut StdRng) -> Result<bool, TransformError> {
            let one = ast.int(1);
            let echo = ast.echo(vec![one]);
            ast.push_stmt(echo);
            Ok(true)
        }
    }

    /// Drops every root statement.
    struct Flatten;

    impl Transform for Flatten {
        fn name(&self) -> &'static str {
            "Flatten"
        }

        fn apply(&self, ast: &mut Ast, _rng: &mut StdRng) -> Result<bool, TransformError> {
            let root = ast.root();
            ast[root] = Node::Block { stmts: Vec::new() };
            Ok(true)
        }
    }

    fn sample() -> Ast {
        let mut ast = Ast::new();
        for i in 0..4 {
            let v = ast.int(i);
            let s = ast.echo(vec![v]);
            ast.push_stmt(s);
        }
        ast
    }

    #[test]
    fn test_aggressive_keeps_everything() {
        let mut ast = sample();
        let passes: Vec<Box<dyn Transform>> = vec![Box::new(Flatten)];
        let reports = run(&mut ast, &passes, &PassConfig::default(), 1).unwrap();
        assert!(reports[0].kept);
        assert!(ast.stmts(ast.root()).is_empty());
    }

    #[test]
    fn test_threshold_rejects_regressions() {
        let mut ast = sample();
        let cfg = PassConfig {
            accept_threshold: 0.0,
            aggressive: false,
        };
        let passes: Vec<Box<dyn Transform>> = vec![Box::new(Flatten), Box::new(AppendEcho)];
        let reports = run(&mut ast, &passes, &cfg, 1).unwrap();
        assert!(!reports[0].kept);
        assert!(reports[0].delta < 0.0);
        assert!(reports[1].kept);
        assert_eq!(ast.stmts(ast.root()).len(), 5);
    }
}
