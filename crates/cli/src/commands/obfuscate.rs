/// Module for the `obfuscate` subcommand, which renames and transforms PHP syntax trees.
///
/// Every input is a syntax tree serialized as JSON. All trees are parsed and their
/// declarations named up front; files are then processed concurrently against one shared
/// obfuscation context, so a name renamed in one file is renamed the same way in all others. Output goes to `--out-dir` as PHP source (or as a tree with `--emit-ast`), and
/// the renaming state is saved to `--state-dir` for later runs.
use super::read_ast;
use async_trait::async_trait;
use clap::Args;
use shroud_core::ast::Ast;
use shroud_core::printer;
use shroud_transform::config::ObfuscationConfig;
use shroud_transform::obfuscator::{ObfuscationContext, ObfuscationReport, print_report};
use shroud_utils::errors::ObfuscateError;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Arguments for the `obfuscate` subcommand.
#[derive(Args)]
pub struct ObfuscateArgs {
    /// Syntax-tree JSON files to obfuscate.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// JSON configuration file; missing fields take their defaults.
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,
    /// Built-in configuration preset: default, light or aggressive.
    #[arg(long)]
    pub preset: Option<String>,
    /// Directory holding renaming state; loaded before and saved after the run.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
    /// Directory the obfuscated files are written to.
    #[arg(long, default_value = "obfuscated")]
    pub out_dir: PathBuf,
    /// Random seed, overriding the configured one.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Comma-separated list of passes to run (default: every pass the config enables).
    #[arg(long)]
    pub passes: Option<String>,
    /// Write the transformed syntax tree as JSON instead of PHP source.
    #[arg(long)]
    pub emit_ast: bool,
    /// Path to emit per-file reports as JSON (optional).
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl ObfuscateArgs {
    /// Configuration after applying the file or preset and the command-line overrides.
    fn config(&self) -> Result<ObfuscationConfig, Box<dyn Error>> {
        let mut config = match (&self.config, &self.preset) {
            (Some(path), _) => ObfuscationConfig::from_json_file(path)?,
            (None, Some(name)) => ObfuscationConfig::preset(name)?,
            (None, None) => ObfuscationConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(list) = &self.passes {
            let passes: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            config.enable_only(&passes)?;
        }
        Ok(config)
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_name
            .strip_suffix(".json")
            .unwrap_or(&file_name)
            .trim_end_matches(".ast");
        let extension = if self.emit_ast { "ast.json" } else { "php" };
        self.out_dir.join(format!("{stem}.{extension}"))
    }
}

/// Obfuscates and renders one parsed file.
fn obfuscate_file(
    ctx: &ObfuscationContext,
    input: &Path,
    mut ast: Ast,
    emit_ast: bool,
) -> Result<(String, ObfuscationReport), ObfuscateError> {
    let report = ctx.obfuscate(&mut ast, &input.to_string_lossy())?;
    let rendered = if emit_ast {
        serde_json::to_string_pretty(&ast)?
    } else {
        printer::print(&ast)
    };
    Ok((rendered, report))
}

/// Executes the `obfuscate` subcommand.
#[async_trait]
impl super::Command for ObfuscateArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let ctx = Arc::new(ObfuscationContext::new(self.config()?)?);
        if let Some(dir) = &self.state_dir {
            ctx.load_state(dir)?;
        }

        let reads: Vec<_> = self
            .inputs
            .iter()
            .cloned()
            .map(|input| tokio::task::spawn_blocking(move || read_ast(&input)))
            .collect();
        let mut trees = Vec::with_capacity(reads.len());
        for (input, read) in self.inputs.iter().zip(reads) {
            trees.push(read.await?.map_err(|e| format!("{}: {e}", input.display()))?);
        }

        let borrowed: Vec<&Ast> = trees.iter().collect();
        ctx.declare_all(&borrowed);

        let jobs: Vec<_> = self
            .inputs
            .iter()
            .cloned()
            .zip(trees)
            .map(|(input, ast)| {
                let ctx = Arc::clone(&ctx);
                let emit_ast = self.emit_ast;
                tokio::task::spawn_blocking(move || obfuscate_file(&ctx, &input, ast, emit_ast))
            })
            .collect();

        fs::create_dir_all(&self.out_dir)?;
        let mut reports = Vec::with_capacity(jobs.len());
        for (input, job) in self.inputs.iter().zip(jobs) {
            let (rendered, report) = job
                .await?
                .map_err(|e| format!("{}: {e}", input.display()))?;
            let output = self.output_path(input);
            fs::write(&output, rendered)?;
            info!(input = %input.display(), output = %output.display(), "file obfuscated");
            print_report(&report);
            reports.push(report);
        }

        if let Some(dir) = &self.state_dir {
            ctx.save_state(dir)?;
        }
        if let Some(path) = &self.report {
            fs::write(path, serde_json::to_string_pretty(&reports)?)?;
            println!("Wrote report to {}", path.display());
        }

        println!("✅ Obfuscated {} file(s) into {}", reports.len(), self.out_dir.display());
        Ok(())
    }
}
