use crate::Transform;
use crate::arithmetic::ArithmeticEncoder;
use crate::array_access::ArrayAccessRewriter;
use crate::config::ObfuscationConfig;
use crate::control_flow::ControlFlowWrapper;
use crate::dead_code::DeadCodeInjector;
use crate::pass::{self, PassReport};
use crate::rename::Renamer;
use crate::shuffle::StatementShuffle;
use crate::string_encode::StringEncoder;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shroud_analysis::{Metrics, collect_metrics};
use shroud_core::ast::Ast;
use shroud_core::scramble::{IdentifierCategory, ScramblerSet};
use shroud_utils::errors::{ConfigError, ObfuscateError, ScrambleError, TransformError};
use std::path::Path;

/// Process-wide obfuscation state: validated configuration plus one scrambler per
/// identifier category.
///
/// Every method takes `&self`, so one context can be shared between threads and used for
/// many files; scrambler records are the only mutable state and are internally locked.
#[derive(Debug)]
pub struct ObfuscationContext {
    config: ObfuscationConfig,
    scramblers: ScramblerSet,
}

/// Result of obfuscating one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationReport {
    /// Key the file's RNG seed was derived from
    pub file_key: String,
    /// Seed the pass runner used for this file
    pub seed_used: u64,
    /// Printed size before obfuscation, in bytes
    pub original_size: usize,
    /// Printed size after obfuscation, in bytes
    pub obfuscated_size: usize,
    /// Size increase as percentage
    pub size_increase_percentage: f64,
    /// Metrics before the first pass
    pub before: Metrics,
    /// Metrics after the last pass
    pub after: Metrics,
    /// One entry per pass that ran, in order
    pub passes: Vec<PassReport>,
}

impl ObfuscationReport {
    /// Names of passes whose result was kept and changed the tree.
    pub fn applied(&self) -> Vec<&str> {
        self.passes
            .iter()
            .filter(|p| p.changed && p.kept)
            .map(|p| p.name.as_str())
            .collect()
    }
}

impl ObfuscationContext {
    /// Validates `config` and builds the scramblers.
    pub fn new(config: ObfuscationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut settings = Vec::with_capacity(IdentifierCategory::ALL.len());
        for category in IdentifierCategory::ALL {
            settings.push(config.scrambler_config(category)?);
        }
        let scramblers = ScramblerSet::new(|category| settings[category.index()].clone());
        Ok(Self { config, scramblers })
    }

    pub const fn config(&self) -> &ObfuscationConfig {
        &self.config
    }

    pub const fn scramblers(&self) -> &ScramblerSet {
        &self.scramblers
    }

    /// Restores scrambler state from `dir`; categories without a file start empty.
    pub fn load_state(&self, dir: &Path) -> Result<(), ScrambleError> {
        self.scramblers.load_dir(dir)
    }

    /// Writes scrambler state to `dir`, one file per category.
    pub fn save_state(&self, dir: &Path) -> Result<(), ScrambleError> {
        self.scramblers.save_dir(dir)
    }

    /// Generated name for `original` if one was already assigned.
    pub fn lookup(&self, category: IdentifierCategory, original: &str) -> Option<String> {
        self.scramblers.get(category).lookup(original)
    }

    /// Assigns generated names to the declarations of every tree, in order, before any file
    /// is renamed; does nothing when renaming is disabled.
    ///
    /// A call processed before the file declaring its function still resolves afterwards,
    /// and names are assigned in input order instead of completion order.
    pub fn declare_all(&self, asts: &[&Ast]) {
        if !self.config.rename.enabled {
            return;
        }
        let renamer = Renamer::new(&self.scramblers);
        for ast in asts {
            renamer.declare_tree(ast);
        }
        tracing::debug!(files = asts.len(), "declarations collected");
    }

    /// Seed for one file: the configured seed mixed with a hash of `file_key`.
    pub fn file_seed(&self, file_key: &str) -> u64 {
        let digest = Keccak256::digest(file_key.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        self.config.seed ^ u64::from_le_bytes(bytes)
    }

    /// Passes enabled by the configuration, in their fixed order.
    fn passes(&self) -> Vec<Box<dyn Transform + '_>> {
        let config = &self.config;
        let mut passes: Vec<Box<dyn Transform + '_>> = Vec::new();
        if config.rename.enabled {
            passes.push(Box::new(Renamer::new(&self.scramblers)));
        }
        if config.array_access.enabled {
            passes.push(Box::new(ArrayAccessRewriter::new(&config.array_access)));
        }
        if config.string_encode.enabled {
            passes.push(Box::new(StringEncoder::new(&config.string_encode)));
        }
        if config.arithmetic.enabled {
            passes.push(Box::new(ArithmeticEncoder::new(&config.arithmetic)));
        }
        if config.shuffle.enabled {
            passes.push(Box::new(StatementShuffle::new(&config.shuffle)));
        }
        if config.dead_code.enabled {
            passes.push(Box::new(DeadCodeInjector::new(&config.dead_code)));
        }
        if config.control_flow.enabled {
            passes.push(Box::new(ControlFlowWrapper::new(&config.control_flow)));
        }
        passes
    }

    /// Renames and transforms one file's tree in place.
    ///
    /// # Arguments
    /// * `ast` - Tree of the file; must pass [`Ast::validate`].
    /// * `file_key` - Stable name of the file (usually its path); mixed into the RNG seed so
    ///   every file gets its own but reproducible randomness.
    ///
    /// # Returns
    /// A report with per-pass deltas and before/after metrics.
    pub fn obfuscate(&self, ast: &mut Ast, file_key: &str) -> Result<ObfuscationReport, ObfuscateError> {
        ast.validate()?;
        let seed = self.file_seed(file_key);
        let before = collect_metrics(ast).map_err(TransformError::from)?;

        tracing::debug!("Starting obfuscation of {}:", file_key);
        tracing::debug!("  Input size: {} bytes", before.byte_len);
        tracing::debug!("  Seed: 0x{:x}", seed);

        let passes = self.passes();
        tracing::debug!("  Passes: {}", passes.len());
        let reports = pass::run(ast, &passes, &self.config.pass, seed)?;

        ast.validate()?;
        let after = collect_metrics(ast).map_err(TransformError::from)?;
        let size_increase_percentage = if before.byte_len == 0 {
            0.0
        } else {
            (after.byte_len as f64 / before.byte_len as f64 - 1.0) * 100.0
        };
        tracing::debug!(
            "  Size: {} → {} bytes ({:+.1}%)",
            before.byte_len,
            after.byte_len,
            size_increase_percentage
        );

        Ok(ObfuscationReport {
            file_key: file_key.to_string(),
            seed_used: seed,
            original_size: before.byte_len,
            obfuscated_size: after.byte_len,
            size_increase_percentage,
            before,
            after,
            passes: reports,
        })
    }
}

/// Prints a short summary of one file's obfuscation.
pub fn print_report(report: &ObfuscationReport) {
    println!("{}:", report.file_key);
    println!("  Passes applied: {:?}", report.applied());
    println!(
        "  Potency: {:.2} → {:.2}",
        report.before.potency, report.after.potency
    );
    println!(
        "  Size change: {} → {} bytes ({:+.1}%)",
        report.original_size, report.obfuscated_size, report.size_increase_percentage
    );
}
