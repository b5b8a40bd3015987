pub mod arithmetic;
pub mod array_access;
pub mod config;
pub mod control_flow;
pub mod dead_code;
pub mod junk;
pub mod obfuscator;
pub mod pass;
pub mod rename;
pub mod shuffle;
pub mod string_encode;
pub mod util;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use shroud_core::ast::Ast;
use shroud_utils::errors::TransformError;

/// Trait for source obfuscation transforms.
pub trait Transform: Send + Sync {
    /// Returns the transform's name for logging and identification.
    fn name(&self) -> &'static str;
    /// Applies the transform to the tree, returning whether changes were made.
    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError>;
    /// Whether the runner may discard the result when the potency delta is too low.
    ///
    /// Renaming mutates shared scrambler state, so its result must always be kept.
    fn gated(&self) -> bool {
        true
    }
}

/// Quality gate applied by the pass runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Minimum potency delta for accepting a pass result
    pub accept_threshold: f64,
    /// Keep every pass result regardless of its delta
    pub aggressive: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.0,
            aggressive: true,
        }
    }
}
