use crate::PassConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shroud_core::scramble::{IdentifierCategory, MAX_LENGTH, ScrambleMode, ScramblerConfig};
use shroud_utils::errors::ConfigError;
use std::path::Path;

/// Pass names accepted by [`ObfuscationConfig::enable_only`], in execution order.
pub const PASS_NAMES: [&str; 7] = [
    "rename",
    "array_access",
    "string_encode",
    "arithmetic",
    "shuffle",
    "dead_code",
    "control_flow",
];

/// Settings shared by passes that only need an on/off switch and a probability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub enabled: bool,
    /// Probability (0–100) that an eligible node is rewritten.
    pub rate: u32,
}

impl RateConfig {
    const fn new(enabled: bool, rate: u32) -> Self {
        Self { enabled, rate }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self::new(true, 50)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameConfig {
    pub enabled: bool,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayAccessConfig {
    pub enabled: bool,
    pub rate: u32,
    /// Name of the per-file accessor function.
    pub helper: String,
}

impl Default for ArrayAccessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 100,
            helper: "_sg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleConfig {
    pub enabled: bool,
    /// Most statements merged into one movable chunk.
    pub chunk_size: usize,
    /// Probability (0–100) that an eligible run of chunks is permuted.
    pub ratio: u32,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: 1,
            ratio: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadCodeConfig {
    pub enabled: bool,
    /// Probability (0–100) of an injection at each gap of a statement list.
    pub rate: u32,
    /// Deepest statement-list nesting that still receives injections.
    pub max_depth: usize,
}

impl Default for DeadCodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 20,
            max_depth: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlFlowConfig {
    pub enabled: bool,
    /// Probability (0–100) that a statement list is wrapped.
    pub rate: u32,
    /// Number of nested always-true conditionals per wrapped list.
    pub depth: usize,
    /// Always use the literal `1` as the condition.
    pub deterministic: bool,
    /// Attach an unreachable `else` with junk statements to the innermost wrapper.
    pub junk_else: bool,
}

impl Default for ControlFlowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 60,
            depth: 1,
            deterministic: false,
            junk_else: true,
        }
    }
}

/// Scrambler settings for one identifier category as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub ignore: Vec<String>,
    pub ignore_prefixes: Vec<String>,
    /// `identifier`, `hex` or `numeric`.
    pub mode: String,
    pub target_length: usize,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            ignore_prefixes: Vec::new(),
            mode: "identifier".to_string(),
            target_length: 6,
        }
    }
}

/// Configuration for the obfuscation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationConfig {
    /// Random seed for deterministic obfuscation.
    pub seed: u64,
    /// Per-category scrambler settings keyed by category name (`variable`, `class`, ...).
    pub categories: IndexMap<String, CategoryConfig>,
    pub rename: RenameConfig,
    pub array_access: ArrayAccessConfig,
    pub string_encode: RateConfig,
    pub arithmetic: RateConfig,
    pub shuffle: ShuffleConfig,
    pub dead_code: DeadCodeConfig,
    pub control_flow: ControlFlowConfig,
    /// Quality gate of the pass runner.
    pub pass: PassConfig,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            categories: IndexMap::new(),
            rename: RenameConfig::default(),
            array_access: ArrayAccessConfig::default(),
            string_encode: RateConfig::new(true, 50),
            arithmetic: RateConfig::new(true, 30),
            shuffle: ShuffleConfig::default(),
            dead_code: DeadCodeConfig::default(),
            control_flow: ControlFlowConfig::default(),
            pass: PassConfig::default(),
        }
    }
}

impl ObfuscationConfig {
    /// Renaming and light disguise only: no reordering, no injected code.
    pub fn light() -> Self {
        Self {
            arithmetic: RateConfig::new(false, 0),
            shuffle: ShuffleConfig {
                enabled: false,
                ..Default::default()
            },
            dead_code: DeadCodeConfig {
                enabled: false,
                ..Default::default()
            },
            control_flow: ControlFlowConfig {
                rate: 30,
                junk_else: false,
                ..Default::default()
            },
            string_encode: RateConfig::new(true, 25),
            ..Default::default()
        }
    }

    /// Every pass at full strength.
    pub fn aggressive() -> Self {
        Self {
            string_encode: RateConfig::new(true, 100),
            arithmetic: RateConfig::new(true, 80),
            shuffle: ShuffleConfig {
                enabled: true,
                chunk_size: 2,
                ratio: 100,
            },
            dead_code: DeadCodeConfig {
                enabled: true,
                rate: 50,
                max_depth: 4,
            },
            control_flow: ControlFlowConfig {
                enabled: true,
                rate: 100,
                depth: 2,
                deterministic: false,
                junk_else: true,
            },
            ..Default::default()
        }
    }

    /// Named preset: `default`, `light` or `aggressive`.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::default()),
            "light" => Ok(Self::light()),
            "aggressive" => Ok(Self::aggressive()),
            other => Err(ConfigError::InvalidSetting {
                setting: "preset".to_string(),
                reason: format!("unknown preset '{other}'"),
            }),
        }
    }

    /// Reads and validates a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the passes cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("array_access.rate", self.array_access.rate),
            ("string_encode.rate", self.string_encode.rate),
            ("arithmetic.rate", self.arithmetic.rate),
            ("shuffle.ratio", self.shuffle.ratio),
            ("dead_code.rate", self.dead_code.rate),
            ("control_flow.rate", self.control_flow.rate),
        ];
        for (setting, value) in rates {
            if value > 100 {
                return Err(ConfigError::RateOutOfRange {
                    setting: setting.to_string(),
                    value,
                });
            }
        }
        if self.shuffle.chunk_size == 0 {
            return Err(ConfigError::InvalidSetting {
                setting: "shuffle.chunk_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.array_access.helper.is_empty()
            || self.array_access.helper.starts_with(|c: char| c.is_ascii_digit())
            || !self
                .array_access
                .helper
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidSetting {
                setting: "array_access.helper".to_string(),
                reason: format!("'{}' is not a function name", self.array_access.helper),
            });
        }
        for (name, category) in &self.categories {
            name.parse::<IdentifierCategory>()?;
            category.mode.parse::<ScrambleMode>()?;
            if category.target_length == 0 || category.target_length > MAX_LENGTH {
                return Err(ConfigError::InvalidLength {
                    category: name.clone(),
                    length: category.target_length,
                });
            }
        }
        Ok(())
    }

    /// Scrambler settings for `category`, falling back to defaults when not configured.
    pub fn scrambler_config(
        &self,
        category: IdentifierCategory,
    ) -> Result<ScramblerConfig, ConfigError> {
        let entry = self
            .categories
            .get(category.as_str())
            .cloned()
            .unwrap_or_default();
        Ok(ScramblerConfig {
            ignore: entry.ignore,
            ignore_prefixes: entry.ignore_prefixes,
            mode: entry.mode.parse()?,
            target_length: entry.target_length,
            seed: self.seed,
        })
    }

    /// Disables every pass not named in `passes`.
    pub fn enable_only(&mut self, passes: &[String]) -> Result<(), ConfigError> {
        for pass in passes {
            if !PASS_NAMES.contains(&pass.as_str()) {
                return Err(ConfigError::InvalidPass(pass.clone()));
            }
        }
        let on = |name: &str| passes.iter().any(|p| p == name);
        self.rename.enabled = on("rename");
        self.array_access.enabled = on("array_access");
        self.string_encode.enabled = on("string_encode");
        self.arithmetic.enabled = on("arithmetic");
        self.shuffle.enabled = on("shuffle");
        self.dead_code.enabled = on("dead_code");
        self.control_flow.enabled = on("control_flow");
        Ok(())
    }
}
