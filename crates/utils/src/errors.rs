use thiserror::Error;

/// Error type for configuration validation.
///
/// Configuration problems are fatal at setup: the obfuscation context refuses to start
/// rather than run with a half-understood configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A category name did not match any identifier category.
    #[error("unknown identifier category: {0}")]
    UnknownCategory(String),
    /// A scramble mode name did not match `identifier`, `hex` or `numeric`.
    #[error("invalid scramble mode: {0}")]
    InvalidMode(String),
    /// A probability/rate setting was outside `0..=100`.
    #[error("{setting} must be within 0..=100, got {value}")]
    RateOutOfRange { setting: String, value: u32 },
    /// A target name length that cannot produce valid identifiers.
    #[error("invalid target length {length} for category {category}")]
    InvalidLength { category: String, length: usize },
    /// A setting holds a value the passes cannot work with.
    #[error("invalid value for {setting}: {reason}")]
    InvalidSetting { setting: String, reason: String },
    /// A pass name given on the command line or in the config is not known.
    #[error("invalid pass: {0}")]
    InvalidPass(String),
    #[error("could not read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while persisting or restoring scrambler state.
///
/// A missing state file is not an error; loading simply leaves the scrambler empty.
#[derive(Debug, Error)]
pub enum ScrambleError {
    #[error("could not access state file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt state file '{path}': {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The state file was written by an incompatible format version.
    #[error("state version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    /// The state file belongs to another identifier category.
    #[error("state category mismatch: expected {expected}, found {found}")]
    CategoryMismatch { expected: String, found: String },
}

/// Errors raised while measuring a syntax tree.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The root of the tree is not a statement list.
    #[error("tree root must be a statement list, found {0}")]
    InvalidRoot(&'static str),
    /// The tree refers to nodes outside its arena.
    #[error("tree refers to a missing node")]
    DanglingNode,
}

/// Error type for transform operations.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A node lacked a child the transform relies on.
    #[error("{kind} node is missing its {slot}")]
    MissingChild {
        kind: &'static str,
        slot: &'static str,
    },
    /// A node of an unexpected kind was found in a slot.
    #[error("expected {expected}, found {found}")]
    UnexpectedNode {
        expected: &'static str,
        found: &'static str,
    },
    /// The tree handed in breaks arena ownership rules (dangling or shared child ids).
    #[error("malformed syntax tree: {0}")]
    InvalidTree(String),
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("generic error: {0}")]
    Generic(String),
}

/// Errors that can occur during obfuscation.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// Configuration was rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Scrambler state could not be loaded or saved.
    #[error("state error: {0}")]
    Scramble(#[from] ScrambleError),
    /// Transform application failed.
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
