//! Identifier scrambler.
//!
//! One [`Scrambler`] exists per [`IdentifierCategory`]. It hands out collision-free generated
//! names, remembers every assignment so later files reuse them, and can persist its record
//! between runs. Candidate names are derived from `Keccak256(seed ‖ category ‖ key ‖ attempt)`
//! so the same seed reproduces the same names regardless of call order.

mod category;
mod record;
mod set;

pub use category::{IdentifierCategory, is_keyword};
pub use record::{STATE_VERSION, ScrambleRecord};
pub use set::ScramblerSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shroud_utils::errors::{ConfigError, ScrambleError};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Failed attempts before the generation length grows by one.
const GROW_AFTER: u32 = 5;
/// Attempts before giving up and keeping the original name.
const MAX_ATTEMPTS: u32 = 50;
/// Upper bound for generated name length.
pub const MAX_LENGTH: usize = 32;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DIGITS: &[u8] = b"0123456789";

/// Character profile of generated names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrambleMode {
    /// Letters and digits, e.g. `qk3vz9`.
    #[default]
    Identifier,
    /// Hex digits behind a letter, e.g. `c41f0e`.
    Hex,
    /// A letter or underscore followed by digits, e.g. `k40172`.
    Numeric,
}

impl FromStr for ScrambleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identifier" => Ok(Self::Identifier),
            "hex" => Ok(Self::Hex),
            "numeric" => Ok(Self::Numeric),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for ScrambleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identifier => "identifier",
            Self::Hex => "hex",
            Self::Numeric => "numeric",
        })
    }
}

/// Per-category scrambler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScramblerConfig {
    /// Names left untouched (compared under the category's case rule).
    pub ignore: Vec<String>,
    /// Names starting with any of these prefixes are left untouched.
    pub ignore_prefixes: Vec<String>,
    pub mode: ScrambleMode,
    /// Initial length of generated names.
    pub target_length: usize,
    pub seed: u64,
}

impl Default for ScramblerConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            ignore_prefixes: Vec::new(),
            mode: ScrambleMode::Identifier,
            target_length: 6,
            seed: 0,
        }
    }
}

/// Folded generated names claimed by every scrambler of one symbol table.
type SharedNames = Arc<Mutex<HashSet<String>>>;

/// Collision-free, memoizing renamer for one identifier category.
#[derive(Debug)]
pub struct Scrambler {
    category: IdentifierCategory,
    config: ScramblerConfig,
    record: RwLock<ScrambleRecord>,
    /// Set when other categories share this one's symbol table (classes, interfaces and
    /// traits). Locked after `record`, never before.
    shared: Option<SharedNames>,
}

impl Scrambler {
    pub fn new(category: IdentifierCategory, config: ScramblerConfig) -> Self {
        let length = config.target_length.clamp(1, MAX_LENGTH);
        Self {
            category,
            record: RwLock::new(ScrambleRecord::new(category, length)),
            config,
            shared: None,
        }
    }

    /// Scrambler whose generated names must also stay clear of everything in `shared`.
    fn sharing(category: IdentifierCategory, config: ScramblerConfig, shared: SharedNames) -> Self {
        Self {
            shared: Some(shared),
            ..Self::new(category, config)
        }
    }

    pub const fn category(&self) -> IdentifierCategory {
        self.category
    }

    pub const fn config(&self) -> &ScramblerConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, ScrambleRecord> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScrambleRecord> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn shared_names(&self) -> Option<MutexGuard<'_, HashSet<String>>> {
        self.shared
            .as_ref()
            .map(|names| names.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// True for reserved words, configured ignore entries and ignore-prefix matches.
    pub fn should_ignore(&self, name: &str) -> bool {
        if self.category.is_reserved(name) {
            return true;
        }
        let folded = self.category.fold(name);
        self.config
            .ignore
            .iter()
            .any(|entry| self.category.fold(entry) == folded)
            || self
                .config
                .ignore_prefixes
                .iter()
                .any(|prefix| folded.starts_with(&self.category.fold(prefix)))
    }

    /// Returns the generated name for `name`, assigning one on first use.
    ///
    /// Ignored names come back unchanged and are never recorded.
    pub fn scramble(&self, name: &str) -> String {
        if name.is_empty() || self.should_ignore(name) {
            return name.to_string();
        }
        let key = self.category.fold(name);
        let mut record = self.write();
        if let Some(existing) = record.get(&key) {
            return existing.clone();
        }

        let mut shared = self.shared_names();
        let claimed = shared.as_deref();
        let generated = match self.generate(&key, name, &mut record, claimed) {
            Some(generated) => {
                debug!(category = %self.category, original = name, generated = %generated, "scrambled");
                generated
            }
            None => {
                let fallback = self.fallback(name, &record, claimed);
                warn!(
                    category = %self.category,
                    name,
                    fallback = %fallback,
                    "name generation exhausted, falling back"
                );
                fallback
            }
        };
        if let Some(names) = shared.as_mut() {
            names.insert(self.category.fold(&generated));
        }
        record.insert(key, generated.clone());
        generated
    }

    /// Generated name for `name` if one was already assigned.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let key = self.category.fold(name);
        self.read().get(&key).cloned()
    }

    /// Original key a generated name was assigned to.
    pub fn unscramble(&self, generated: &str) -> Option<String> {
        let folded = self.category.fold(generated);
        self.read().reverse.get(&folded).cloned()
    }

    /// Builds `<prefix>_<seq>` from the label counter and scrambles it.
    pub fn generate_label(&self, prefix: &str) -> String {
        let seq = {
            let mut record = self.write();
            record.label_counter += 1;
            record.label_counter
        };
        self.scramble(&format!("{prefix}_{seq}"))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> ScrambleRecord {
        self.read().clone()
    }

    /// Writes the record as JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ScrambleError> {
        let json = {
            let record = self.read();
            serde_json::to_string_pretty(&*record).map_err(|source| ScrambleError::Corrupt {
                path: path.display().to_string(),
                source,
            })?
        };
        std::fs::write(path, json).map_err(|source| ScrambleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(category = %self.category, path = %path.display(), "saved scrambler state");
        Ok(())
    }

    /// Replaces the record with the one stored at `path`.
    ///
    /// A missing file leaves the scrambler untouched. A file from another format version or
    /// another category is rejected.
    pub fn load(&self, path: &Path) -> Result<(), ScrambleError> {
        if !path.exists() {
            debug!(category = %self.category, path = %path.display(), "no saved state");
            return Ok(());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ScrambleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let loaded: ScrambleRecord =
            serde_json::from_str(&text).map_err(|source| ScrambleError::Corrupt {
                path: path.display().to_string(),
                source,
            })?;
        if loaded.version != STATE_VERSION {
            return Err(ScrambleError::VersionMismatch {
                expected: STATE_VERSION,
                found: loaded.version,
            });
        }
        if loaded.category != self.category {
            return Err(ScrambleError::CategoryMismatch {
                expected: self.category.to_string(),
                found: loaded.category.to_string(),
            });
        }
        debug!(category = %self.category, entries = loaded.len(), "loaded scrambler state");
        if let Some(mut names) = self.shared_names() {
            names.extend(loaded.reverse.keys().cloned());
        }
        *self.write() = loaded;
        Ok(())
    }

    /// Searches for an unused candidate, growing the length every few failures.
    fn generate(
        &self,
        key: &str,
        original: &str,
        record: &mut ScrambleRecord,
        claimed: Option<&HashSet<String>>,
    ) -> Option<String> {
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 && attempt % GROW_AFTER == 0 && record.gen_length < MAX_LENGTH {
                record.gen_length += 1;
            }
            let candidate = self.candidate(key, original, attempt, record.gen_length);
            if self.is_available(&candidate, record, claimed) {
                return Some(candidate);
            }
        }
        None
    }

    /// The original name if nothing claims it yet, otherwise the first free `<name>_<n>`.
    fn fallback(
        &self,
        name: &str,
        record: &ScrambleRecord,
        claimed: Option<&HashSet<String>>,
    ) -> String {
        let mut candidate = name.to_string();
        let mut suffix = 0u64;
        while !self.is_unclaimed(&candidate, record, claimed) {
            suffix += 1;
            candidate = format!("{name}_{suffix}");
        }
        candidate
    }

    fn is_available(
        &self,
        candidate: &str,
        record: &ScrambleRecord,
        claimed: Option<&HashSet<String>>,
    ) -> bool {
        let lower = candidate.to_ascii_lowercase();
        !is_keyword(&lower)
            && !self.category.is_reserved(candidate)
            && !self.should_ignore(candidate)
            && self.is_unclaimed(candidate, record, claimed)
    }

    fn is_unclaimed(
        &self,
        candidate: &str,
        record: &ScrambleRecord,
        claimed: Option<&HashSet<String>>,
    ) -> bool {
        let folded = self.category.fold(candidate);
        !record.is_taken(&folded) && claimed.is_none_or(|names| !names.contains(&folded))
    }

    fn candidate(&self, key: &str, original: &str, attempt: u32, length: usize) -> String {
        let mut hasher = Keccak256::new();
        hasher.update(self.config.seed.to_le_bytes());
        hasher.update(self.category.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update(attempt.to_le_bytes());
        let mut rng = StdRng::from_seed(hasher.finalize().into());

        let mut name = String::with_capacity(length);
        match self.config.mode {
            ScrambleMode::Identifier => {
                name.push(pick(&mut rng, LOWER));
                while name.len() < length {
                    name.push(pick(&mut rng, ALNUM));
                }
            }
            ScrambleMode::Hex => {
                name.push(pick(&mut rng, b"abcdef"));
                let mut bytes = vec![0u8; length / 2 + 1];
                rng.fill(&mut bytes[..]);
                name.push_str(&hex::encode(bytes));
                name.truncate(length.max(1));
            }
            ScrambleMode::Numeric => {
                name.push(pick(&mut rng, b"abcdefghijklmnopqrstuvwxyz_"));
                while name.len() < length.max(2) {
                    name.push(pick(&mut rng, DIGITS));
                }
            }
        }

        if self.category.is_case_sensitive() {
            shuffle_case(&name, original)
        } else {
            name
        }
    }
}

fn pick(rng: &mut StdRng, charset: &[u8]) -> char {
    charset[rng.random_range(0..charset.len())] as char
}

/// Upper-cases letters of `name` based on their position and the case of the original
/// character at the same position (wrapping around the original).
fn shuffle_case(name: &str, original: &str) -> String {
    let source: Vec<bool> = original.chars().map(|c| c.is_ascii_uppercase()).collect();
    name.chars()
        .enumerate()
        .map(|(i, c)| {
            let upper_source = source.get(i % source.len().max(1)).copied().unwrap_or(false);
            if c.is_ascii_alphabetic() && (upper_source ^ (i % 3 == 1)) {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}
