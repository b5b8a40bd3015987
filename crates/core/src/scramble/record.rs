use super::IdentifierCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Format version written into every state file.
pub const STATE_VERSION: u32 = 1;

/// Persistent mapping state of one category.
///
/// `forward` maps the folded original key to the generated name; `reverse` maps the folded
/// generated name back to the original key. Entries are only ever added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrambleRecord {
    pub version: u32,
    pub category: IdentifierCategory,
    pub forward: IndexMap<String, String>,
    pub reverse: IndexMap<String, String>,
    pub label_counter: u64,
    pub gen_length: usize,
}

impl ScrambleRecord {
    pub fn new(category: IdentifierCategory, gen_length: usize) -> Self {
        Self {
            version: STATE_VERSION,
            category,
            forward: IndexMap::new(),
            reverse: IndexMap::new(),
            label_counter: 0,
            gen_length,
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.forward.get(key)
    }

    /// True when `folded` is already taken as a generated name or an original key.
    pub fn is_taken(&self, folded: &str) -> bool {
        self.reverse.contains_key(folded) || self.forward.contains_key(folded)
    }

    pub fn insert(&mut self, key: String, generated: String) {
        let folded = self.category.fold(&generated);
        self.reverse.insert(folded, key.clone());
        self.forward.insert(key, generated);
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
