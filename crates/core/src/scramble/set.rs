use super::{IdentifierCategory, Scrambler, ScramblerConfig, SharedNames};
use shroud_utils::errors::ScrambleError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One scrambler per identifier category.
///
/// Classes, interfaces and traits live in one PHP symbol table, so their scramblers never hand
/// out the same name even though each keeps its own record.
#[derive(Debug)]
pub struct ScramblerSet {
    scramblers: Vec<Scrambler>,
}

impl ScramblerSet {
    /// Builds every category's scrambler with the config returned by `config_for`.
    pub fn new<F>(mut config_for: F) -> Self
    where
        F: FnMut(IdentifierCategory) -> ScramblerConfig,
    {
        let class_likes = SharedNames::default();
        Self {
            scramblers: IdentifierCategory::ALL
                .into_iter()
                .map(|category| {
                    let config = config_for(category);
                    if category.is_class_like() {
                        Scrambler::sharing(category, config, Arc::clone(&class_likes))
                    } else {
                        Scrambler::new(category, config)
                    }
                })
                .collect(),
        }
    }

    pub fn get(&self, category: IdentifierCategory) -> &Scrambler {
        &self.scramblers[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scrambler> {
        self.scramblers.iter()
    }

    /// File holding `category`'s state inside `dir`.
    pub fn state_path(dir: &Path, category: IdentifierCategory) -> PathBuf {
        dir.join(format!("{}.json", category.as_str()))
    }

    /// Restores every category found in `dir`; missing files are skipped.
    pub fn load_dir(&self, dir: &Path) -> Result<(), ScrambleError> {
        for scrambler in &self.scramblers {
            scrambler.load(&Self::state_path(dir, scrambler.category()))?;
        }
        info!(dir = %dir.display(), "scrambler state loaded");
        Ok(())
    }

    /// Writes every category into `dir`, creating it if needed.
    pub fn save_dir(&self, dir: &Path) -> Result<(), ScrambleError> {
        std::fs::create_dir_all(dir).map_err(|source| ScrambleError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        for scrambler in &self.scramblers {
            scrambler.save(&Self::state_path(dir, scrambler.category()))?;
        }
        info!(dir = %dir.display(), "scrambler state saved");
        Ok(())
    }
}
