/// Module for the `lookup` subcommand, which answers "what was this name renamed to" (or the
/// reverse) from saved scrambler state.
use async_trait::async_trait;
use clap::Args;
use shroud_core::scramble::{IdentifierCategory, Scrambler, ScramblerConfig, ScramblerSet};
use std::error::Error;
use std::path::PathBuf;

/// Arguments for the `lookup` subcommand.
#[derive(Args)]
pub struct LookupArgs {
    /// Identifier category: variable, function, class, method, constant, ...
    pub category: String,
    /// Name to look up.
    pub name: String,
    /// Directory the state was saved to by `obfuscate --state-dir`.
    #[arg(long)]
    pub state_dir: PathBuf,
    /// Map a generated name back to the original.
    #[arg(long)]
    pub reverse: bool,
}

impl LookupArgs {
    fn resolve(&self) -> Result<Option<String>, Box<dyn Error>> {
        let category: IdentifierCategory = self.category.parse()?;
        let scrambler = Scrambler::new(category, ScramblerConfig::default());
        scrambler.load(&ScramblerSet::state_path(&self.state_dir, category))?;
        Ok(if self.reverse {
            scrambler.unscramble(&self.name)
        } else {
            scrambler.lookup(&self.name)
        })
    }
}

#[async_trait]
impl super::Command for LookupArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self.resolve()? {
            Some(name) => {
                println!("{name}");
                Ok(())
            }
            None => Err(format!(
                "no {} named '{}' in {}",
                self.category,
                self.name,
                self.state_dir.display()
            )
            .into()),
        }
    }
}
