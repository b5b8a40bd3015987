/// Module for the `print` subcommand, which renders a syntax-tree file as PHP source.
use super::read_ast;
use async_trait::async_trait;
use clap::Args;
use shroud_core::printer;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// Arguments for the `print` subcommand.
#[derive(Args)]
pub struct PrintArgs {
    /// Syntax-tree JSON file.
    pub input: PathBuf,
    /// Write the source to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[async_trait]
impl super::Command for PrintArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let ast = read_ast(&self.input)?;
        let source = printer::print(&ast);
        match self.output {
            Some(path) => fs::write(path, source)?,
            None => print!("{source}"),
        }
        Ok(())
    }
}
