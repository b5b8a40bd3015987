use async_trait::async_trait;
use clap::Subcommand;
use shroud_core::ast::Ast;
use shroud_utils::errors::ObfuscateError;
use std::error::Error;
use std::fs;
use std::path::Path;

pub mod lookup;
pub mod obfuscate;
pub mod print;

#[derive(Subcommand)]
pub enum Cmd {
    /// Obfuscate syntax-tree files and write PHP (or trees) to an output directory
    Obfuscate(obfuscate::ObfuscateArgs),

    /// Print a syntax-tree file as PHP source
    Print(print::PrintArgs),

    /// Look up the generated name of an identifier in saved state
    Lookup(lookup::LookupArgs),
}

#[async_trait]
pub trait Command {
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Obfuscate(args) => args.execute().await,
            Cmd::Print(args) => args.execute().await,
            Cmd::Lookup(args) => args.execute().await,
        }
    }
}

/// Reads a syntax tree serialized as JSON and checks its arena invariants.
pub fn read_ast(path: &Path) -> Result<Ast, ObfuscateError> {
    let text = fs::read_to_string(path)?;
    let ast: Ast = serde_json::from_str(&text)?;
    ast.validate()?;
    Ok(ast)
}
