use std::path::PathBuf;

use clap::Parser;

/// Imports a scenario document against the simulation protocol schema and
/// reports every diagnostic the importer collects.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Path to the protocol schema (XSD).
    #[arg(long)]
    pub schema: PathBuf,

    /// The scenario document to import.
    pub scenario: PathBuf,

    /// Print at most this many diagnostics.
    #[arg(long, default_value_t = 20)]
    pub max_print: usize,

    /// Dump the imported object tree.
    #[arg(long)]
    pub dump_tree: bool,

    /// Sweep the imported tree for unresolved references.
    #[arg(long)]
    pub check_references: bool,
}
