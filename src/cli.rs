use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "bpmn-atlas")]
#[command(about = "Assembles BPMN files into one process hierarchy and explains how it changes")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Root process file to record in the config
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Resolve call activities and update the persisted process map
    Map {
        /// Directory holding the BPMN files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Root process file name
        #[arg(short, long)]
        root: Option<String>,

        /// Dry run - show what would change without writing the map
        #[arg(long)]
        dry_run: bool,

        /// Fail if any link needs manual review (useful for CI)
        #[arg(long)]
        fail_on_review: bool,
    },

    /// Compare two versions of the BPMN file set
    Diff {
        /// Directory with the old version
        #[arg(long)]
        old: PathBuf,

        /// Directory with the new version
        #[arg(long)]
        new: PathBuf,

        /// Write the report here instead of the configured reports directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the assembled process hierarchy
    Tree {
        /// Directory holding the BPMN files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Root process file name
        #[arg(short, long)]
        root: Option<String>,

        /// Print JSON instead of an indented tree
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path, root } => {
                engine.init(path, root).await
            }
            Commands::Map { dir, root, dry_run, fail_on_review } => {
                engine.map(dir, root, dry_run, fail_on_review).await.map(|_| ())
            }
            Commands::Diff { old, new, output } => {
                engine.diff(old, new, output).await.map(|_| ())
            }
            Commands::Tree { dir, root, json } => {
                engine.tree(dir, root, json).await.map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_map_flags() {
        let cli = Cli::parse_from(["bpmn-atlas", "map", "--root", "mortgage.bpmn", "--dry-run"]);
        match cli.command {
            Commands::Map { root, dry_run, fail_on_review, dir } => {
                assert_eq!(root.as_deref(), Some("mortgage.bpmn"));
                assert!(dry_run);
                assert!(!fail_on_review);
                assert!(dir.is_none());
            }
            _ => panic!("expected map command"),
        }
    }

    #[test]
    fn test_diff_requires_both_sides() {
        assert!(Cli::try_parse_from(["bpmn-atlas", "diff", "--old", "v1"]).is_err());
    }
}
