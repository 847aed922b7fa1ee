//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mailkiln email template compiler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Templates directory path (relative to project root)
    #[arg(short, long)]
    pub templates: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file name (default: mailkiln.toml)
    #[arg(short = 'C', long, default_value = "mailkiln.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments for the Build command
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Minify the production html
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Format string content as markdown before rendering html
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub markdown: Option<bool>,

    /// Only build the named templates
    pub only: Vec<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile every template into html, dev html and text artifacts
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

impl Cli {
    /// Template names requested on the command line; empty means all.
    pub fn only(&self) -> &[String] {
        match &self.command {
            Commands::Build { build_args } => &build_args.only,
        }
    }
}
