use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Commit message generator
#[derive(Debug, Parser)]
#[command(name = "commitgen")]
#[command(version)]
#[command(about = "Generate a commit message from staged changes", long_about = None)]
pub struct Args {
    /// Model name
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Repository to read staged changes from (default: current directory)
    #[arg(long = "repo", value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Write the growing message to this file instead of streaming to stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum tokens to generate
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show remaining free generations
    Trial,
}
