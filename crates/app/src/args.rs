pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "blobsync")]
#[command(about = "Mirror object storage prefixes to and from local directories")]
pub struct Args {
    /// Path to the blobsync config directory (defaults to ~/.blobsync)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log level, overriding the config file; RUST_LOG takes precedence when set
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
