pub mod init;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(version)]
#[command(about = "A small media storefront backed by S3-compatible storage", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "storefront.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter config and data directories
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Run the web server
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply SQLite catalog migrations
    Migrate {
        #[command(subcommand)]
        command: Option<MigrateCommand>,
    },
}

#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Show applied and pending migrations
    Status,
}
