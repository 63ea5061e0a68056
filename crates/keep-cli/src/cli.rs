use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keep",
    about = "Read, write and normalize Keep collection manifests",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with stream settings (retries, block size, read chunk size)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the files of a manifest
    Ls(LsArgs),
    /// Print a file of a manifest
    Cat(CatArgs),
    /// Re-serialize a manifest in normalized form
    Normalize(NormalizeArgs),
    /// Store a local file and print a manifest for it
    Put(PutArgs),
}

#[derive(Args)]
pub struct LsArgs {
    pub manifest: PathBuf,
    /// Print sizes in bytes next to each path
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args)]
pub struct CatArgs {
    /// Block store directory
    #[arg(long)]
    pub store: PathBuf,
    pub manifest: PathBuf,
    /// Path of the file in the collection (`stream/file`)
    pub path: String,
    /// Decompress `.gz` and `.bz2` files
    #[arg(short, long)]
    pub decompress: bool,
}

#[derive(Args)]
pub struct NormalizeArgs {
    pub manifest: PathBuf,
    /// Drop locator hints
    #[arg(long)]
    pub strip: bool,
}

#[derive(Args)]
pub struct PutArgs {
    /// Block store directory
    #[arg(long)]
    pub store: PathBuf,
    pub file: PathBuf,
    /// Path in the collection; defaults to the local file name
    #[arg(long)]
    pub name: Option<String>,
}
