use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use keep_store::{BlockStore, FsBlockStore, InMemoryBlockStore};
use keep_stream::{Manifest, OpenMode, Readable, StreamConfig};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StreamConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StreamConfig::default(),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Ls(args) => cmd_ls(args, config, &mut out),
        Command::Cat(args) => cmd_cat(args, config, &mut out),
        Command::Normalize(args) => cmd_normalize(args, config, &mut out),
        Command::Put(args) => cmd_put(args, config, &mut out),
    }
}

fn read_manifest(path: &Path, store: Arc<dyn BlockStore>, config: StreamConfig) -> anyhow::Result<Manifest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    Manifest::parse(&text, store, config)
        .with_context(|| format!("parsing manifest {}", path.display()))
}

/// Listing and normalizing never touch block contents.
fn offline_store() -> Arc<dyn BlockStore> {
    Arc::new(InMemoryBlockStore::new())
}

fn cmd_ls(args: LsArgs, config: StreamConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.manifest, offline_store(), config)?;
    for (stream, file, size) in manifest.files()? {
        if args.long {
            writeln!(out, "{size:>12}  {stream}/{file}")?;
        } else {
            writeln!(out, "{stream}/{file}")?;
        }
    }
    Ok(())
}

fn cmd_cat(args: CatArgs, config: StreamConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let store = Arc::new(FsBlockStore::open(&args.store)?);
    let chunk_size = config.read_chunk_size;
    let mut manifest = read_manifest(&args.manifest, store, config)?;
    let mut file = manifest
        .open(&args.path, OpenMode::Read)
        .with_context(|| format!("opening {}", args.path))?;

    if args.decompress {
        let mut reader = file.readall_decompressed(chunk_size)?;
        io::copy(&mut reader, out).with_context(|| format!("decompressing {}", args.path))?;
    } else {
        for chunk in file.readall(chunk_size) {
            out.write_all(&chunk?)?;
        }
    }
    Ok(())
}

fn cmd_normalize(args: NormalizeArgs, config: StreamConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.manifest, offline_store(), config)?;
    out.write_all(manifest.manifest_text(args.strip)?.as_bytes())?;
    Ok(())
}

fn cmd_put(args: PutArgs, config: StreamConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => match args.file.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => bail!("cannot derive a file name from {}", args.file.display()),
        },
    };

    let store = Arc::new(FsBlockStore::open(&args.store)?);
    let mut manifest = Manifest::new(store, config);
    let Some(mut target) = manifest.open(&name, OpenMode::Write)?.into_writable() else {
        bail!("{name} was not opened for writing");
    };

    let mut source = fs::File::open(&args.file)
        .with_context(|| format!("opening {}", args.file.display()))?;
    let copied = io::copy(&mut source, &mut target)?;
    manifest.commit()?;
    tracing::debug!(file = %name, bytes = copied, "stored file");

    out.write_all(manifest.manifest_text(false)?.as_bytes())?;
    eprintln!(
        "{} Stored {} ({} bytes)",
        "✓".green().bold(),
        name.bold(),
        copied
    );
    Ok(())
}
