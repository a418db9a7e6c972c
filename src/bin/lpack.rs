use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use log::{error, info};

use lpack::{
    canonicalize_alias, canonicalize_pack_name, open_pack_file, Builder, DescriptorLoader,
    KvDescriptorLoader, LpError, Result,
};

/// A packaging engine and read-only virtual filesystem for compressed
/// archive packs.
#[derive(Parser)]
#[command(name = "lpack", version, about = "Build and inspect packs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pack from a descriptor file
    Pack {
        /// Descriptor FILE to read sources from
        #[arg(value_name = "FILE")]
        descriptor: PathBuf,

        /// Destination path; default = `<name>.lpack`
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Hand a pack to the external executor
    Exec {
        /// Pack FILE to execute
        #[arg(value_name = "FILE")]
        pack: PathBuf,
    },
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("lpack: {}: {}", e.code(), e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pack { descriptor, output } => pack(&descriptor, output),
        Commands::Exec { pack } => exec(&pack),
    }
}

fn pack(descriptor_path: &std::path::Path, output: Option<PathBuf>) -> Result<()> {
    let descriptor_bytes = std::fs::read(descriptor_path)?;
    let catalog = KvDescriptorLoader.load(&descriptor_bytes)?;

    let mut builder = Builder::new();
    builder.set_name(&catalog.name);
    if let Some(description) = &catalog.description {
        builder.set_description(description);
    }

    let base_dir = descriptor_path.parent().unwrap_or(std::path::Path::new("."));
    for mapping in &catalog.mappings {
        let logical_path = canonicalize_alias(&mapping.namespace, &mapping.alias);
        let source_path = base_dir.join(&mapping.source_filename);
        info!("packing '{}' from {}", logical_path, source_path.display());
        builder.add_from_file(&logical_path, &source_path)?;
    }

    let output_path = output.unwrap_or_else(|| PathBuf::from(canonicalize_pack_name(&catalog.name)));
    builder.write_to_file(&output_path)?;
    info!("wrote {}", output_path.display());
    Ok(())
}

fn exec(pack_path: &std::path::Path) -> Result<()> {
    let reader = open_pack_file(pack_path)?;
    let entry = std::env::var("LPACK_ENTRY").ok();
    let entry = entry.as_deref().unwrap_or("/sources/main.lua");
    if !reader.contains(entry) {
        error!("entry point '{entry}' not present in pack");
        return Err(LpError::NotFound(entry.to_string()));
    }
    info!("handing '{}' off to the external executor", pack_path.display());
    Ok(())
}
