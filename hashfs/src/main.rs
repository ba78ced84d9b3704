mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hashfs_core::{DEFAULT_LEVEL, PackOptions, PathHash, pack};
use output::{HashOutput, HashedPath, OutputWriter, PackOutput};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// hashfs - A packer for HashFS V2 archives
#[derive(Parser)]
#[command(name = "hashfs")]
#[command(about = "Pack directories into HashFS V2 (SCS#) archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory into an archive
    Pack {
        /// Directory to pack
        source: PathBuf,

        /// Archive to write
        output: PathBuf,

        /// zlib compression level 0-9 (defaults to HASHFS_LEVEL env var or 6)
        #[arg(short, long)]
        level: Option<u32>,

        /// Follow symbolic links in the source directory
        #[arg(long)]
        follow_links: bool,
    },

    /// Print the lookup hash of archive paths
    Hash {
        /// Archive paths, e.g. /def/world.sii
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let out = OutputWriter::new(cli.json);

    let result = match cli.command {
        Commands::Pack {
            source,
            output,
            level,
            follow_links,
        } => cmd_pack(&out, &source, &output, level, follow_links),
        Commands::Hash { paths } => cmd_hash(&out, paths),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            out.write_error(&e, 1);
            ExitCode::from(1)
        }
    }
}

/// Resolve the compression level: CLI arg > HASHFS_LEVEL env var > default.
fn resolve_level(arg: Option<u32>) -> Result<u32> {
    if let Some(level) = arg {
        return Ok(level);
    }
    match std::env::var("HASHFS_LEVEL") {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid HASHFS_LEVEL: {}", value)),
        Err(_) => Ok(DEFAULT_LEVEL),
    }
}

fn cmd_pack(
    out: &OutputWriter,
    source: &Path,
    output: &Path,
    level: Option<u32>,
    follow_links: bool,
) -> Result<()> {
    let options = PackOptions {
        compression_level: resolve_level(level)?,
        follow_links,
    };

    let stats = pack(source, output, &options).with_context(|| {
        format!(
            "Failed to pack {} into {}",
            source.display(),
            output.display()
        )
    })?;

    let data = PackOutput {
        success: true,
        result_code: 0,
        source: source.display().to_string(),
        output: output.display().to_string(),
        compression_level: options.compression_level,
        stats: stats.clone(),
    };

    out.write(&data, || {
        let mut text = format!(
            "Packed {} files into {} ({} bytes, {} -> {} bytes of data)\n",
            stats.files_packed,
            output.display(),
            stats.archive_size,
            stats.bytes_in,
            stats.bytes_compressed
        );
        if stats.duplicate_hashes > 0 {
            text.push_str(&format!(
                "Warning: {} path hashes are shared by more than one file\n",
                stats.duplicate_hashes
            ));
        }
        text
    })
}

fn cmd_hash(out: &OutputWriter, paths: Vec<String>) -> Result<()> {
    let hashes: Vec<HashedPath> = paths
        .into_iter()
        .map(|path| HashedPath {
            hash: PathHash::of_path(&path),
            path,
        })
        .collect();

    let data = HashOutput {
        success: true,
        result_code: 0,
        hashes: hashes.clone(),
    };

    out.write(&data, || {
        hashes
            .iter()
            .map(|h| format!("{} {}\n", h.hash, h.path))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pack() {
        let cli = Cli::try_parse_from(["hashfs", "pack", "mod", "mod.scs", "-l", "9"]).unwrap();
        match cli.command {
            Commands::Pack {
                source,
                output,
                level,
                follow_links,
            } => {
                assert_eq!(source, PathBuf::from("mod"));
                assert_eq!(output, PathBuf::from("mod.scs"));
                assert_eq!(level, Some(9));
                assert!(!follow_links);
            }
            _ => panic!("expected pack"),
        }
    }

    #[test]
    fn test_parse_pack_missing_output() {
        assert!(Cli::try_parse_from(["hashfs", "pack", "mod"]).is_err());
        assert!(Cli::try_parse_from(["hashfs", "hash"]).is_err());
    }

    #[test]
    fn test_resolve_level_prefers_arg() {
        assert_eq!(resolve_level(Some(3)).unwrap(), 3);
    }
}
