//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the loaded
//! context and the parsed arguments and returns an `anyhow::Result<()>`.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::context::AppContext;
use crate::download::{CancelFlag, DownloadReport};
use crate::providers::LocalLibrary;
use crate::sync;

/// Crate Digger CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "CRATE_DIGGER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// What to download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DownloadTarget {
    Albums,
    Playlists,
    Liked,
    #[default]
    All,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Import a local music folder into the collection
    Import {
        /// Library root (folders = albums/playlists, loose files = liked)
        path: PathBuf,
    },
    /// Enrich the collection from MusicBrainz
    Resolve,
    /// Show collection and cache statistics
    Status,
    /// Write the collection documents
    Export,
    /// Bundle the collection and cache into a tar.gz archive
    Archive {
        /// Clear the collection after archiving
        #[arg(long)]
        clear: bool,
    },
    /// List archives
    Archives,
    /// Restore an archive (the current state is archived first)
    Unarchive {
        /// Archive file
        file: PathBuf,
    },
    /// Delete the metadata cache
    ClearCache,
    /// Delete the collection documents
    ClearInventory,
    /// Download the collection with yt-dlp
    Download {
        #[arg(value_enum, default_value_t = DownloadTarget::All)]
        target: DownloadTarget,
        /// Destination folder (overrides the configured one)
        #[arg(short, long)]
        dest: Option<PathBuf>,
        /// Concurrent downloads
        #[arg(short, long)]
        threads: Option<usize>,
        /// Put playlist and liked songs directly into the destination folder
        #[arg(long)]
        flat: bool,
    },
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified (meaning usage should be shown).
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };
    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    let rt = Runtime::new()?;

    match command {
        Commands::Import { path } => cmd_import(&rt, config, path)?,
        Commands::Resolve => cmd_resolve(&rt, config)?,
        Commands::Status => cmd_status(config)?,
        Commands::Export => cmd_export(config)?,
        Commands::Archive { clear } => cmd_archive(config, *clear)?,
        Commands::Archives => cmd_archives(config)?,
        Commands::Unarchive { file } => cmd_unarchive(config, file)?,
        Commands::ClearCache => cmd_clear_cache(config)?,
        Commands::ClearInventory => cmd_clear_inventory(config)?,
        Commands::Download {
            target,
            dest,
            threads,
            flat,
        } => {
            let mut config = config;
            if let Some(dest) = dest {
                config.download.folder = Some(dest.clone());
            }
            if let Some(threads) = threads {
                config.download.threads = (*threads).max(1);
            }
            if *flat {
                config.download.hierarchy = false;
            }
            cmd_download(&rt, config, *target)?;
        }
    }
    Ok(true)
}

/// Context without a catalog, for commands that never query one.
fn offline_context(config: Config) -> anyhow::Result<AppContext> {
    AppContext::init_with_catalog(config, None).context("Failed to load collection")
}

// ============================================================================
// Individual command implementations
// ============================================================================

fn cmd_import(rt: &Runtime, config: Config, path: &Path) -> anyhow::Result<()> {
    if !path.is_dir() {
        anyhow::bail!("{:?} is not a directory", path);
    }
    let mut ctx = offline_context(config)?;
    let library = LocalLibrary::new(path, ctx.config.download.liked_songs_name.clone(), ctx.matcher);

    println!("Importing {:?}...", path);
    let summary = rt.block_on(sync::import_from(&library, &mut ctx.collection))?;
    ctx.save()?;

    println!(
        "✓ Imported {} albums, {} playlists, {} liked songs",
        summary.albums, summary.playlists, summary.liked_songs
    );
    if !summary.conflicts.is_empty() {
        println!("✗ {} skipped because of conflicting data:", summary.conflicts.len());
        for label in &summary.conflicts {
            println!("  {}", label);
        }
    }
    Ok(())
}

fn cmd_resolve(rt: &Runtime, config: Config) -> anyhow::Result<()> {
    if !config.resolver.enabled {
        println!("Resolver is disabled in the configuration.");
        return Ok(());
    }
    let mut ctx = AppContext::init(config).context("Failed to initialise resolver")?;
    let before = ctx.cache.len();

    println!("Resolving collection against MusicBrainz (this is rate limited)...");
    let result = rt.block_on(ctx.resolve());
    // Keep whatever was enriched before a failure
    ctx.save()?;
    result?;

    println!(
        "✓ Resolved collection, {} new cache entries",
        ctx.cache.len().saturating_sub(before)
    );
    Ok(())
}

fn cmd_status(config: Config) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    let stats = ctx.cache.stats();
    let collection = &ctx.collection;

    println!("Collection ({:?})", ctx.storage.data_dir());
    println!("  Albums:      {} ({} songs)", collection.album_count(), collection.albums_track_count());
    println!(
        "  Playlists:   {} ({} songs)",
        collection.playlist_count(),
        collection.playlists_track_count()
    );
    println!("  Liked songs: {}", collection.liked_song_count());
    println!("  Total songs: {}", collection.total_track_count());
    println!();
    println!("Cache ({:?})", ctx.storage.cache_dir());
    println!("  Artists: {}", stats.artists);
    println!("  Albums:  {}", stats.albums);
    println!("  Songs:   {}", stats.songs);
    println!("  Ids:     {}", stats.ids);
    println!();
    match ctx.storage.list_archives() {
        Ok(archives) => println!("Archives: {}", archives.len()),
        Err(e) => warn!("Could not list archives: {}", e),
    }
    Ok(())
}

fn cmd_export(config: Config) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    ctx.save()?;
    println!("✓ Exported collection to {:?}", ctx.storage.data_dir());
    Ok(())
}

fn cmd_archive(config: Config, clear: bool) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    ctx.save()?;
    let path = ctx.storage.archive(clear)?;
    println!("✓ Archived to {:?}", path);
    if clear {
        println!("  Collection cleared.");
    }
    Ok(())
}

fn cmd_archives(config: Config) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    let archives = ctx.storage.list_archives()?;
    if archives.is_empty() {
        println!("No archives in {:?}", ctx.storage.archive_dir());
        return Ok(());
    }
    for archive in archives {
        println!("{}", archive.display());
    }
    Ok(())
}

fn cmd_unarchive(config: Config, file: &Path) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    let backup = ctx
        .storage
        .unarchive(file)
        .with_context(|| format!("Failed to restore {:?}", file))?;
    println!("✓ Restored {:?}", file);
    println!("  Previous state saved to {:?}", backup);
    Ok(())
}

fn cmd_clear_cache(config: Config) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    ctx.storage.clear_cache()?;
    ctx.cache.clear();
    println!("✓ Cache cleared");
    Ok(())
}

fn cmd_clear_inventory(config: Config) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    ctx.storage.clear_inventory()?;
    println!("✓ Inventory cleared");
    Ok(())
}

fn cmd_download(rt: &Runtime, config: Config, target: DownloadTarget) -> anyhow::Result<()> {
    let ctx = offline_context(config)?;
    let cancel = CancelFlag::new();
    let mut downloader = ctx.downloader(cancel.clone())?;

    rt.block_on(async {
        let source = crate::download::YtDlpSource::new(&ctx.config.download);
        if !source.is_available().await {
            anyhow::bail!(
                "yt-dlp not found at '{}'. Install it or set download.youtube_dl_path",
                ctx.config.download.youtube_dl_path
            );
        }

        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing running downloads...");
                on_ctrl_c.cancel();
            }
        });

        println!("Downloading to {:?}", downloader.root());
        let collection = &ctx.collection;
        let report = match target {
            DownloadTarget::Albums => downloader.download_albums(collection, collection.albums()).await,
            DownloadTarget::Playlists => {
                downloader
                    .download_playlists(collection, collection.playlists())
                    .await
            }
            DownloadTarget::Liked => downloader.download_liked_songs(collection).await,
            DownloadTarget::All => downloader.download_all(collection).await,
        };
        print_report(&report, cancel.is_cancelled());
        Ok(())
    })
}

fn print_report(report: &DownloadReport, cancelled: bool) {
    println!();
    println!(
        "Completed: {} downloaded, {} already present, {} failed",
        report.downloaded(),
        report.skipped(),
        report.failed()
    );
    if cancelled {
        println!("Cancelled: {} songs not downloaded", report.cancelled());
    }
    for (song, error) in report.failures() {
        println!("  ✗ {}: {}", song, error);
    }
    info!("Download finished with {} outcomes", report.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::parse_from(["crate-digger", "download", "liked", "--threads", "8", "--flat"]);
        match cli.command {
            Some(Commands::Download {
                target,
                threads,
                flat,
                dest,
            }) => {
                assert_eq!(target, DownloadTarget::Liked);
                assert_eq!(threads, Some(8));
                assert!(flat);
                assert!(dest.is_none());
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_download_defaults_to_all() {
        let cli = Cli::parse_from(["crate-digger", "download"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Download {
                target: DownloadTarget::All,
                ..
            })
        ));
    }

    #[test]
    fn test_no_command_runs_nothing() {
        let cli = Cli::parse_from(["crate-digger"]);
        assert!(!run_command(&cli).unwrap());
    }

    #[test]
    fn test_import_and_status_against_temp_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let config = crate::test_utils::test_config(temp.path());
        let library = temp.path().join("library");
        std::fs::create_dir_all(&library).unwrap();
        std::fs::write(library.join("Hurt - Johnny Cash.mp3"), b"not really audio").unwrap();

        let rt = Runtime::new().unwrap();
        cmd_import(&rt, config.clone(), &library).unwrap();
        cmd_status(config.clone()).unwrap();

        let ctx = offline_context(config).unwrap();
        assert_eq!(ctx.collection.liked_song_count(), 1);
    }
}
