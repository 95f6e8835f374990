mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use common::{Album, Artist, MusicDir, Track};
use library::{Library, LibraryStats};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{config_path_from_env, load_or_create_config, resolve_path};

/// Keeps a SQLite index of music directories, tracks and their tags.
#[derive(Parser, Debug)]
#[command(name = "midx", version)]
struct Cli {
    /// Config file; defaults to $MIDX_CONFIG or the platform data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index one or more music directories.
    #[command(alias = "insert")]
    Add {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Print every entity of one kind.
    List {
        kind: ListKind,
        #[arg(long)]
        json: bool,
    },
    /// Drop music directories and their tracks from the index.
    Remove {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Rescan every indexed directory.
    Rebuild,
    /// Drop tracks whose files no longer exist.
    Prune,
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ListKind {
    #[value(alias = "music-dirs")]
    Mdirs,
    Artists,
    Albums,
    Tracks,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config_path_from_env);
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Wrote default config to {:?}", config_path);
    }
    let db_path = resolve_path(&config_path, &config.database_path);
    let art_dir = resolve_path(&config_path, &config.data_dir);

    let mut library = Library::open(&db_path, art_dir)?;

    match cli.command {
        Command::Add { dirs } => {
            for dir in dirs {
                match library.scan(&dir)? {
                    Some(id) => println!("{}\t{}", id, dir.display()),
                    None => warn!("Not indexed: {:?}", dir),
                }
            }
        }
        Command::List { kind, json } => list(&library, kind, json)?,
        Command::Remove { dirs } => {
            for dir in dirs {
                if library.remove_directory(&dir)? {
                    println!("removed {}", dir.display());
                }
            }
        }
        Command::Rebuild => {
            let stats = library.rebuild()?;
            print_stats(&stats);
        }
        Command::Prune => {
            let removed = library.prune_missing()?;
            println!("pruned {} tracks", removed);
        }
        Command::Stats => print_stats(&library.stats()?),
    }

    Ok(())
}

fn list(library: &Library, kind: ListKind, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match kind {
        ListKind::Mdirs => emit(library.list_music_dirs()?, json, music_dir_line),
        ListKind::Artists => emit(library.list_artists()?, json, artist_line),
        ListKind::Albums => emit(library.list_albums()?, json, album_line),
        ListKind::Tracks => emit(library.list_tracks()?, json, track_line),
    }
}

fn emit<T: Serialize>(
    items: Vec<T>,
    json: bool,
    line: fn(&T) -> String,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{}", line(item));
        }
    }
    Ok(())
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn music_dir_line(dir: &MusicDir) -> String {
    format!("{}\t{}", dir.id, dir.path.display())
}

fn artist_line(artist: &Artist) -> String {
    format!("{}\t{}", artist.id, artist.name)
}

fn album_line(album: &Album) -> String {
    format!("{}\t{}\t{}", album.id, optional(album.artist_id), album.name)
}

fn track_line(track: &Track) -> String {
    match &track.metadata {
        Some(meta) => format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            track.id,
            track.file_path.display(),
            meta.title,
            optional(meta.track_number),
            optional(meta.artist_id),
            optional(meta.album_id),
        ),
        None => format!("{}\t{}", track.id, track.file_path.display()),
    }
}

fn print_stats(stats: &LibraryStats) {
    println!(
        "Indexed: {} music dirs, {} artists, {} albums, {} tracks ({} tagged)",
        stats.music_dirs, stats.artists, stats.albums, stats.tracks, stats.tagged_tracks
    );
}
