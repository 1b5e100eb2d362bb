use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use photomap::exif_types::tag_id_to_name;
use photomap::geolocate::IpGeolocator;
use photomap::pipeline::is_accepted;
use photomap::{Config, ExifTagReader, HeadlessEngine, PhotoMapSession, RawFile, TagReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

type Session = PhotoMapSession<HeadlessEngine, ExifTagReader>;

#[derive(Parser)]
#[command(author, version, about = "Puts geotagged photos on a map.", long_about = None)]
struct Cli {
    /// Config file (default: photomap.toml in the user config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Store directory, overrides the config file
    #[arg(long, value_name = "DIR", global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import files or directories as one batch
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List stored photos in import order
    List,
    /// Delete one photo by id
    Delete { id: String },
    /// Delete every photo and reset the map
    Clear,
    /// Print the current markers as GeoJSON
    Geojson {
        /// Recenter the default view from the IP location first
        #[arg(long)]
        recenter: bool,
    },
    /// Show the EXIF tags of a file
    Inspect { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("photomap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(store) = cli.store {
        config.store.path = Some(store);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(run(config, cli.command))
}

async fn run(config: Config, command: Command) -> Result<()> {
    // Inspect only reads the file, the store stays closed
    let command = match command {
        Command::Inspect { path } => return inspect(&path),
        command => command,
    };
    let geolocation = config.geolocation.clone();
    let extensions = config.import.extensions.clone();
    let mut session: Session = PhotoMapSession::open(config, HeadlessEngine::new(), ExifTagReader);
    print_notices(&mut session);

    match command {
        Command::Import { paths } => {
            let mut files = Vec::new();
            for path in collect_paths(&paths, &extensions) {
                files.push(RawFile::from_path(&path).await);
            }
            if files.is_empty() {
                warn!("no importable files found");
            }
            let ids = session.import_batch(files).await;
            for id in &ids {
                if let Some(photo) = session.get(id) {
                    print_photo(photo);
                }
            }
            println!(
                "Imported {} photo(s), {} marker(s) on the map",
                ids.len(),
                session.markers().marker_count()
            );
        }
        Command::List => {
            for photo in session.photos() {
                print_photo(photo);
            }
            println!("{} photo(s)", session.len());
        }
        Command::Delete { id } => {
            if session.delete(&id) {
                println!("Deleted {}", id);
            } else {
                println!("No photo with id {}", id);
            }
        }
        Command::Clear => {
            let count = session.len();
            session.clear_all();
            println!("Cleared {} photo(s)", count);
        }
        Command::Geojson { recenter } => {
            if recenter || geolocation.enabled {
                match IpGeolocator::new(&geolocation) {
                    Ok(locator) => {
                        session.recenter_from_ip(&locator).await;
                    }
                    Err(e) => warn!(error = %e, "geolocation client unavailable"),
                }
            }
            if let Some(map) = session.map() {
                println!("{}", serde_json::to_string_pretty(&map.to_geojson())?);
            }
        }
        Command::Inspect { .. } => {}
    }

    print_notices(&mut session);
    session.close();
    Ok(())
}

/// Expand directories and keep files with accepted extensions.
fn collect_paths(paths: &[PathBuf], extensions: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let accepted = is_accepted(&entry.file_name().to_string_lossy(), extensions);
                    if accepted {
                        out.push(entry.into_path());
                    } else {
                        debug!(path = %entry.path().display(), "skipping unsupported file");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "cannot read path"),
            }
        }
    }
    out
}

fn print_photo(photo: &photomap::Photo) {
    let location = match photo.location {
        Some(loc) => format!("{:.5}, {:.5}", loc.latitude, loc.longitude),
        None => "-".to_string(),
    };
    println!("{}\t{}\t{}\t{}", photo.id, photo.name, photo.formatted_date, location);
}

fn print_notices(session: &mut Session) {
    for notice in session.drain_notices() {
        eprintln!("Notice: {}", notice);
    }
}

fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let tags = ExifTagReader.read_tags(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    for (tag, value) in &tags {
        let name = tag_id_to_name(*tag).map(str::to_string).unwrap_or_else(|| format!("0x{:04X}", tag));
        println!("{:<20} {}", name, value.as_string());
    }
    Ok(())
}
