use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command line arguments for the mediarack server.
///
/// Every flag can also be supplied through the environment (and therefore
/// a `.env` file, which is loaded before parsing).
#[derive(Parser, Debug)]
#[command(name = "mediarack-server")]
#[command(about = "Media library indexer and listing server")]
pub struct Args {
    /// Root of the media library.
    #[arg(long, env = "MEDIARACK_ROOT", default_value = "/media")]
    pub root: PathBuf,

    /// Address to bind.
    #[arg(long, env = "MEDIARACK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, env = "MEDIARACK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the ffmpeg binary.
    #[arg(long, env = "MEDIARACK_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Path of the ffprobe binary.
    #[arg(long, env = "MEDIARACK_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    /// Seconds between catalog lookups.
    #[arg(long, env = "MEDIARACK_CATALOG_PACE", default_value_t = 10)]
    pub catalog_pace: u64,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub media_root: PathBuf,
    pub host: String,
    pub port: u16,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub catalog_pace: Duration,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            media_root: args.root,
            host: args.host,
            port: args.port,
            ffmpeg: args.ffmpeg,
            ffprobe: args.ffprobe,
            catalog_pace: Duration::from_secs(args.catalog_pace),
        }
    }
}
