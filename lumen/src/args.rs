use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Lumen generation gateway
#[derive(Debug, Parser)]
#[command(name = "lumen", about = "Image generation gateway for chat and async task providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lumen.toml", env = "LUMEN_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "LUMEN_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter directive (e.g. "info", "lumen_imagegen=debug")
    #[arg(long, default_value = "info", env = "LUMEN_LOG")]
    pub log: String,
}
