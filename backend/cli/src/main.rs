mod serve;
mod status_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "livetalk")]
#[command(about = "LiveTalk - real-time digital human session server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the signaling and command server
    Serve(ServeArgs),
    /// Query a running server's health endpoint
    Status {
        #[arg(short, long, default_value_t = livetalk_config::defaults::DEFAULT_LISTEN_PORT)]
        port: u16,
    },
}

/// Flags override the config file.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Config file (defaults to ~/.livetalk/livetalk.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// wav2lip | musetalk | ultralight
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long = "avatar-id")]
    pub avatar_id: Option<String>,
    #[arg(long = "max-session")]
    pub max_session: Option<usize>,
    #[arg(long)]
    pub listenport: Option<u16>,
    #[arg(long)]
    pub fps: Option<u32>,
    /// Output width
    #[arg(long = "W")]
    pub width: Option<u32>,
    /// Output height
    #[arg(long = "H")]
    pub height: Option<u32>,
    #[arg(long = "batch-size")]
    pub batch_size: Option<u32>,
    /// indextts | silent
    #[arg(long)]
    pub tts: Option<String>,
    #[arg(long = "tts-server")]
    pub tts_server: Option<String>,
    #[arg(long = "ref-file")]
    pub ref_file: Option<String>,
    #[arg(long = "ref-text")]
    pub ref_text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve::run(args).await?,
        Commands::Status { port } => status_cmd::run(port).await?,
    }

    Ok(())
}
