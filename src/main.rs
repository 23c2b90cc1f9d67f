use clap::Parser;
use mediax::config::Config;
use std::path::PathBuf;

/// Mediax - on-demand media transformation cache
#[derive(Parser, Debug)]
#[command(name = "mediax")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Validate configuration and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() {
    mediax::logging::init_subscriber().expect("Failed to initialize logging subsystem");

    let args = Args::parse();

    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    if args.test {
        println!("Configuration OK");
        return;
    }

    tracing::info!(
        config_file = %args.config.display(),
        origin_bucket = %config.origin_bucket,
        cache_bucket = %config.cache_bucket(),
        cache_enabled = config.cache.enabled,
        audio_enabled = config.audio_enabled,
        redirect_responses = config.redirect_responses,
        "Configuration loaded successfully"
    );

    if config.audio_enabled && !mediax::engine::audio::is_ffmpeg_on_path() {
        tracing::warn!("ffmpeg not found on PATH; audio transform requests will fail");
    }

    if let Err(err) = mediax::server::run(config).await {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}
