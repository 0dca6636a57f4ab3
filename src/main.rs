use anyhow::Result;
use clap::Parser;
use log::info;
use roomscribe::cli::Cli;
use roomscribe::config::Config;
use roomscribe::media::{CodecParameters, PacketStreamTrack};
use roomscribe::recognition::TcpRecognitionBackend;
use roomscribe::session::Session;
use roomscribe::sink::StdoutSink;
use std::path::Path;
use std::sync::Arc;

/// Config file looked up when --config is not given.
const DEFAULT_CONFIG_PATH: &str = "roomscribe.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    let config = load_config(&cli)?;
    info!("roomscribe {}", roomscribe::version_string());

    run_pipe(config).await
}

/// Load configuration from file or use defaults.
///
/// Priority order (later wins):
/// 1. Config file (--config, or ./roomscribe.toml if present)
/// 2. ROOMSCRIBE_* environment variables
/// 3. Command-line flags
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?
    };

    let config = cli.apply_overrides(config.with_env_overrides());
    config.validate()?;
    Ok(config)
}

/// Pipe mode: stdin carries u16 big-endian length-prefixed Opus packets;
/// transcripts go to stdout. Runs one session and drives it all the way to
/// `Closed` before returning.
async fn run_pipe(config: Config) -> Result<()> {
    let params = CodecParameters {
        clock_rate: config.relay.clock_rate,
        channels: 1,
    };
    let sid = format!("{}-stdin", config.room.identity);
    let track = PacketStreamTrack::new(&sid, tokio::io::stdin(), params, config.timestamp_step());
    let backend = Arc::new(TcpRecognitionBackend::new(&config.recognition.endpoint));

    info!(
        "room {}: relaying stdin to {}",
        config.room.name, config.recognition.endpoint
    );

    let mut handle = Session::start(
        Box::new(track),
        backend,
        Arc::new(StdoutSink),
        config.session_config(),
    )
    .await?;

    let interrupted = tokio::select! {
        _ = handle.closed() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        info!("interrupt received, shutting down");
        handle.close();
        handle.closed().await;
    }

    info!("session {} finished", handle.sid());
    Ok(())
}
