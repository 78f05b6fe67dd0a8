//! OnAir CLI: prints what an internet radio station is playing

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{after, bounded, never, select, tick};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use onair::config::plugins::DEFAULT_DIR;
use onair::plugin::{ChannelPlugin, PluginEvent};
use onair::session::{SessionEnd, SongChanged, StreamSession};
use onair::stream::metadata::stream_title;

#[derive(Parser)]
#[command(name = "onair", about = "Show what an internet radio station is playing", version)]
struct Cli {
    /// Stream URL
    url: String,

    /// Plugin directory containing plugins.json
    #[arg(long, default_value = DEFAULT_DIR)]
    plugins: PathBuf,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

fn print_song(change: &SongChanged) {
    match &change.new {
        Some(song) => println!("♪ {song}"),
        None => println!("♪ (no song information)"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut session = StreamSession::new(cli.url.as_str());
    let loaded = session.load_extensions(&cli.plugins)?;
    if !loaded.is_empty() {
        info!(plugins = ?loaded, "plugins loaded");
    }

    session.on_metadata_changed(|_, change| {
        debug!(title = ?stream_title(&change.new), "metadata changed");
        Ok(())
    })?;

    let (tap, events) = ChannelPlugin::songs_only("cli");
    session.register_plugin(Box::new(tap))?;

    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })?;

    eprintln!("Connecting to {}...", cli.url);
    if let Err(e) = session.start() {
        eprintln!("Error: {}", e);
        // process::exit skips Drop; release loaded plugins first
        let _ = session.dispose();
        process::exit(1);
    }

    if let Some(headers) = session.headers() {
        let station = headers.station_name.as_deref().unwrap_or("Unknown station");
        match headers.bitrate {
            Some(br) => eprintln!("{station} · {br} kbps"),
            None => eprintln!("{station}"),
        }
    }

    let deadline = cli
        .duration
        .map(|secs| after(Duration::from_secs(secs)))
        .unwrap_or_else(never);
    // The worker ends on its own at end of stream; poll for that
    let ticker = tick(Duration::from_millis(250));

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(PluginEvent::SongChanged(change)) => print_song(&change),
                Ok(PluginEvent::StreamData(_)) => {}
                // Sender lives with the worker; gone means the worker died
                Err(_) => break,
            },
            recv(interrupt_rx) -> _ => break,
            recv(deadline) -> _ => break,
            recv(ticker) -> _ => {
                if !session.is_running() {
                    break;
                }
            }
        }
    }

    eprintln!("Stopping...");
    let outcome = session.dispose();
    for event in events.try_iter() {
        if let PluginEvent::SongChanged(change) = event {
            print_song(&change);
        }
    }

    match outcome {
        Ok(Some(SessionEnd::EndOfStream)) => eprintln!("Stream ended"),
        Ok(_) => eprintln!("Stopped"),
        Err(e) => {
            eprintln!("Stream failed: {}", e);
            process::exit(1);
        }
    }

    Ok(())
}
