use color_eyre::Result;
use irmonitor::config::{IrProtocol, LookupEntry, RemoteConfig};
use irmonitor::decoder::{parse_code_line, DecoderHandle};
use irmonitor::monitor::MonitorHandle;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const CONFIG_PATH: &str = "irmonitor.toml";

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = Arc::new(load_config()?);
    info!(
        "IR remote config: protocol={}, {} static entries, learnt capacity {}",
        config.protocol,
        config.static_lookup_table.len(),
        config.max_learning_codes
    );

    let (code_sender, code_receiver) = mpsc::channel(1000);
    let (event_sender, mut event_receiver) = mpsc::channel(100);

    let mut monitor = MonitorHandle::spawn(config.clone(), code_receiver, event_sender);
    let decoder = DecoderHandle::new(config.protocol, code_sender);

    // Input-manager stand-in: log every event the monitor emits.
    let sink = tokio::spawn(async move {
        while let Some(event) = event_receiver.recv().await {
            info!("input manager received: {:?}", event);
        }
    });

    run_line_harness(&decoder, &monitor).await?;

    monitor.shutdown().await?;
    sink.abort();
    Ok(())
}

/// Interactive stand-in for the hardware decoder.
///
/// Hex `<address> <code>` lines become raw code events; `learn <id>`,
/// `stop`, `clear`, `codes` and `quit` drive the monitor handle.
async fn run_line_harness(decoder: &DecoderHandle, monitor: &MonitorHandle) -> Result<()> {
    info!("Line harness ready: '<addr> <code>' in hex, or learn <id> | stop | clear | codes | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        match fields.next() {
            Some("quit") => break,
            Some("stop") => {
                if let Err(e) = monitor.stop_learning().await {
                    error!("stop failed: {}", e);
                }
            }
            Some("clear") => {
                if let Err(e) = monitor.clear_learnt_codes().await {
                    error!("clear failed: {}", e);
                }
            }
            Some("codes") => match monitor.learnt_codes().await {
                Ok(codes) => info!("{} learnt codes: {:?}", codes.len(), codes),
                Err(e) => error!("codes failed: {}", e),
            },
            Some("learn") => {
                let target = fields.next().and_then(|id| id.parse::<u8>().ok());
                match target {
                    Some(id) => match monitor.start_learning(id).await {
                        Ok(()) => info!("learning mode active for input id {}", id),
                        Err(e) => warn!("{}", e),
                    },
                    None => warn!("usage: learn <input id 0-15>"),
                }
            }
            _ => match parse_code_line(trimmed) {
                Ok((address, code)) => {
                    if let Err(e) = decoder.deliver(address, code) {
                        error!("{}", e);
                    }
                }
                Err(e) => warn!("{}", e),
            },
        }
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn load_config() -> Result<RemoteConfig> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(RemoteConfig::from_file(path)?)
    } else {
        warn!("{} not found, using built-in demo table", CONFIG_PATH);
        Ok(demo_config())
    }
}

/// Demo table for running the harness without a config file.
fn demo_config() -> RemoteConfig {
    RemoteConfig {
        protocol: IrProtocol::Nec,
        static_lookup_table: vec![
            LookupEntry {
                remote_address: 0x10,
                code: 0x01,
                input_id: 0, // volume up
            },
            LookupEntry {
                remote_address: 0x10,
                code: 0x02,
                input_id: 1, // volume down
            },
            LookupEntry {
                remote_address: 0x10,
                code: 0x03,
                input_id: 2, // play/pause
            },
        ],
        ..RemoteConfig::default()
    }
}
