// hcisim -- run the controller emulator behind a Unix socket.
//
// A host stack connects to the socket and speaks H4-framed HCI. Each host
// connection gets a fresh controller; the next connection is accepted once
// the current host hangs up.
//
// Usage:
//   hcisim --socket /tmp/hcisim.sock
//   hcisim --socket /tmp/hcisim.sock --bd-addr 00:11:22:33:44:55 --local-name bench
//   hcisim --socket /tmp/hcisim.sock --test-channel-port 6112 --log-level debug
//   hcisim --socket /tmp/hcisim.sock --no-test-channel --event-delay-ms 200
//
// Test channel (one line per directive, fields separated by '|'):
//   printf 'TIMEOUT_ALL\n' | nc 127.0.0.1 6111
//   printf 'DISCOVER|alpha|beta\n' | nc 127.0.0.1 6111

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UnixListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hcisim::{BdAddr, DEFAULT_TEST_CHANNEL_PORT, Engine, EngineBuilder, Properties};

/// How often a served session checks whether its host is still there.
const HOST_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Software Bluetooth controller: HCI over a Unix socket plus a TCP test channel.
#[derive(Parser, Debug)]
#[command(name = "hcisim", version, about)]
struct Cli {
    /// Path of the Unix socket the host connects to. A stale socket file is
    /// replaced.
    #[arg(long, default_value = "/tmp/hcisim.sock")]
    socket: PathBuf,

    /// TCP port of the test channel on 127.0.0.1.
    #[arg(long, default_value_t = DEFAULT_TEST_CHANNEL_PORT)]
    test_channel_port: u16,

    /// Do not open the test channel.
    #[arg(long, conflicts_with = "test_channel_port")]
    no_test_channel: bool,

    /// Controller address, most significant octet first (e.g. 00:11:22:33:44:55).
    #[arg(long)]
    bd_addr: Option<BdAddr>,

    /// Local name reported before the host writes its own.
    #[arg(long)]
    local_name: Option<String>,

    /// Delay every event by this many milliseconds from the start.
    #[arg(long)]
    event_delay_ms: Option<u64>,

    /// Log filter used when RUST_LOG is not set (e.g. info, debug, hcisim_controller=trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn engine_builder(&self) -> EngineBuilder {
        let mut properties = Properties::default();
        if let Some(bd_addr) = self.bd_addr {
            properties = properties.with_bd_addr(bd_addr);
        }
        if let Some(name) = &self.local_name {
            properties = properties.with_local_name(name);
        }

        let mut builder = EngineBuilder::new().properties(properties);
        builder = if self.no_test_channel {
            builder.without_test_channel()
        } else {
            builder.test_channel_port(self.test_channel_port)
        };
        if let Some(ms) = self.event_delay_ms {
            builder = builder.event_delay(Duration::from_millis(ms));
        }
        builder
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
    Ok(())
}

fn bind_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("failed to bind {}", path.display()))
}

/// Serve one host until it disconnects.
async fn serve(engine: &Engine) {
    let mut poll = tokio::time::interval(HOST_POLL_INTERVAL);
    while engine.is_host_connected() {
        poll.tick().await;
    }
    info!("host disconnected");
}

/// Stop an engine off the async runtime; shutdown joins worker threads.
async fn retire(engine: Engine) {
    if let Err(e) = tokio::task::spawn_blocking(move || engine.shutdown()).await {
        warn!(error = %e, "engine shutdown task failed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let listener = bind_socket(&cli.socket)?;
    info!(socket = %cli.socket.display(), "waiting for host");

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("failed to accept host connection")?;
                stream
            }
            _ = tokio::signal::ctrl_c() => break,
        };

        let stream = stream
            .into_std()
            .context("failed to detach host connection")?;
        // Frames are read whole once the socket turns readable.
        stream
            .set_nonblocking(false)
            .context("failed to make host connection blocking")?;
        info!("host connected");

        let engine = cli
            .engine_builder()
            .build_with_stream(stream)
            .context("failed to start controller")?;

        let interrupted = tokio::select! {
            _ = serve(&engine) => false,
            _ = tokio::signal::ctrl_c() => true,
        };
        retire(engine).await;
        if interrupted {
            break;
        }
    }

    info!("shutting down");
    if let Err(e) = std::fs::remove_file(&cli.socket) {
        warn!(error = %e, "failed to remove socket file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["hcisim"]);
        assert_eq!(cli.socket, PathBuf::from("/tmp/hcisim.sock"));
        assert_eq!(cli.test_channel_port, DEFAULT_TEST_CHANNEL_PORT);
        assert!(!cli.no_test_channel);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_bd_addr() {
        let cli = Cli::parse_from(["hcisim", "--bd-addr", "00:11:22:33:44:55"]);
        assert_eq!(cli.bd_addr, Some(BdAddr([0x55, 0x44, 0x33, 0x22, 0x11, 0x00])));
    }

    #[test]
    fn rejects_bad_bd_addr() {
        assert!(Cli::try_parse_from(["hcisim", "--bd-addr", "00:11:22"]).is_err());
    }

    #[test]
    fn no_test_channel_conflicts_with_port() {
        assert!(
            Cli::try_parse_from(["hcisim", "--no-test-channel", "--test-channel-port", "1"])
                .is_err()
        );
    }
}
