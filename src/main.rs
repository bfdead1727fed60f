// loghook - main.rs
// Bootstrap runner: local logging when no log stream is configured, remote sinks otherwise

use anyhow::{Context, Result};
use clap::Parser;
use sigil_loghook::config_loader::{load_config, HookConfig};
use sigil_loghook::event::{Level, LogEvent};
use sigil_loghook::event_adapter::{AdapterOptions, EventAdapter, EventSink};
use sigil_loghook::instance::InstanceMetadata;
use sigil_loghook::log_bridge::LogBridge;
use sigil_loghook::stack_trace::StackCapture;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "loghook", about = "Emit a log event through the configured sinks")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Level of the emitted event (trace, debug, info, warn, error, fatal, panic)
    #[arg(long, default_value = "info")]
    level: String,

    /// Message to emit
    #[arg(required = true)]
    message: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level: Level = cli
        .level
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown level '{}'", cli.level))?;
    let message = cli.message.join(" ");

    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;

    if !config.remote_enabled() {
        tracing_subscriber::fmt().init();
        emit_local(level, &message);
        return Ok(());
    }

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install diagnostics subscriber")?;

    let adapter = Arc::new(build_adapter(&config)?);
    LogBridge::install(adapter.clone()).context("Failed to install log bridge")?;

    // `log` has no fatal or panic level; those go straight to the adapter.
    match to_log_level(level) {
        Some(log_level) => log::log!(log_level, "{}", message),
        None => adapter.handle(&LogEvent::new(level, message))?,
    }
    log::logger().flush();

    adapter.close().context("Failed to close event adapter")?;
    Ok(())
}

fn build_adapter(config: &HookConfig) -> Result<EventAdapter> {
    let provider = config.provider()?;
    let options = AdapterOptions {
        stack_capture: StackCapture::default().with_max_bytes(config.output.max_stack_bytes),
        ..AdapterOptions::default()
    };

    EventAdapter::with_options(
        &provider,
        &config.project_id,
        &config.log_name,
        InstanceMetadata::from_parts(
            config.instance.id.as_str(),
            config.instance.name.as_str(),
            config.instance.zone.as_str(),
        ),
        options,
    )
    .context("Failed to set up remote logging")
}

fn to_log_level(level: Level) -> Option<log::Level> {
    match level {
        Level::Trace => Some(log::Level::Trace),
        Level::Debug => Some(log::Level::Debug),
        Level::Info => Some(log::Level::Info),
        Level::Warn => Some(log::Level::Warn),
        Level::Error => Some(log::Level::Error),
        Level::Fatal | Level::Panic => None,
    }
}

fn emit_local(level: Level, message: &str) {
    match level {
        Level::Trace => tracing::trace!("{}", message),
        Level::Debug => tracing::debug!("{}", message),
        Level::Info => tracing::info!("{}", message),
        Level::Warn => tracing::warn!("{}", message),
        Level::Error | Level::Fatal | Level::Panic => tracing::error!("{}", message),
    }
}
