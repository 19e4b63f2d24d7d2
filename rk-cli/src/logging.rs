//! CLI logging initialization
//!
//! Per-phase log control on top of `tracing-subscriber`. Logs go to stderr;
//! stdout carries the printed exports.

use crate::config::LogConfig;
use clap::ValueEnum;
use rk_config::Phase;
use std::io;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, for development
    Pretty,
    Compact,
    /// For tool integration
    Json,
}

/// Filter with one target per kernel phase.
pub fn targets(log_config: &LogConfig) -> Targets {
    Phase::ALL.iter().fold(
        Targets::new()
            .with_default(log_config.global)
            .with_target("rk::cli", log_config.global),
        |targets, &phase| targets.with_target(phase.target(), log_config.level_for(phase)),
    )
}

/// Install the global subscriber.
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let layer = create_format_layer(format, io::stderr).with_filter(targets(log_config));
    // A second initialization (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}
