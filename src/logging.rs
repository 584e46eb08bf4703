//! Tracing setup.
//!
//! Output is JSON lines in production and pretty-printed on a terminal,
//! chosen by TTY detection unless forced with `--json` or `--pretty`.
//! The level filter is a single default level over all targets.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

pub fn init(level: &LogLevel, pretty: bool, json: bool) {
    let filter =
        tracing_subscriber::filter::Targets::new().with_default(level.to_tracing_level());
    let use_json = json || !(pretty || std::io::stdout().is_terminal());

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}
