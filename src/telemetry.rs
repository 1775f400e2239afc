//! Logging setup for the quiz server.
//!
//! Log targets:
//! - `quiz`: session lifecycle, state transitions, rejected/busy signals, provider failures
//! - `trivia`: Open Trivia DB calls (token refresh, categories, questions, retries)
//! - `trivia_quiz`: startup, config loading, shutdown
//! - `tower_http`: per-request spans from the trace layer
//!
//! LOG_LEVEL takes a bare level ("debug") or full directives
//! ("info,quiz=debug,trivia=warn"). LOG_FORMAT is "pretty" (default) or "json".

use tracing_subscriber::EnvFilter;

/// Transitions at debug, provider calls at info, everything else at info.
const DEFAULT_FILTER: &str = "info,quiz=debug,trivia=info,trivia_quiz=info,tower_http=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn log_format(raw: Option<&str>) -> LogFormat {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match log_format(std::env::var("LOG_FORMAT").ok().as_deref()) {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
