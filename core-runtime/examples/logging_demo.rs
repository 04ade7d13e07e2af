//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! # Pretty format, warnings only (debug_mode off)
//! cargo run -p core-runtime --example logging_demo
//!
//! # JSON format with debug_mode on
//! cargo run -p core-runtime --example logging_demo -- json debug
//! ```

use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{init_logging, redact_query, strip_path, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };
    let debug_mode = args.get(2).is_some_and(|arg| arg == "debug");

    let config = LoggingConfig::for_debug_mode(debug_mode)
        .with_format(format)
        .with_spans(true);
    init_logging(config).expect("Failed to initialize logging");

    warn!(format = ?format, debug_mode, "Logging initialized");

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();

    simulate_download(
        &bus,
        "https://cdn.example.com/covers/42.jpg?token=secret",
        "/home/user/.local/share/media-cache/-1538424543.jpg",
    )
    .await;

    while let Ok(event) = events.try_recv() {
        info!(event = %event.description(), "Received cache event");
    }
}

#[instrument(skip_all, fields(url = %redact_query(url)))]
async fn simulate_download(bus: &EventBus, url: &str, path: &str) {
    debug!("Cache miss");
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    debug!(file = %strip_path(path), size = 2048, "Wrote file");

    let _ = bus.emit(CoreEvent::Cache(CacheEvent::MediaCached {
        url: url.to_string(),
        file_name: strip_path(path).to_string(),
        size: 2048,
    }));
}
