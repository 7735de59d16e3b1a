use chrono::Local;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy)]
struct MarketTimer;

impl FormatTime for MarketTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%m%dT%H:%M:%S%.3f"))
    }
}

/// Maps the legacy five-level verbosity names onto tracing directives.
///
/// `spam` and `note` become `trace` and `debug`; `warning` becomes `warn`.
/// Anything else is passed through so full `EnvFilter` directives still work.
pub fn level_directive(level: &str) -> String {
    match level.to_ascii_lowercase().as_str() {
        "spam" => "trace".to_string(),
        "note" => "debug".to_string(),
        "warning" => "warn".to_string(),
        other => other.to_string(),
    }
}

/// Installs the stdout and file logging layers.
///
/// The returned guard must be held for the lifetime of the process so that the
/// non-blocking file writer flushes.
pub fn init(log_path: impl AsRef<Path>, level: &str) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let file = std::fs::File::create(log_path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let directive = level_directive(level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(MarketTimer)
                .with_writer(std::io::stdout)
                .with_filter(EnvFilter::new(&directive)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(MarketTimer)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new(&directive)),
        )
        .try_init()?;

    Ok(guard)
}

/// Stdout-only subscriber honouring `RUST_LOG`, for tests and small drivers.
pub fn init_stdout(default_level: &str) {
    let directive = level_directive(default_level);
    let _ = tracing_subscriber::fmt()
        .with_timer(MarketTimer)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .try_init();
}
