use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// RFC3339 UTC timer implemented via `chrono` (no extra features).
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        // Compact: no fractional seconds, Z-suffix
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Build the formatting layer shared by every crate in the workspace.
///
/// - RFC3339 UTC timestamps
/// - Compact single-line format with `file:line` and target
/// - Span close events (duration of instrumented provider calls)
/// - ANSI colors only when stdout is a terminal
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
}

/// `RUST_LOG` if set and valid, otherwise `default` (e.g. `"info"`).
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_renders_utc_seconds() {
        let mut buf = String::new();
        ChronoRfc3339Utc
            .format_time(&mut Writer::new(&mut buf))
            .unwrap();
        assert!(buf.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&buf).is_ok());
    }
}
