//! Logging setup
//!
//! Builds the tracing subscriber from [`LogSettings`]: an optional
//! console layer, an optional rolling-file layer, and a level filter
//! that `RUST_LOG` overrides when set.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::domain::settings::LogSettings;

/// Keeps the non-blocking file writer alive; dropping it stops the
/// flushing of buffered log lines.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

fn rotation_for(name: &str) -> Rotation {
    match name.to_ascii_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn level_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Assemble the subscriber and the writer guards it needs kept alive.
fn build_subscriber(
    settings: &LogSettings,
) -> (impl tracing::Subscriber + Send + Sync, Vec<WorkerGuard>) {
    let mut guards = Vec::new();

    let console_layer = settings.console_logging_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(settings.ansi_colors)
            .with_file(settings.show_file_line)
            .with_line_number(settings.show_file_line)
            .with_thread_ids(settings.show_thread_ids)
            .with_target(settings.show_target)
    });

    let file_layer = if settings.file_logging_enabled {
        let appender = RollingFileAppender::new(
            rotation_for(&settings.rotation),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                // No ANSI escapes in log files.
                .with_ansi(false)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_thread_ids(settings.show_thread_ids)
                .with_target(settings.show_target),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(level_filter(settings))
        .with(console_layer)
        .with(file_layer);
    (subscriber, guards)
}

/// Install the configured subscriber as the global default.
pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let (subscriber, guards) = build_subscriber(settings);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::info!(level = %settings.level, "logging ready");
    Ok(LoggingGuard { _guards: guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_names_parse_case_insensitively() {
        assert_eq!(rotation_for("Hourly"), Rotation::HOURLY);
        assert_eq!(rotation_for("MINUTELY"), Rotation::MINUTELY);
        assert_eq!(rotation_for("never"), Rotation::NEVER);
        // Unknown names fall back to daily rotation.
        assert_eq!(rotation_for("weekly"), Rotation::DAILY);
    }

    #[test]
    fn console_only_subscriber_accepts_events() {
        let settings = LogSettings {
            file_logging_enabled: false,
            ..LogSettings::default()
        };
        let (subscriber, guards) = build_subscriber(&settings);
        // No file writer, nothing to keep alive.
        assert!(guards.is_empty());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("console smoke check");
        });
    }

    #[test]
    fn file_logging_holds_a_writer_guard() {
        let dir = std::env::temp_dir().join("variolink-log-test");
        let settings = LogSettings {
            console_logging_enabled: false,
            log_dir: dir.to_string_lossy().into_owned(),
            ..LogSettings::default()
        };
        let (subscriber, guards) = build_subscriber(&settings);
        assert_eq!(guards.len(), 1);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("file smoke check");
        });
    }
}
