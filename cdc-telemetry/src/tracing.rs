use std::sync::Once;

use cdc_config::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Directory rolling log files are written to in production.
const LOG_DIR: &str = "logs";

const DEFAULT_LOG_LEVEL: &str = "info";

/// Default filter of test runs, overridden by `RUST_LOG`.
const DEFAULT_TEST_LOG_LEVEL: &str = "cdc=debug";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] std::io::Error),

    #[error("failed to bridge `log` records into tracing: {0}")]
    LogTracer(#[from] tracing_log::log_tracer::SetLoggerError),

    #[error("failed to create rolling log file appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("failed to install the global tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Must be kept alive until the process exits.
#[must_use = "dropping the flusher stops writing buffered log lines"]
#[derive(Debug)]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global subscriber of a binary named `service_name`.
///
/// In development logs are pretty printed to stdout. In production they are written as JSON
/// to daily rolling files under `logs/`. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(service_name: &str) -> Result<LogFlusher, TracingError> {
    tracing_log::LogTracer::init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    match Environment::load()? {
        Environment::Dev => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()?;

            Ok(LogFlusher { _guard: None })
        }
        Environment::Prod => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(service_name)
                .filename_suffix("log")
                .build(LOG_DIR)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true).with_writer(writer))
                .try_init()?;

            Ok(LogFlusher {
                _guard: Some(guard),
            })
        }
    }
}

/// Installs a subscriber that writes through the test harness capture.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_LOG_LEVEL));

        // Another test binary helper may already have installed a subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
