use std::sync::OnceLock;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

pub static APPLICATION_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Installs the process-wide `tracing` subscriber: env-filtered, plaintext,
/// written to stderr so stdout stays free for any data the binary itself
/// writes. Returns a guard that must be held for the life of the process;
/// dropping it is what flushes any buffered log lines on shutdown.
pub fn setup_logging() -> impl Drop {
	APPLICATION_START_TIME.get_or_init(Instant::now);
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();
	LogGuard
}

struct LogGuard;

impl Drop for LogGuard {
	fn drop(&mut self) {}
}
