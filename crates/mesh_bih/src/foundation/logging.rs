//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace, LevelFilter};

/// Initialize the logging system
///
/// Library code only talks to the `log` facade; binaries call this once at
/// startup. Per-module `RUST_LOG` directives still apply. Repeated
/// calls are ignored.
pub fn init(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init();
}
