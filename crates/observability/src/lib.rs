//! Process-wide logging setup shared by every binary.

pub mod subscriber;

pub use subscriber::{LOG_FORMAT_VAR, LogFormat, LogSettings};

/// Initialize structured logging filtered by `RUST_LOG` (default `info`).
///
/// Output is JSON unless `LOG_FORMAT=pretty`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::install(&LogSettings::from_env());
}
