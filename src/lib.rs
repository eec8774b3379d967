pub mod core;
pub mod plugins;
pub mod shared;

use crate::core::logging::{init_logging, LoggingGuards};
use crate::core::settings::{load_settings, AppSettings};
use crate::shared::paths::get_log_dir;

/// Process-level setup: loads settings and installs file logging.
///
/// Keep the returned guards alive for as long as logs should be flushed.
pub fn bootstrap() -> (AppSettings, Option<LoggingGuards>) {
    let guards = init_logging(&get_log_dir());
    let settings = load_settings();

    tracing::info!(target: "system",
        "journal-capture {} starting (api={})", env!("CARGO_PKG_VERSION"), settings.api_base_url);

    (settings, guards)
}
