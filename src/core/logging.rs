use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log targets that get their own rolling file. Everything else lands in `system.log`.
pub const LOG_TARGETS: [&str; 2] = ["recorder", "transcript"];

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking writers flushing. Drop it only at shutdown.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

struct TargetWriter {
    writers: HashMap<String, NonBlocking>,
    system_writer: NonBlocking,
}

impl TargetWriter {
    fn new(writers: HashMap<String, NonBlocking>, system_writer: NonBlocking) -> Self {
        Self {
            writers,
            system_writer,
        }
    }
}

impl<'a> MakeWriter<'a> for TargetWriter {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Box::new(self.system_writer.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        let target = meta.target();
        match route_target(target) {
            Some(name) => match self.writers.get(name) {
                Some(writer) => Box::new(writer.clone()),
                None => Box::new(self.system_writer.clone()),
            },
            None => Box::new(self.system_writer.clone()),
        }
    }
}

/// Maps a tracing target to one of [`LOG_TARGETS`], matching `name` and `name::*`.
pub fn route_target(target: &str) -> Option<&'static str> {
    LOG_TARGETS.iter().copied().find(|name| {
        target == *name
            || target
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Installs the global subscriber writing daily-rotated files into `log_dir`.
///
/// Returns `None` when logging was already initialized (by this function or
/// by another global subscriber).
pub fn init_logging(log_dir: &Path) -> Option<LoggingGuards> {
    if INITIALIZED.set(()).is_err() {
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create logs directory {:?}: {}", log_dir, e);
        return None;
    }

    let mut guards = Vec::new();
    let mut target_writers = HashMap::new();

    for target in LOG_TARGETS {
        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", target));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        target_writers.insert(target.to_string(), non_blocking);
        guards.push(guard);
    }

    let system_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "system.log");
    let (system_writer, system_guard) = tracing_appender::non_blocking(system_appender);
    guards.push(system_guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(TargetWriter::new(target_writers, system_writer))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false),
    );

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global tracing subscriber: {}", e);
        return None;
    }

    tracing::info!(target: "system", "Logging initialized at {:?}", log_dir);

    Some(LoggingGuards { _guards: guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_target_matches_prefix() {
        assert_eq!(route_target("recorder"), Some("recorder"));
        assert_eq!(route_target("transcript::sync"), Some("transcript"));
        assert_eq!(route_target("recorderx"), None);
        assert_eq!(route_target("system"), None);
    }
}
