//! Subscriber setup: console output, plus a dated log file when
//! `logging.path` is configured.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{Level, Metadata};
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use crate::config::{LogKind, LoggingConfig};

impl From<&Level> for LogKind {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => LogKind::Error,
            Level::WARN => LogKind::Warning,
            _ => LogKind::Log,
        }
    }
}

/// Whether a record of `meta`'s level belongs in the log file.
pub fn file_accepts(kinds: &[LogKind], meta: &Metadata<'_>) -> bool {
    kinds.contains(&LogKind::from(meta.level()))
}

/// `<path>/<now formatted by file_date_format>.log`, or `None` without a path.
pub fn log_file_path(cfg: &LoggingConfig, now: OffsetDateTime) -> anyhow::Result<Option<PathBuf>> {
    let Some(dir) = &cfg.path else {
        return Ok(None);
    };

    let format = time::format_description::parse(&cfg.file_date_format)
        .with_context(|| format!("invalid log date format {:?}", cfg.file_date_format))?;
    let stamp = now.format(&format).context("formatting log file name")?;

    Ok(Some(dir.join(format!("{stamp}.log"))))
}

/// Installs the global subscriber. Returns the log file in use, if any.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .context("invalid log level")?;

    let console = fmt::layer().with_target(false).with_level(true);

    let file_path = log_file_path(cfg, OffsetDateTime::now_utc())?;
    let file_layer = match &file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let kinds = cfg.file_kinds.clone();

            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter_fn(move |meta| file_accepts(&kinds, meta))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("installing log subscriber")?;

    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_file_kinds() {
        assert_eq!(LogKind::from(&Level::ERROR), LogKind::Error);
        assert_eq!(LogKind::from(&Level::WARN), LogKind::Warning);
        assert_eq!(LogKind::from(&Level::INFO), LogKind::Log);
        assert_eq!(LogKind::from(&Level::TRACE), LogKind::Log);
    }
}
