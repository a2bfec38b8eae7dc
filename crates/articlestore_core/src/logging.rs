//! Process-wide logging bootstrap.
//!
//! Library code only talks to the `log` facade. The binary calls
//! [`init_logging`] once with the configured level; log lines go to stderr so
//! command reports on stdout stay machine-readable.

use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use env_logger::{Builder, Target};
use log::{LevelFilter, info};

static ACTIVE_LEVEL: OnceLock<LevelFilter> = OnceLock::new();

/// Initializes stderr logging at `level`.
///
/// Repeating the call with the same level is a no-op; switching to a
/// different level after initialization is rejected.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = parse_level(level)?;
    if let Some(active) = ACTIVE_LEVEL.get() {
        if *active == filter {
            return Ok(());
        }
        bail!("logging already initialized with level `{active}`; refusing to switch to `{filter}`");
    }

    Builder::new()
        .filter_level(filter)
        .target(Target::Stderr)
        .format_timestamp_millis()
        .try_init()
        .context("failed to start logger")?;
    let _ = ACTIVE_LEVEL.set(filter);

    info!(
        "event=app_start status=ok level={filter} version={}",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

/// Level the process logger was started with, if it has been started.
pub fn active_level() -> Option<LevelFilter> {
    ACTIVE_LEVEL.get().copied()
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    let trimmed = level.trim();
    trimmed
        .parse::<LevelFilter>()
        .ok()
        .with_context(|| format!("unsupported log level `{trimmed}`"))
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::{active_level, init_logging, parse_level};

    #[test]
    fn parse_level_accepts_standard_names() {
        assert_eq!(parse_level("info").expect("info"), LevelFilter::Info);
        assert_eq!(parse_level(" DEBUG ").expect("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("off").expect("off"), LevelFilter::Off);
        let error = parse_level("loud").expect_err("must fail");
        assert!(error.to_string().contains("unsupported log level `loud`"));
    }

    #[test]
    fn init_is_idempotent_for_same_level() {
        init_logging("warn").expect("first init");
        init_logging("warn").expect("second init");
        assert_eq!(active_level(), Some(LevelFilter::Warn));
        let error = init_logging("trace").expect_err("must fail");
        assert!(error.to_string().contains("refusing to switch"));
    }
}
