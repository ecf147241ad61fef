//! Scoped timing logs for analysis calls and batch runs.
//!
//! A [`TimingGuard`] measures the lifetime of a scope and emits a single log line on the
//! `visage::telemetry` target when dropped. Guards only activate when telemetry has been
//! switched on through [`configure`] *and* the logger accepts the requested level, so a
//! disabled guard costs one `Instant::now()` call.
//!
//! Guards created for batch work can carry an item count, in which case the log line also
//! reports throughput.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicBool, AtomicU8, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

const TARGET: &str = "visage::telemetry";

static ENABLED: AtomicBool = AtomicBool::new(false);
static MAX_LEVEL: AtomicU8 = AtomicU8::new(0);

/// Logs the elapsed time of a scope when dropped.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    items: Option<usize>,
    active: bool,
}

impl TimingGuard {
    /// Returns `true` when the guard will emit a log entry on drop.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Attach the number of processed items so the log line reports a rate.
    pub fn set_items(&mut self, items: usize) {
        self.items = Some(items);
    }

    /// Returns the elapsed duration since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Consume the guard without logging and return the elapsed time.
    pub fn finish(mut self) -> Duration {
        self.active = false;
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let elapsed = self.start.elapsed();
        match self.items {
            Some(items) if elapsed.as_secs_f64() > 0.0 => log!(
                target: TARGET,
                self.level,
                "{} finished {} item(s) in {:.2?} ({:.2} items/s)",
                self.label,
                items,
                elapsed,
                items as f64 / elapsed.as_secs_f64()
            ),
            _ => log!(
                target: TARGET,
                self.level,
                "{} completed in {:.2?}",
                self.label,
                elapsed
            ),
        }
    }
}

/// Create a guard that activates whenever telemetry allows `level`.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    timing_guard_if(label, level, true)
}

/// Create a guard that additionally requires `enabled` to be `true`.
pub fn timing_guard_if(
    label: impl Into<Cow<'static, str>>,
    level: Level,
    enabled: bool,
) -> TimingGuard {
    let active = enabled && telemetry_allows(level) && log_enabled!(target: TARGET, level);
    TimingGuard {
        label: label.into(),
        level,
        start: Instant::now(),
        items: None,
        active,
    }
}

/// Update the process-wide telemetry switch and verbosity ceiling.
pub fn configure(enabled: bool, level: LevelFilter) {
    ENABLED.store(enabled, Ordering::Relaxed);
    MAX_LEVEL.store(level as usize as u8, Ordering::Relaxed);
}

/// Returns whether telemetry logging is currently enabled.
pub fn telemetry_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Returns the configured telemetry ceiling.
pub fn telemetry_level() -> LevelFilter {
    match MAX_LEVEL.load(Ordering::Relaxed) {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Returns `true` when telemetry is on and `level` is within the configured ceiling.
pub fn telemetry_allows(level: Level) -> bool {
    telemetry_enabled() && level <= telemetry_level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_controls_allowed_levels() {
        configure(true, LevelFilter::Info);
        assert!(telemetry_enabled());
        assert_eq!(telemetry_level(), LevelFilter::Info);
        assert!(telemetry_allows(Level::Warn));
        assert!(telemetry_allows(Level::Info));
        assert!(!telemetry_allows(Level::Debug));

        configure(false, LevelFilter::Trace);
        assert!(!telemetry_allows(Level::Error));
    }

    #[test]
    fn finished_guard_reports_elapsed_without_logging() {
        let mut guard = timing_guard_if("test scope", Level::Debug, false);
        assert!(!guard.is_active());
        guard.set_items(3);
        let elapsed = guard.finish();
        assert!(elapsed <= Duration::from_secs(5));
    }
}
