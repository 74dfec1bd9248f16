//! Logging setup with indicatif integration

use indicatif::MultiProgress;

/// Dependencies that are chatty at debug level
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "native_tls"];

fn level_label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn level_color(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Logger that prints through indicatif MultiProgress so lines never tear
/// the per-file status spinners.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.matches(record) {
            return;
        }
        let level = record.level();
        let line = format!(
            "[{}{}\x1b[0m] {}",
            level_color(level),
            level_label(level),
            record.args()
        );
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn builder(quiet: bool, debug: bool) -> env_logger::Builder {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if debug {
        for target in NOISY_TARGETS {
            builder.filter_module(target, log::LevelFilter::Info);
        }
    }
    builder
}

/// Initialize logging.
///
/// `RUST_LOG` overrides the level picked from `quiet`/`debug`. With a
/// `MultiProgress` (TTY mode) records are colored and routed through the
/// bars; otherwise they go to stderr with a UTC timestamp and no ANSI codes.
/// Calling this twice is harmless: the second call is ignored.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let mut builder = builder(quiet, debug);

    if let Some(multi) = multi {
        let logger = builder.build();
        let max_level = logger.filter();
        if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok() {
            log::set_max_level(max_level);
        }
    } else {
        let _ = builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}",
                    buf.timestamp_seconds(),
                    level_label(record.level()),
                    record.args()
                )
            })
            .try_init();
    }
}
