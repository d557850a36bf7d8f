use log::LevelFilter;

/// Output level, -1 (quiet) through 2 (extra debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = -1,
    Normal = 0,
    Debug = 1,
    Extra = 2,
}

impl Verbosity {
    /// Out-of-range levels are clamped
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=-1 => Verbosity::Quiet,
            0 => Verbosity::Normal,
            1 => Verbosity::Debug,
            _ => Verbosity::Extra,
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Error,
            Verbosity::Normal => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
            Verbosity::Extra => LevelFilter::Trace,
        }
    }
}

/// Change the global log level at runtime
pub fn set_verbosity(verbosity: Verbosity) {
    log::set_max_level(verbosity.level_filter());
}

/// Initialise `env_logger`. `RUST_LOG` wins when present; otherwise the
/// logger accepts everything and `verbosity` gates through the max level so
/// `set_verbosity` can raise it later.
pub fn init_logger(verbosity: Verbosity) {
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
        return;
    }
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .format_timestamp(None)
        .init();
    set_verbosity(verbosity);
}
