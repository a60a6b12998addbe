use crate::config::{Config, RustEnv};
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ColorChoice, ConfigBuilder, TerminalMode};

/// Dependencies whose logs are suppressed unless running at Trace level.
const FILTERED_MODULES: &[&str] = &[
    "sqlx",
    "sea_orm",
    "tower",
    "tower_sessions",
    "tracing",
    "hyper",
    "h2",
    "reqwest",
    "axum",
];

/// How the terminal logger is set up for one process.
#[derive(Debug, Clone, PartialEq)]
struct LogSettings {
    level: LevelFilter,
    filter_dependencies: bool,
    color: ColorChoice,
}

impl LogSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            level: config.log_level_filter,
            filter_dependencies: config.log_level_filter != LevelFilter::Trace,
            // Deployed logs end up in an aggregator that does not understand ANSI escapes.
            color: match config.runtime_env() {
                RustEnv::Development => ColorChoice::Auto,
                RustEnv::Production | RustEnv::Staging => ColorChoice::Never,
            },
        }
    }

    fn build(&self) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        builder.set_target_level(LevelFilter::Error);

        if self.filter_dependencies {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger. Fails if a logger is already set.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let settings = LogSettings::from_config(config);

        simplelog::TermLogger::init(
            settings.level,
            settings.build(),
            TerminalMode::Mixed,
            settings.color,
        )
    }
}
