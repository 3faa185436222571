use log::LevelFilter;
use simplelog::*;
use std::fs::File;
use std::path::PathBuf;

/// Logging configuration for the revue client
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Master switch to enable/disable all logging
    pub enabled: bool,
    pub log_file: PathBuf,
    pub clear_on_startup: bool,
    pub features: LogFeatures,
    pub level: LevelFilter,
}

/// Feature flags for specific logging categories
#[derive(Debug, Clone)]
pub struct LogFeatures {
    /// Procedure calls and their failures
    pub api_calls: bool,
    /// Feed refresh, pagination and discarded results
    pub feed: bool,
    /// Post wizard steps and submissions
    pub composer: bool,
    /// Refresh events published and consumed
    pub refresh: bool,
    /// Command dispatch and local session handling
    pub general: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: PathBuf::from("revue_debug.log"),
            clear_on_startup: true,
            features: LogFeatures::default(),
            level: LevelFilter::Debug,
        }
    }
}

impl Default for LogFeatures {
    fn default() -> Self {
        Self::all(true)
    }
}

impl LogFeatures {
    fn all(enabled: bool) -> Self {
        Self {
            api_calls: enabled,
            feed: enabled,
            composer: enabled,
            refresh: enabled,
            general: enabled,
        }
    }
}

impl LogConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Only errors and warnings
    pub fn minimal() -> Self {
        Self {
            enabled: true,
            level: LevelFilter::Warn,
            features: LogFeatures::all(false),
            ..Default::default()
        }
    }

    pub fn verbose() -> Self {
        Self {
            enabled: true,
            level: LevelFilter::Trace,
            features: LogFeatures::all(true),
            ..Default::default()
        }
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    if !config.enabled {
        let _ = WriteLogger::init(LevelFilter::Off, Config::default(), std::io::sink());
        return Ok(());
    }

    if config.clear_on_startup {
        let _ = File::create(&config.log_file)?;
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_time_offset_to_local()
        .unwrap_or_else(|builder| builder)
        .build();

    WriteLogger::init(config.level, log_config, log_file)?;

    log::info!(
        "Logging initialized: file={}, level={:?}",
        config.log_file.display(),
        config.level
    );
    log::debug!("Log features: {:?}", config.features);

    Ok(())
}

/// Macro for logging procedure calls
#[macro_export]
macro_rules! log_api_call {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.api_calls {
            log::debug!(target: "api_calls", $($arg)*);
        }
    };
}

/// Macro for logging feed activity
#[macro_export]
macro_rules! log_feed {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.feed {
            log::debug!(target: "feed", $($arg)*);
        }
    };
}

/// Macro for logging the post wizard
#[macro_export]
macro_rules! log_composer {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.composer {
            log::debug!(target: "composer", $($arg)*);
        }
    };
}

/// Macro for logging refresh events
#[macro_export]
macro_rules! log_refresh {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.refresh {
            log::debug!(target: "refresh", $($arg)*);
        }
    };
}

/// Macro for general debug logging
#[macro_export]
macro_rules! log_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.general {
            log::debug!(target: "general", $($arg)*);
        }
    };
}
