use super::GlobalConfig;
use super::{compilation::CompilationLogLevel, profiling::ProfilingLogLevel};
use core::fmt::Display;
use hashbrown::HashMap;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

/// Configuration for logging, parameterized by a log level type.
///
/// Note that you can use multiple loggers at the same time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or overwrite it (false). Defaults to true.
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Optional crate-level logging configuration (e.g., info, debug, trace).
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// The log level for this logger, determining verbosity.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            file: None,
            append: true,
            stdout: false,
            stderr: false,
            log: None,
            level: L::default(),
        }
    }
}

/// Log levels using the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Trait for types that can be used as log levels in `LoggerConfig`.
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
}

/// Binary log level for enabling or disabling logging.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryLogLevel {
    /// Logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Logging is fully enabled.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for BinaryLogLevel {}

/// Central logging utility, managing multiple log outputs.
#[derive(Debug)]
pub struct Logger {
    /// Collection of logger instances (file, stdout, stderr, or crate-level).
    loggers: Vec<LoggerKind>,

    /// Indices of loggers used for compilation logging.
    compilation_index: Vec<usize>,

    /// Indices of loggers used for profiling logging.
    profiling_index: Vec<usize>,

    /// Global configuration for logging settings.
    pub config: Arc<GlobalConfig>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Hash, PartialEq, Eq)]
enum LoggerId {
    File(PathBuf),
    Stdout,
    Stderr,
    LogCrate(LogCrateLevel),
}

impl Logger {
    /// Creates a new `Logger` instance based on the global configuration.
    ///
    /// Note that creating a logger opens the configured files.
    pub fn new() -> Self {
        Self::from_config(GlobalConfig::get())
    }

    /// Creates a new `Logger` for the given configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        let mut loggers = Vec::new();
        let mut compilation_index = Vec::new();
        let mut profiling_index = Vec::new();
        let mut logger2index = HashMap::<LoggerId, usize>::new();

        if config.compilation.logger.level != CompilationLogLevel::Disabled {
            register_logger(
                &config.compilation.logger,
                &mut compilation_index,
                &mut loggers,
                &mut logger2index,
            );
        }

        if config.profiling.logger.level != ProfilingLogLevel::Disabled {
            register_logger(
                &config.profiling.logger,
                &mut profiling_index,
                &mut loggers,
                &mut logger2index,
            );
        }

        Self {
            loggers,
            compilation_index,
            profiling_index,
            config,
        }
    }

    /// Logs a message for compilation, directing it to all configured compilation loggers.
    pub fn log_compilation<S: Display>(&mut self, msg: &S) {
        for i in 0..self.compilation_index.len() {
            let index = self.compilation_index[i];
            self.loggers[index].log(msg);
        }
    }

    /// Logs a message for profiling, directing it to all configured profiling loggers.
    pub fn log_profiling<S: Display>(&mut self, msg: &S) {
        for i in 0..self.profiling_index.len() {
            let index = self.profiling_index[i];
            self.loggers[index].log(msg);
        }
    }

    /// Returns the current compilation log level from the global configuration.
    pub fn log_level_compilation(&self) -> CompilationLogLevel {
        self.config.compilation.logger.level
    }

    /// Returns the current profiling log level from the global configuration.
    pub fn log_level_profiling(&self) -> ProfilingLogLevel {
        self.config.profiling.logger.level
    }
}

fn register_logger<L: LogLevel>(
    kind: &LoggerConfig<L>,
    setting_index: &mut Vec<usize>,
    loggers: &mut Vec<LoggerKind>,
    logger2index: &mut HashMap<LoggerId, usize>,
) {
    let mut register = |id: LoggerId, create: &dyn Fn() -> Option<LoggerKind>| {
        if let Some(index) = logger2index.get(&id) {
            setting_index.push(*index);
        } else if let Some(logger) = create() {
            let index = loggers.len();
            logger2index.insert(id, index);
            loggers.push(logger);
            setting_index.push(index);
        }
    };

    if let Some(file) = &kind.file {
        register(LoggerId::File(file.clone()), &|| {
            FileLogger::new(file, kind.append).map(LoggerKind::File)
        });
    }

    if kind.stdout {
        register(LoggerId::Stdout, &|| Some(LoggerKind::Stdout));
    }

    if kind.stderr {
        register(LoggerId::Stderr, &|| Some(LoggerKind::Stderr));
    }

    if let Some(level) = kind.log {
        register(LoggerId::LogCrate(level), &|| Some(LoggerKind::Log(level)));
    }
}

/// Represents different types of loggers.
#[derive(Debug)]
enum LoggerKind {
    /// Logs to a file.
    File(FileLogger),

    /// Logs to standard output.
    Stdout,

    /// Logs to standard error.
    Stderr,

    /// Logs using the `log` crate with a specified level.
    Log(LogCrateLevel),
}

impl LoggerKind {
    fn log<S: Display>(&mut self, msg: &S) {
        match self {
            LoggerKind::File(file_logger) => file_logger.log(msg),
            LoggerKind::Stdout => println!("{msg}"),
            LoggerKind::Stderr => eprintln!("{msg}"),
            LoggerKind::Log(level) => match level {
                LogCrateLevel::Info => log::info!("{msg}"),
                LogCrateLevel::Debug => log::debug!("{msg}"),
                LogCrateLevel::Trace => log::trace!("{msg}"),
            },
        }
    }
}

/// Logger that writes messages to a file.
#[derive(Debug)]
struct FileLogger {
    writer: BufWriter<File>,
}

impl FileLogger {
    // Opens the file, a logger that can't be opened is skipped with a warning.
    fn new(path: &PathBuf, append: bool) -> Option<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path);

        match file {
            Ok(file) => Some(Self {
                writer: BufWriter::new(file),
            }),
            Err(err) => {
                log::warn!("Can't open log file {}: {err}", path.display());
                None
            }
        }
    }

    // Logs a message to the file, flushing the buffer to ensure immediate write.
    fn log<S: Display>(&mut self, msg: &S) {
        if let Err(err) = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush()) {
            log::warn!("Can't write to log file: {err}");
        }
    }
}
