use core::fmt::Display;
use std::sync::Arc;

use super::Profiled;
use crate::config::{
    GlobalConfig, Logger, compilation::CompilationLogLevel, profiling::ProfilingLogLevel,
};

/// Server logger.
///
/// Routes compilation logs and launch durations to the sinks of the [global config](GlobalConfig).
#[derive(Debug, Default)]
pub struct ServerLogger {
    kind: DebugLoggerKind,
    profiled: Profiled,
}

/// The various logging options available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerLoggerOptions {
    /// Debug only the compilation.
    CompilationOnly,
    /// Profile each kernel executed.
    ProfileOnly(ProfilingLogLevel),
    /// Enable all options.
    All(ProfilingLogLevel),
}

/// Debugging logger.
#[derive(Debug)]
enum DebugLoggerKind {
    /// Activated logger.
    Activated(Logger, ServerLoggerOptions),
    /// Don't log information.
    None,
}

impl Default for DebugLoggerKind {
    fn default() -> Self {
        Self::new(GlobalConfig::get())
    }
}

impl ServerLogger {
    /// Creates a server logger for the given configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        Self {
            kind: DebugLoggerKind::new(config),
            profiled: Profiled::default(),
        }
    }

    /// Returns the profile level, none if profiling is deactivated.
    pub fn profile_level(&self) -> Option<ProfilingLogLevel> {
        self.kind.profile_level()
    }

    /// Returns true if compilation info should be logged.
    pub fn compilation_activated(&self) -> bool {
        match &self.kind {
            DebugLoggerKind::Activated(_, options) => match options {
                ServerLoggerOptions::CompilationOnly => true,
                ServerLoggerOptions::All(..) => true,
                ServerLoggerOptions::ProfileOnly(..) => false,
            },
            DebugLoggerKind::None => false,
        }
    }

    /// Register a profiled task.
    pub fn register_profiled<Name>(&mut self, name: Name, duration: core::time::Duration)
    where
        Name: Display,
    {
        let name = name.to_string();
        self.profiled.update(&name, duration);

        if let Some(ProfilingLogLevel::Full) = self.kind.profile_level() {
            self.kind.register_profiled(name, duration);
        }
    }

    /// Log the argument when the compilation logger is activated.
    pub fn log_compilation<I>(&mut self, arg: I) -> I
    where
        I: Display,
    {
        self.kind.log_compilation(arg)
    }

    /// Show the profiling summary if activated and reset its state.
    pub fn profile_summary(&mut self) {
        if self.profile_level().is_some() {
            let profiled = core::mem::take(&mut self.profiled);

            if let DebugLoggerKind::Activated(logger, _) = &mut self.kind {
                if !profiled.is_empty() {
                    logger.log_profiling(&profiled);
                }
            }
        }
    }
}

impl DebugLoggerKind {
    fn new(config: Arc<GlobalConfig>) -> Self {
        let profile = match config.profiling.logger.level {
            ProfilingLogLevel::Disabled => None,
            level => Some(level),
        };

        let option = match profile {
            Some(level) => match config.compilation.logger.level {
                CompilationLogLevel::Full => ServerLoggerOptions::All(level),
                CompilationLogLevel::Disabled => ServerLoggerOptions::ProfileOnly(level),
            },
            None => {
                if let CompilationLogLevel::Disabled = config.compilation.logger.level {
                    return Self::None;
                }

                ServerLoggerOptions::CompilationOnly
            }
        };

        Self::Activated(Logger::from_config(config), option)
    }

    /// Returns the profile level, none if profiling is deactivated.
    fn profile_level(&self) -> Option<ProfilingLogLevel> {
        match self {
            DebugLoggerKind::Activated(_, option) => match option {
                ServerLoggerOptions::CompilationOnly => None,
                ServerLoggerOptions::ProfileOnly(level) => Some(*level),
                ServerLoggerOptions::All(level) => Some(*level),
            },
            DebugLoggerKind::None => None,
        }
    }

    fn register_profiled(&mut self, name: String, duration: core::time::Duration) {
        if let DebugLoggerKind::Activated(logger, _) = self {
            logger.log_profiling(&format!("| {duration:<10?} | {name}"));
        }
    }

    fn log_compilation<I>(&mut self, arg: I) -> I
    where
        I: Display,
    {
        if let DebugLoggerKind::Activated(logger, option) = self {
            match option {
                ServerLoggerOptions::CompilationOnly | ServerLoggerOptions::All(_) => {
                    logger.log_compilation(&arg);
                }
                ServerLoggerOptions::ProfileOnly(_) => (),
            }
        }
        arg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_disables_everything() {
        let logger = ServerLogger::from_config(Arc::new(GlobalConfig::default()));

        assert!(!logger.compilation_activated());
        assert_eq!(logger.profile_level(), None);
    }

    #[test]
    fn profiling_without_compilation() {
        let mut config = GlobalConfig::default();
        config.profiling.logger.level = ProfilingLogLevel::Basic;

        let mut logger = ServerLogger::from_config(Arc::new(config));
        logger.register_profiled("scan_tiles", core::time::Duration::from_micros(12));

        assert!(!logger.compilation_activated());
        assert_eq!(logger.profile_level(), Some(ProfilingLogLevel::Basic));
        assert!(!logger.profiled.is_empty());

        logger.profile_summary();
        assert!(logger.profiled.is_empty());
    }
}
