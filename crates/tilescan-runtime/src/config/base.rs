use super::{compilation::CompilationConfig, host::HostConfig, profiling::ProfilingConfig};
use std::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static TILESCAN_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Represents the global configuration, combining compilation, profiling and host settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Configuration for compilation logs.
    #[serde(default)]
    pub compilation: CompilationConfig,

    /// Configuration for profiling kernel launches.
    #[serde(default)]
    pub profiling: ProfilingConfig,

    /// Configuration for the host backend.
    #[serde(default)]
    pub host: HostConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `tilescan.toml` or `TileScan.toml`
    /// in the current directory or its parents. If no file is found, a default configuration is
    /// used. Environment variables are applied on top, see [Self::override_from_env].
    ///
    /// # Notes
    ///
    /// Calling this function takes a global lock. Read the values you need once, during
    /// initialization, instead of calling it on hot paths.
    pub fn get() -> Arc<Self> {
        let mut state = TILESCAN_GLOBAL_CONFIG.lock();
        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                let config = Arc::new(Self::from_current_dir().override_from_env());
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = TILESCAN_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Overrides configuration fields based on environment variables.
    ///
    /// - `TILESCAN_DEBUG_LOG`: `stdout`, `stderr`, `1`/`true` (file in the temp dir),
    ///   `0`/`false` (disable) or a file path. Enables compilation and full profiling logs.
    /// - `TILESCAN_DEBUG_OPTION`: `debug` or `profile`.
    /// - `TILESCAN_HOST_WORKERS`: number of host worker threads.
    pub fn override_from_env(self) -> Self {
        self.override_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn override_from<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        use super::{compilation::CompilationLogLevel, profiling::ProfilingLogLevel};

        if let Some(val) = var("TILESCAN_DEBUG_LOG") {
            self.compilation.logger.level = CompilationLogLevel::Full;
            self.profiling.logger.level = ProfilingLogLevel::Full;

            match val.as_str() {
                "stdout" => {
                    self.compilation.logger.stdout = true;
                    self.profiling.logger.stdout = true;
                }
                "stderr" => {
                    self.compilation.logger.stderr = true;
                    self.profiling.logger.stderr = true;
                }
                "1" | "true" => {
                    let file_path = std::env::temp_dir().join("tilescan.log");
                    self.compilation.logger.file = Some(file_path.clone());
                    self.profiling.logger.file = Some(file_path);
                }
                "0" | "false" => {
                    self.compilation.logger.level = CompilationLogLevel::Disabled;
                    self.profiling.logger.level = ProfilingLogLevel::Disabled;
                }
                file_path => {
                    self.compilation.logger.file = Some(file_path.into());
                    self.profiling.logger.file = Some(file_path.into());
                }
            }
        };

        if let Some(val) = var("TILESCAN_DEBUG_OPTION") {
            match val.as_str() {
                "debug" => {
                    self.compilation.logger.level = CompilationLogLevel::Full;
                    self.profiling.logger.level = ProfilingLogLevel::Full;
                }
                "profile" => {
                    self.profiling.logger.level = ProfilingLogLevel::Basic;
                }
                _ => {}
            }
        };

        if let Some(val) = var("TILESCAN_HOST_WORKERS") {
            match val.parse::<usize>() {
                Ok(workers) => self.host.workers = workers,
                Err(err) => log::warn!("Ignoring TILESCAN_HOST_WORKERS={val}: {err}"),
            }
        }

        self
    }

    // Loads configuration from `tilescan.toml` or `TileScan.toml` in the current directory or its
    // parents.
    fn from_current_dir() -> Self {
        let mut dir = match std::env::current_dir() {
            Ok(dir) => dir,
            Err(_) => return Self::default(),
        };

        loop {
            if let Ok(content) = Self::from_file_path(dir.join("tilescan.toml")) {
                return content;
            }

            if let Ok(content) = Self::from_file_path(dir.join("TileScan.toml")) {
                return content;
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    /// Loads configuration from a specified file path.
    ///
    /// # Panics
    /// Panics if the file exists but doesn't have the right format.
    pub fn from_file_path<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&content))
    }

    fn from_toml(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(val) => val,
            Err(err) => panic!("The file provided doesn't have the right format => {err:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{compilation::CompilationLogLevel, profiling::ProfilingLogLevel};

    #[test]
    fn parses_partial_toml() {
        let config = GlobalConfig::from_toml(
            r#"
            [host]
            workers = 3

            [profiling.logger]
            level = "basic"
            stderr = true
            "#,
        );

        assert_eq!(config.host.workers, 3);
        assert_eq!(config.host.worker_count(), 3);
        assert_eq!(config.profiling.logger.level, ProfilingLogLevel::Basic);
        assert!(config.profiling.logger.stderr);
        assert!(matches!(
            config.compilation.logger.level,
            CompilationLogLevel::Disabled
        ));
    }

    #[test]
    fn env_overrides_debug_log() {
        let config = GlobalConfig::default().override_from(|key| match key {
            "TILESCAN_DEBUG_LOG" => Some("stdout".into()),
            "TILESCAN_HOST_WORKERS" => Some("2".into()),
            _ => None,
        });

        assert!(config.compilation.logger.stdout);
        assert!(config.profiling.logger.stdout);
        assert_eq!(config.profiling.logger.level, ProfilingLogLevel::Full);
        assert_eq!(config.host.workers, 2);
    }

    #[test]
    fn env_can_disable_logs() {
        let config = GlobalConfig::default().override_from(|key| match key {
            "TILESCAN_DEBUG_LOG" => Some("0".into()),
            _ => None,
        });

        assert!(matches!(
            config.compilation.logger.level,
            CompilationLogLevel::Disabled
        ));
        assert_eq!(config.profiling.logger.level, ProfilingLogLevel::Disabled);
    }

    #[test]
    fn invalid_worker_count_is_ignored() {
        let config = GlobalConfig::default().override_from(|key| match key {
            "TILESCAN_HOST_WORKERS" => Some("many".into()),
            _ => None,
        });

        assert_eq!(config.host.workers, 0);
    }
}
