use super::logger::{BinaryLogLevel, LoggerConfig};

/// Configuration for the compilation logs.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompilationConfig {
    /// Where the program text and the selected entries are logged.
    #[serde(default)]
    pub logger: LoggerConfig<CompilationLogLevel>,
}

/// Compilation logs are either on or off.
pub type CompilationLogLevel = BinaryLogLevel;
