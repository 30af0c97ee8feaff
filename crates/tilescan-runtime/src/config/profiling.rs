use super::logger::{LogLevel, LoggerConfig};

/// Configuration for profiling kernel launches.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ProfilingConfig {
    /// Logger configuration for profiling logs.
    #[serde(default)]
    pub logger: LoggerConfig<ProfilingLogLevel>,
}

/// Log levels for profiling.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProfilingLogLevel {
    /// Profiling is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Only a summary table is logged when requested.
    #[serde(rename = "basic")]
    Basic,

    /// Every launch is logged with its duration.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for ProfilingLogLevel {}
