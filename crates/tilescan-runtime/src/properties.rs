use serde::{Deserialize, Serialize};

/// Properties of a compute device that kernels have to respect.
#[derive(new, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProperties {
    /// Human readable name of the device.
    pub name: String,
    /// The maximum number of units in a single work-group.
    pub max_group_size: u32,
    /// The maximum amount of shared memory per work-group, in bytes.
    pub max_shared_memory_size: usize,
    /// The maximum number of bytes a single buffer can hold.
    pub max_buffer_size: usize,
}

impl DeviceProperties {
    /// Properties of the host backend when nothing else is configured.
    pub fn host() -> Self {
        Self {
            name: "host".into(),
            max_group_size: 1024,
            max_shared_memory_size: 48 * 1024,
            max_buffer_size: 1024 * 1024 * 1024,
        }
    }
}

/// Memory accounting of a compute server.
///
/// `allocations - releases == buffers` holds at all times on a well-behaved server.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Buffers currently alive.
    pub buffers: usize,
    /// Bytes currently reserved by live buffers.
    pub bytes_in_use: usize,
    /// Total number of successful allocations since the server was created.
    pub allocations: u64,
    /// Total number of releases since the server was created.
    pub releases: u64,
}

impl core::fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "{} buffers ({} bytes) alive, {} allocated, {} released",
            self.buffers, self.bytes_in_use, self.allocations, self.releases
        ))
    }
}
