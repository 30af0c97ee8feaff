/// Configuration for the host backend.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HostConfig {
    /// The number of worker threads executing work-groups.
    ///
    /// `0` means one worker per available core.
    #[serde(default)]
    pub workers: usize,
}

impl HostConfig {
    /// The effective number of worker threads.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }

        std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1)
    }
}
