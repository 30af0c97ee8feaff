use hashbrown::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tilescan::register_scan_kernels;
use tilescan_runtime::{
    BackTrace, DeviceProperties, KernelId, MemoryUsage,
    client::ComputeClient,
    config::host::HostConfig,
    host::HostServer,
    server::{
        AllocationDescriptor, AllocationError, CompilationError, ComputeServer, Handle, IoError,
        KernelArg, LaunchError, LaunchGeometry, ServerError,
    },
};

/// A failure injected by the [FaultyServer].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The allocation with this index, counted from zero, fails.
    Allocation(u64),
    /// Every launch of this entry fails.
    Launch(&'static str),
    /// Every read fails.
    Read,
}

/// A host server that fails on demand and counts its live kernels.
#[derive(Debug)]
pub struct FaultyServer {
    inner: HostServer,
    fault: Option<Fault>,
    entries: HashMap<KernelId, String>,
    live_kernels: Arc<AtomicUsize>,
    attempts: u64,
}

impl FaultyServer {
    pub fn new(fault: Option<Fault>, live_kernels: Arc<AtomicUsize>) -> Self {
        let inner = HostServer::new(DeviceProperties::host(), &HostConfig { workers: 2 });

        Self {
            inner: register_scan_kernels(inner),
            fault,
            entries: HashMap::new(),
            live_kernels,
            attempts: 0,
        }
    }
}

/// A client of a [FaultyServer] and the number of kernels it holds.
pub fn faulty_client(fault: Option<Fault>) -> (ComputeClient<FaultyServer>, Arc<AtomicUsize>) {
    let live_kernels = Arc::new(AtomicUsize::new(0));
    let server = FaultyServer::new(fault, live_kernels.clone());

    (ComputeClient::new(server), live_kernels)
}

impl ComputeServer for FaultyServer {
    fn properties(&self) -> &DeviceProperties {
        self.inner.properties()
    }

    fn create(&mut self, descriptor: AllocationDescriptor<'_>) -> Result<Handle, AllocationError> {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.fault == Some(Fault::Allocation(attempt)) {
            return Err(AllocationError::Unknown {
                reason: format!("Injected failure of allocation {attempt}"),
                backtrace: BackTrace::capture(),
            });
        }

        self.inner.create(descriptor)
    }

    fn release(&mut self, handle: Handle) -> Result<(), ServerError> {
        self.inner.release(handle)
    }

    fn compile(&mut self, source: &str, entry: &str) -> Result<KernelId, CompilationError> {
        let kernel = self.inner.compile(source, entry)?;
        self.entries.insert(kernel, entry.to_string());
        self.live_kernels.fetch_add(1, Ordering::Relaxed);
        Ok(kernel)
    }

    fn release_kernel(&mut self, kernel: KernelId) -> Result<(), ServerError> {
        if self.entries.remove(&kernel).is_some() {
            self.live_kernels.fetch_sub(1, Ordering::Relaxed);
        }
        self.inner.release_kernel(kernel)
    }

    fn bind(&mut self, kernel: KernelId, index: u32, arg: KernelArg) -> Result<(), LaunchError> {
        self.inner.bind(kernel, index, arg)
    }

    fn launch(&mut self, kernel: KernelId, geometry: LaunchGeometry) -> Result<(), LaunchError> {
        if let (Some(Fault::Launch(failing)), Some(entry)) = (self.fault, self.entries.get(&kernel))
        {
            if entry == failing {
                return Err(LaunchError::Unknown {
                    reason: format!("Injected failure of `{entry}`"),
                    backtrace: BackTrace::capture(),
                });
            }
        }

        self.inner.launch(kernel, geometry)
    }

    fn read(&mut self, handle: &Handle) -> Result<Vec<u8>, IoError> {
        if self.fault == Some(Fault::Read) {
            return Err(IoError::Unknown {
                reason: "Injected read failure".into(),
                backtrace: BackTrace::capture(),
            });
        }

        self.inner.read(handle)
    }

    fn write(&mut self, handle: &Handle, data: &[u8]) -> Result<(), IoError> {
        self.inner.write(handle, data)
    }

    fn sync(&mut self) -> Result<(), ServerError> {
        self.inner.sync()
    }

    fn memory_usage(&self) -> MemoryUsage {
        self.inner.memory_usage()
    }
}
