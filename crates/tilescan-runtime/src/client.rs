use crate::{
    DeviceProperties, KernelId, MemoryUsage,
    logging::ServerLogger,
    server::{
        AllocationDescriptor, AllocationError, BufferFlags, CompilationError, ComputeServer,
        Handle, IoError, KernelArg, LaunchError, LaunchGeometry, ServerError,
    },
};
use bytemuck::Pod;
use hashbrown::HashMap;
use spin::Mutex;
use std::sync::Arc;
use web_time::{Duration, Instant};

/// The ComputeClient is the entry point to require tasks from the ComputeServer.
///
/// The client locks the server on every operation, cloning it is cheap and every clone talks to
/// the same server. The lock is a spin lock held for the whole operation, a launch included: on a
/// server executing kernels inline, like the host backend, other clones spin until the kernel
/// returns. Launches of independent scans are therefore serialized, only their host-side work
/// overlaps.
#[derive(Debug)]
pub struct ComputeClient<Server: ComputeServer> {
    server: Arc<Mutex<Server>>,
    logger: Arc<Mutex<ServerLogger>>,
    kernels: Arc<Mutex<HashMap<KernelId, String>>>,
    properties: Arc<DeviceProperties>,
}

impl<S: ComputeServer> Clone for ComputeClient<S> {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
            logger: self.logger.clone(),
            kernels: self.kernels.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl<Server: ComputeServer> ComputeClient<Server> {
    /// Create a new client with a logger built from the global configuration.
    pub fn new(server: Server) -> Self {
        Self::with_logger(server, ServerLogger::default())
    }

    /// Create a new client with the given logger.
    pub fn with_logger(server: Server, logger: ServerLogger) -> Self {
        let properties = Arc::new(server.properties().clone());

        Self {
            server: Arc::new(Mutex::new(server)),
            logger: Arc::new(Mutex::new(logger)),
            kernels: Arc::new(Mutex::new(HashMap::new())),
            properties,
        }
    }

    /// Get the properties of the device.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Reserves a buffer described by the descriptor.
    pub fn create(&self, descriptor: AllocationDescriptor<'_>) -> Result<Handle, AllocationError> {
        self.server.lock().create(descriptor)
    }

    /// Reserves a buffer initialized with a copy of the given slice.
    pub fn create_from_slice<T: Pod>(
        &self,
        data: &[T],
        flags: BufferFlags,
    ) -> Result<Handle, AllocationError> {
        let bytes = bytemuck::cast_slice::<T, u8>(data);
        self.create(AllocationDescriptor::from_bytes(bytes, flags))
    }

    /// Reserves a zero-filled buffer of `size` bytes.
    pub fn empty(&self, size: usize, flags: BufferFlags) -> Result<Handle, AllocationError> {
        self.create(AllocationDescriptor::zeroed(size, flags))
    }

    /// Releases the buffer owned by the handle.
    pub fn release(&self, handle: Handle) -> Result<(), ServerError> {
        self.server.lock().release(handle)
    }

    /// Builds the program text for the given entry.
    pub fn compile(&self, source: &str, entry: &str) -> Result<KernelId, CompilationError> {
        {
            let mut logger = self.logger.lock();
            if logger.compilation_activated() {
                logger.log_compilation(format!("[Compiling `{entry}`]\n{source}"));
            }
        }

        let kernel = self.server.lock().compile(source, entry)?;
        self.kernels.lock().insert(kernel, entry.to_string());
        log::debug!("Compiled kernel `{entry}` as {kernel}");

        Ok(kernel)
    }

    /// Releases a compiled kernel.
    pub fn release_kernel(&self, kernel: KernelId) -> Result<(), ServerError> {
        self.kernels.lock().remove(&kernel);
        self.server.lock().release_kernel(kernel)
    }

    /// The entry name a kernel was compiled from.
    pub fn kernel_name(&self, kernel: KernelId) -> Option<String> {
        self.kernels.lock().get(&kernel).cloned()
    }

    /// Binds an argument to the parameter at `index` of the kernel.
    pub fn bind(&self, kernel: KernelId, index: u32, arg: KernelArg) -> Result<(), LaunchError> {
        self.server.lock().bind(kernel, index, arg)
    }

    /// Binds all arguments in order, starting at parameter `0`.
    pub fn bind_all(&self, kernel: KernelId, args: &[KernelArg]) -> Result<(), LaunchError> {
        let mut server = self.server.lock();
        for (index, arg) in args.iter().enumerate() {
            server.bind(kernel, index as u32, *arg)?;
        }
        Ok(())
    }

    /// Launches the kernel with its current bindings.
    ///
    /// The server stays locked until it returns. When profiling is activated the launch is
    /// synchronized and its duration registered.
    pub fn launch(&self, kernel: KernelId, geometry: LaunchGeometry) -> Result<(), LaunchError> {
        let profiled = self.logger.lock().profile_level().is_some();

        if !profiled {
            return self.server.lock().launch(kernel, geometry);
        }

        let mut server = self.server.lock();
        sync_for_profiling(&mut *server)?;
        let start = Instant::now();
        server.launch(kernel, geometry)?;
        sync_for_profiling(&mut *server)?;
        let duration = start.elapsed();
        core::mem::drop(server);

        let name = self
            .kernel_name(kernel)
            .unwrap_or_else(|| kernel.to_string());
        self.logger.lock().register_profiled(
            format!("{name} (global={}, local={})", geometry.global, geometry.local),
            duration,
        );

        Ok(())
    }

    /// Copies the whole buffer into host memory.
    pub fn read(&self, handle: &Handle) -> Result<Vec<u8>, IoError> {
        self.server.lock().read(handle)
    }

    /// Copies the whole buffer into host memory as elements of type `T`.
    pub fn read_one<T: Pod>(&self, handle: &Handle) -> Result<Vec<T>, IoError> {
        let bytes = self.read(handle)?;
        Ok(bytes
            .chunks_exact(core::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Overwrites the whole buffer with the given slice.
    pub fn write<T: Pod>(&self, handle: &Handle, data: &[T]) -> Result<(), IoError> {
        self.server
            .lock()
            .write(handle, bytemuck::cast_slice::<T, u8>(data))
    }

    /// Waits for all submitted work to complete.
    pub fn sync(&self) -> Result<(), ServerError> {
        self.server.lock().sync()
    }

    /// The current memory accounting of the server.
    pub fn memory_usage(&self) -> MemoryUsage {
        self.server.lock().memory_usage()
    }

    /// Measures the execution time of `func`, synchronizing the server before and after.
    pub fn profile<O, F>(&self, func: F) -> Result<(O, Duration), ServerError>
    where
        F: FnOnce() -> O,
    {
        self.sync()?;
        let start = Instant::now();
        let out = func();
        self.sync()?;

        Ok((out, start.elapsed()))
    }

    /// Logs the profiling summary if activated and resets it.
    pub fn profile_summary(&self) {
        self.logger.lock().profile_summary();
    }
}

fn sync_for_profiling<S: ComputeServer>(server: &mut S) -> Result<(), LaunchError> {
    server.sync().map_err(|err| LaunchError::Unknown {
        reason: format!("Can't synchronize the server for profiling: {err}"),
        backtrace: crate::BackTrace::capture(),
    })
}
