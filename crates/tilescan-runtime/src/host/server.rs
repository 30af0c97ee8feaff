use super::{
    DeviceMemory, HostKernel, KernelSignature, Program, WorkGroup, kernel::ResolvedArg,
    scheduler::run_groups,
};
use crate::{
    BackTrace, BufferId, DeviceProperties, KernelId, MemoryUsage,
    config::{GlobalConfig, host::HostConfig},
    server::{
        AllocationDescriptor, AllocationError, BufferFlags, CompilationError, ComputeServer,
        Handle, IoError, KernelArg, LaunchError, LaunchGeometry, ServerError,
    },
    validation::{validate_geometry, validate_shared_memory},
};
use hashbrown::HashMap;
use std::sync::Arc;

/// A compute server executing kernels on the host.
///
/// Program texts are parsed for their `__kernel` declarations, and every compiled entry must have
/// a registered [host kernel](HostKernel) with the same parameters. Work-groups of a launch are
/// spread over a pool of scoped worker threads. A launch returns once every group completed, so
/// [sync](ComputeServer::sync) has nothing to wait for.
#[derive(Debug)]
pub struct HostServer {
    properties: DeviceProperties,
    memory: HashMap<BufferId, DeviceMemory>,
    registry: HashMap<String, Arc<dyn HostKernel>>,
    kernels: HashMap<KernelId, CompiledKernel>,
    usage: MemoryUsage,
    workers: usize,
    memory_limit: Option<usize>,
}

#[derive(Debug)]
struct CompiledKernel {
    kernel: Arc<dyn HostKernel>,
    signature: KernelSignature,
    args: Vec<Option<KernelArg>>,
}

impl Default for HostServer {
    fn default() -> Self {
        Self::new(DeviceProperties::host(), &GlobalConfig::get().host)
    }
}

impl HostServer {
    /// Creates a server without any registered kernel.
    pub fn new(properties: DeviceProperties, config: &HostConfig) -> Self {
        let workers = config.worker_count();
        log::debug!(
            "Host server `{}` with {workers} workers, max group size {}",
            properties.name,
            properties.max_group_size
        );

        Self {
            properties,
            memory: HashMap::new(),
            registry: HashMap::new(),
            kernels: HashMap::new(),
            usage: MemoryUsage::default(),
            workers,
            memory_limit: None,
        }
    }

    /// Registers the native implementation of a kernel entry, replacing any previous one.
    pub fn register<K: HostKernel>(&mut self, kernel: K) {
        let entry = kernel.entry().to_string();
        if self.registry.insert(entry.clone(), Arc::new(kernel)).is_some() {
            log::warn!("Host kernel `{entry}` registered twice, the last one is kept");
        }
    }

    /// Registers a kernel, see [Self::register].
    pub fn with_kernel<K: HostKernel>(mut self, kernel: K) -> Self {
        self.register(kernel);
        self
    }

    /// Limits the total number of bytes live buffers may reserve.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Number of worker threads executing work-groups.
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn available_memory(&self) -> usize {
        let limit = self
            .memory_limit
            .unwrap_or(usize::MAX)
            .saturating_sub(self.usage.bytes_in_use);
        limit.min(self.properties.max_buffer_size)
    }

    fn memory(&self, handle: &Handle, access: BufferFlags) -> Result<&DeviceMemory, IoError> {
        let memory = self
            .memory
            .get(&handle.id())
            .ok_or_else(|| IoError::UnknownBuffer {
                buffer: handle.id(),
                backtrace: BackTrace::capture(),
            })?;

        if !memory.flags().contains(access) {
            return Err(IoError::AccessDenied {
                buffer: handle.id(),
                access,
                backtrace: BackTrace::capture(),
            });
        }

        Ok(memory)
    }

    fn resolve_args(
        &self,
        compiled: &CompiledKernel,
    ) -> Result<(Vec<ResolvedArg<'_>>, usize), LaunchError> {
        let entry = &compiled.signature.name;
        let mut resolved = Vec::with_capacity(compiled.args.len());
        let mut shared_memory = 0;

        for (index, arg) in compiled.args.iter().enumerate() {
            let invalid = |reason: String| LaunchError::InvalidArgument {
                entry: entry.clone(),
                index: index as u32,
                reason,
                backtrace: BackTrace::capture(),
            };

            let arg = match arg {
                Some(arg) => arg,
                None => return Err(invalid("the argument was never bound".into())),
            };

            resolved.push(match arg {
                KernelArg::Buffer(id) => match self.memory.get(id) {
                    Some(memory) => ResolvedArg::Global(memory.as_array()),
                    None => return Err(invalid(format!("buffer {id} isn't alive"))),
                },
                KernelArg::Scalar(value) => ResolvedArg::Scalar(*value),
                KernelArg::Scratch { len } => {
                    shared_memory += arg.scratch_bytes();
                    ResolvedArg::Scratch(*len)
                }
            });
        }

        Ok((resolved, shared_memory))
    }
}

impl ComputeServer for HostServer {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create(&mut self, descriptor: AllocationDescriptor<'_>) -> Result<Handle, AllocationError> {
        let size = descriptor.size;

        if size == 0 {
            return Err(AllocationError::ZeroSized {
                backtrace: BackTrace::capture(),
            });
        }

        if let Some(init) = descriptor.init {
            if init.len() != size {
                return Err(AllocationError::InitSizeMismatch {
                    size,
                    provided: init.len(),
                    backtrace: BackTrace::capture(),
                });
            }
        }

        let available = self.available_memory();
        if size > available {
            return Err(AllocationError::OutOfMemory {
                requested: size,
                available,
                backtrace: BackTrace::capture(),
            });
        }

        let id = BufferId::new();
        self.memory.insert(
            id,
            DeviceMemory::new(size, descriptor.flags, descriptor.init),
        );
        self.usage.buffers += 1;
        self.usage.bytes_in_use += size;
        self.usage.allocations += 1;
        log::trace!("Created {id} of {size} bytes");

        Ok(Handle::new(id, size, descriptor.flags))
    }

    fn release(&mut self, handle: Handle) -> Result<(), ServerError> {
        let memory = self
            .memory
            .remove(&handle.id())
            .ok_or_else(|| ServerError::UnknownBuffer {
                buffer: handle.id(),
                backtrace: BackTrace::capture(),
            })?;

        self.usage.buffers -= 1;
        self.usage.bytes_in_use -= memory.size();
        self.usage.releases += 1;
        log::trace!("Released {}", handle.id());

        Ok(())
    }

    fn compile(&mut self, source: &str, entry: &str) -> Result<KernelId, CompilationError> {
        let error = |log: String| CompilationError {
            entry: entry.to_string(),
            log,
        };

        let program = Program::parse(source).map_err(error)?;
        let signature = program.kernel(entry).cloned().ok_or_else(|| {
            error(format!(
                "error: no kernel named '{entry}' in the program, found [{}]",
                program.names().join(", ")
            ))
        })?;
        let kernel = self.registry.get(entry).cloned().ok_or_else(|| {
            error(format!(
                "error: no host implementation registered for kernel '{entry}'"
            ))
        })?;

        if kernel.params() != signature.params.as_slice() {
            return Err(error(format!(
                "error: kernel declared as {signature} but its host implementation expects {:?}",
                kernel.params()
            )));
        }

        let id = KernelId::new();
        let args = vec![None; signature.params.len()];
        self.kernels.insert(
            id,
            CompiledKernel {
                kernel,
                signature,
                args,
            },
        );

        Ok(id)
    }

    fn release_kernel(&mut self, kernel: KernelId) -> Result<(), ServerError> {
        match self.kernels.remove(&kernel) {
            Some(_) => Ok(()),
            None => Err(ServerError::UnknownKernel {
                kernel,
                backtrace: BackTrace::capture(),
            }),
        }
    }

    fn bind(&mut self, kernel: KernelId, index: u32, arg: KernelArg) -> Result<(), LaunchError> {
        let compiled = self
            .kernels
            .get_mut(&kernel)
            .ok_or_else(|| LaunchError::UnknownKernel {
                kernel,
                backtrace: BackTrace::capture(),
            })?;

        let invalid = |reason: String| LaunchError::InvalidArgument {
            entry: compiled.signature.name.clone(),
            index,
            reason,
            backtrace: BackTrace::capture(),
        };

        let expected = match compiled.signature.params.get(index as usize) {
            Some(kind) => *kind,
            None => {
                return Err(invalid(format!(
                    "the kernel has {} parameters",
                    compiled.signature.params.len()
                )));
            }
        };

        if arg.kind() != expected {
            return Err(invalid(format!(
                "expected a {expected:?} argument, got {arg:?}"
            )));
        }

        compiled.args[index as usize] = Some(arg);
        Ok(())
    }

    fn launch(&mut self, kernel: KernelId, geometry: LaunchGeometry) -> Result<(), LaunchError> {
        let compiled = self
            .kernels
            .get(&kernel)
            .ok_or_else(|| LaunchError::UnknownKernel {
                kernel,
                backtrace: BackTrace::capture(),
            })?;

        validate_geometry(&self.properties, &geometry)?;
        let (args, shared_memory) = self.resolve_args(compiled)?;
        validate_shared_memory(&self.properties, shared_memory)?;

        let count = geometry.group_count();
        let host = compiled.kernel.as_ref();
        log::trace!(
            "Launching `{}` with {count} groups of {} units",
            compiled.signature.name,
            geometry.local
        );

        run_groups(count, self.workers, |id| {
            let mut group = WorkGroup::new(id, geometry.local, count, &args);
            host.execute(&mut group)
        })
        .map_err(|err| LaunchError::Execution {
            entry: compiled.signature.name.clone(),
            reason: err.reason,
            backtrace: BackTrace::capture(),
        })
    }

    fn read(&mut self, handle: &Handle) -> Result<Vec<u8>, IoError> {
        Ok(self.memory(handle, BufferFlags::READ)?.to_bytes())
    }

    fn write(&mut self, handle: &Handle, data: &[u8]) -> Result<(), IoError> {
        let memory = self.memory(handle, BufferFlags::WRITE)?;

        if memory.size() != data.len() {
            return Err(IoError::SizeMismatch {
                expected: memory.size(),
                actual: data.len(),
                backtrace: BackTrace::capture(),
            });
        }

        memory.copy_from(data);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), ServerError> {
        Ok(())
    }

    fn memory_usage(&self) -> MemoryUsage {
        self.usage
    }
}
