use crate::{BackTrace, BufferId, DeviceProperties, KernelId, MemoryUsage};
use core::fmt::Debug;
use thiserror::Error;

bitflags::bitflags! {
    /// Access capabilities of a device buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u8 {
        /// Kernels and the host may read the buffer.
        const READ = 0b01;
        /// Kernels and the host may write the buffer.
        const WRITE = 0b10;
        /// Both read and write access.
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Server handle owning a device buffer.
///
/// A handle is neither [Clone] nor [Copy]: [ComputeServer::release] consumes it, so the same
/// buffer can't be released twice through the API.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    id: BufferId,
    size: usize,
    flags: BufferFlags,
}

impl Handle {
    /// Creates a handle for a freshly reserved buffer. Only servers should call this.
    pub fn new(id: BufferId, size: usize, flags: BufferFlags) -> Self {
        Self { id, size, flags }
    }

    /// The id of the buffer on the server.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The access flags of the buffer.
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// A binding of this buffer that can be passed as a kernel argument.
    pub fn binding(&self) -> KernelArg {
        KernelArg::Buffer(self.id)
    }
}

/// Describes a buffer allocation.
#[derive(new, Debug, Clone, Copy)]
pub struct AllocationDescriptor<'a> {
    /// Size of the buffer in bytes.
    pub size: usize,
    /// Access flags of the buffer.
    pub flags: BufferFlags,
    /// Host data copied into the buffer at creation time. The buffer is zero-filled otherwise.
    pub init: Option<&'a [u8]>,
}

impl<'a> AllocationDescriptor<'a> {
    /// Allocation initialized with a copy of the given bytes.
    pub fn from_bytes(data: &'a [u8], flags: BufferFlags) -> Self {
        Self::new(data.len(), flags, Some(data))
    }

    /// Zero-filled allocation.
    pub fn zeroed(size: usize, flags: BufferFlags) -> Self {
        Self::new(size, flags, None)
    }
}

/// A value bound to a kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg {
    /// A global buffer.
    Buffer(BufferId),
    /// A 32-bit scalar passed by value.
    Scalar(u32),
    /// Shared memory private to each work-group, with `len` 32-bit elements.
    Scratch {
        /// Number of 32-bit elements.
        len: usize,
    },
}

impl KernelArg {
    /// Size in bytes of the shared memory requested by the argument.
    pub fn scratch_bytes(&self) -> usize {
        match self {
            KernelArg::Scratch { len } => len * core::mem::size_of::<u32>(),
            _ => 0,
        }
    }
}

/// The kind of value a kernel parameter expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// `__global` pointer.
    Buffer,
    /// Value parameter.
    Scalar,
    /// `__local` pointer.
    Scratch,
}

impl KernelArg {
    /// The parameter kind this argument can be bound to.
    pub fn kind(&self) -> ParamKind {
        match self {
            KernelArg::Buffer(_) => ParamKind::Buffer,
            KernelArg::Scalar(_) => ParamKind::Scalar,
            KernelArg::Scratch { .. } => ParamKind::Scratch,
        }
    }
}

/// One dimensional launch geometry.
///
/// The global index space `[0, global)` is partitioned into `global / local` work-groups of
/// `local` units each.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchGeometry {
    /// Number of units in the whole launch.
    pub global: u32,
    /// Number of units per work-group.
    pub local: u32,
}

impl LaunchGeometry {
    /// Launch `count` work-groups of `size` units.
    pub fn groups(count: u32, size: u32) -> Self {
        Self::new(count * size, size)
    }

    /// Number of work-groups, assuming the geometry has been validated.
    pub fn group_count(&self) -> u32 {
        self.global / self.local
    }
}

/// Allocation errors.
#[derive(Error, Clone)]
pub enum AllocationError {
    /// Zero sized buffers can't be created.
    #[error("Can't allocate a zero sized buffer\nBacktrace:\n{backtrace}")]
    ZeroSized {
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The device is out of memory.
    #[error(
        "Out of memory: requested {requested} bytes, {available} bytes available\nBacktrace:\n{backtrace}"
    )]
    OutOfMemory {
        /// Bytes requested.
        requested: usize,
        /// Bytes still available on the device.
        available: usize,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The initial data doesn't match the requested size.
    #[error(
        "Initial data of {provided} bytes doesn't match the buffer size of {size} bytes\nBacktrace:\n{backtrace}"
    )]
    InitSizeMismatch {
        /// The size of the buffer.
        size: usize,
        /// The size of the initial data.
        provided: usize,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The server refused the allocation for another reason.
    #[error("Allocation failed\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    Unknown {
        /// The cause of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for AllocationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// The program text couldn't be built for the requested entry.
#[derive(Error, Clone)]
#[error("Failed to build kernel `{entry}`\nBuild log:\n{log}")]
pub struct CompilationError {
    /// The entry that was requested.
    pub entry: String,
    /// The diagnostic log of the compiler.
    pub log: String,
}

impl core::fmt::Debug for CompilationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Resource limit errors.
#[derive(Error, Clone)]
pub enum ResourceLimitError {
    /// Shared memory exceeds maximum.
    #[error(
        "Too much shared memory requested.\nRequested {requested} bytes, maximum {max} bytes available.\nBacktrace\n{backtrace}"
    )]
    SharedMemory {
        /// Value requested.
        requested: usize,
        /// Maximum value.
        max: usize,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// Work-group size exceeds maximum.
    #[error(
        "Work-group size exceeds maximum.\nRequested {requested} units, max units is {max}.\nBacktrace\n{backtrace}"
    )]
    GroupSize {
        /// Requested value.
        requested: u32,
        /// Maximum value.
        max: u32,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for ResourceLimitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Kernel launch errors.
#[derive(Error, Clone)]
pub enum LaunchError {
    /// Too many resources were requested.
    #[error("Too many resources were requested during launch\n{0}")]
    TooManyResources(#[from] ResourceLimitError),

    /// The launch geometry can't be partitioned into work-groups.
    #[error(
        "Invalid launch geometry: global size {global} with local size {local}\nBacktrace\n{backtrace}"
    )]
    InvalidGeometry {
        /// Global size.
        global: u32,
        /// Local size.
        local: u32,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The kernel isn't known by the server.
    #[error("Unknown kernel {kernel}\nBacktrace\n{backtrace}")]
    UnknownKernel {
        /// The kernel id.
        kernel: KernelId,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// An argument is missing or doesn't match the kernel parameter.
    #[error("Invalid argument {index} for kernel `{entry}`\nCaused by:\n  {reason}\nBacktrace\n{backtrace}")]
    InvalidArgument {
        /// The kernel entry.
        entry: String,
        /// The parameter index.
        index: u32,
        /// The cause of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The kernel failed while executing.
    #[error("Kernel `{entry}` failed during execution\nCaused by:\n  {reason}\nBacktrace\n{backtrace}")]
    Execution {
        /// The kernel entry.
        entry: String,
        /// The cause of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// Unknown launch error.
    #[error("An unknown error happened during launch\nCaused by:\n  {reason}\nBacktrace\n{backtrace}")]
    Unknown {
        /// The cause of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for LaunchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Errors moving data between the host and a buffer.
#[derive(Error, Clone)]
pub enum IoError {
    /// The buffer isn't known by the server, it was probably released.
    #[error("Unknown buffer {buffer}\nBacktrace\n{backtrace}")]
    UnknownBuffer {
        /// The buffer id.
        buffer: BufferId,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The host slice doesn't have the size of the buffer.
    #[error("Size mismatch: buffer has {expected} bytes, host data has {actual} bytes\nBacktrace\n{backtrace}")]
    SizeMismatch {
        /// Size of the buffer.
        expected: usize,
        /// Size of the host data.
        actual: usize,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The buffer doesn't allow the requested access.
    #[error("Buffer {buffer} doesn't allow {access:?} access\nBacktrace\n{backtrace}")]
    AccessDenied {
        /// The buffer id.
        buffer: BufferId,
        /// The denied access.
        access: BufferFlags,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// Unknown transfer error.
    #[error("An unknown error happened during a transfer\nCaused by:\n  {reason}\nBacktrace\n{backtrace}")]
    Unknown {
        /// The cause of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Errors that aren't tied to a single request.
#[derive(Error, Debug, Clone)]
pub enum ServerError {
    /// A generic runtime error.
    #[error("An error happened during execution\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    Generic {
        /// The details of the generic error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// A release targeted a buffer the server doesn't own.
    #[error("Can't release unknown buffer {buffer}\nBacktrace:\n{backtrace}")]
    UnknownBuffer {
        /// The buffer id.
        buffer: BufferId,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// A release targeted a kernel the server doesn't own.
    #[error("Can't release unknown kernel {kernel}\nBacktrace:\n{backtrace}")]
    UnknownKernel {
        /// The kernel id.
        kernel: KernelId,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

/// The compute server is responsible for handling resources and computations over resources.
///
/// Everything in the server is mutable, therefore it should be solely accessed through the
/// [ComputeClient](crate::client::ComputeClient) for thread safety.
///
/// Every operation is synchronous from the host point of view except [launch](Self::launch),
/// which may return before the kernel completed; [sync](Self::sync) waits for all submitted
/// work.
pub trait ComputeServer: Send + Debug + 'static {
    /// Properties of the device driven by this server.
    fn properties(&self) -> &DeviceProperties;

    /// Reserves a buffer, optionally initialized with a copy of host data.
    fn create(&mut self, descriptor: AllocationDescriptor<'_>) -> Result<Handle, AllocationError>;

    /// Releases the buffer owned by the handle.
    fn release(&mut self, handle: Handle) -> Result<(), ServerError>;

    /// Builds the program text and returns the kernel for the given entry point.
    fn compile(&mut self, source: &str, entry: &str) -> Result<KernelId, CompilationError>;

    /// Releases a compiled kernel.
    fn release_kernel(&mut self, kernel: KernelId) -> Result<(), ServerError>;

    /// Binds an argument to the parameter at `index` of the kernel.
    ///
    /// Bindings persist across launches until they are overwritten.
    fn bind(&mut self, kernel: KernelId, index: u32, arg: KernelArg) -> Result<(), LaunchError>;

    /// Launches the kernel with its current bindings over the given geometry.
    fn launch(&mut self, kernel: KernelId, geometry: LaunchGeometry) -> Result<(), LaunchError>;

    /// Copies the whole buffer into host memory.
    fn read(&mut self, handle: &Handle) -> Result<Vec<u8>, IoError>;

    /// Overwrites the whole buffer with host data.
    fn write(&mut self, handle: &Handle, data: &[u8]) -> Result<(), IoError>;

    /// Waits for all submitted work to complete.
    fn sync(&mut self) -> Result<(), ServerError>;

    /// The current memory accounting of the server.
    fn memory_usage(&self) -> MemoryUsage;
}
