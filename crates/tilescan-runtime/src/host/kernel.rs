use super::GlobalArray;
use crate::server::ParamKind;
use core::{fmt::Debug, ops::Range};
use thiserror::Error;

/// Native implementation of a kernel entry, executed one work-group at a time.
///
/// A host kernel is matched with a `__kernel` declaration of the program text by its
/// [entry](HostKernel::entry) name, and both must declare the same [parameters](ParamKind).
///
/// Units of a work-group are not threads: a kernel runs the phases between two barriers as a loop
/// over [WorkGroup::units], which gives every phase a consistent view of the shared memory.
/// Work-groups of the same launch may run concurrently.
pub trait HostKernel: Send + Sync + Debug + 'static {
    /// The name of the `__kernel` function.
    fn entry(&self) -> &str;

    /// The kind of each parameter, in declaration order.
    fn params(&self) -> &[ParamKind];

    /// Executes a single work-group.
    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError>;
}

/// A kernel failed while executing a work-group.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ExecutionError {
    /// What went wrong.
    pub reason: String,
}

impl ExecutionError {
    /// Creates an error with the given reason.
    pub fn new<R: Into<String>>(reason: R) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An argument after its buffer has been resolved by the server.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ResolvedArg<'a> {
    Global(GlobalArray<'a>),
    Scalar(u32),
    Scratch(usize),
}

/// The execution context of a single work-group.
#[derive(Debug)]
pub struct WorkGroup<'a> {
    id: u32,
    size: u32,
    count: u32,
    args: &'a [ResolvedArg<'a>],
    scratch: Vec<Vec<i32>>,
}

impl<'a> WorkGroup<'a> {
    pub(crate) fn new(id: u32, size: u32, count: u32, args: &'a [ResolvedArg<'a>]) -> Self {
        let scratch = args
            .iter()
            .map(|arg| match arg {
                ResolvedArg::Scratch(len) => vec![0; *len],
                _ => Vec::new(),
            })
            .collect();

        Self {
            id,
            size,
            count,
            args,
            scratch,
        }
    }

    /// Index of the work-group in the launch, `get_group_id(0)`.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of units in the work-group, `get_local_size(0)`.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of work-groups in the launch, `get_num_groups(0)`.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Local ids of all units of the work-group.
    pub fn units(&self) -> Range<u32> {
        0..self.size
    }

    /// The global id of the unit with the given local id, `get_global_id(0)`.
    pub fn global_id(&self, local: u32) -> usize {
        self.id as usize * self.size as usize + local as usize
    }

    /// The global buffer bound at `index`.
    pub fn global(&self, index: usize) -> Result<GlobalArray<'a>, ExecutionError> {
        match self.args.get(index) {
            Some(ResolvedArg::Global(array)) => Ok(*array),
            _ => Err(ExecutionError::new(format!(
                "argument {index} is not a global buffer"
            ))),
        }
    }

    /// The scalar bound at `index`.
    pub fn scalar(&self, index: usize) -> Result<u32, ExecutionError> {
        match self.args.get(index) {
            Some(ResolvedArg::Scalar(value)) => Ok(*value),
            _ => Err(ExecutionError::new(format!(
                "argument {index} is not a scalar"
            ))),
        }
    }

    /// The shared memory bound at `index`, private to this work-group and zero-initialized.
    pub fn scratch(&mut self, index: usize) -> Result<&mut [i32], ExecutionError> {
        match self.args.get(index) {
            Some(ResolvedArg::Scratch(_)) => Ok(&mut self.scratch[index]),
            _ => Err(ExecutionError::new(format!(
                "argument {index} is not shared memory"
            ))),
        }
    }
}

impl GlobalArray<'_> {
    /// Loads the element at `index`, failing when out of bounds.
    pub fn read(&self, index: usize) -> Result<i32, ExecutionError> {
        self.load(index).ok_or_else(|| {
            ExecutionError::new(format!(
                "out of bounds read at {index}, buffer has {} elements",
                self.len()
            ))
        })
    }

    /// Stores the element at `index`, failing when out of bounds or read-only.
    pub fn write(&self, index: usize, value: i32) -> Result<(), ExecutionError> {
        if !self.is_writable() {
            return Err(ExecutionError::new("write to a read-only buffer"));
        }

        match self.store(index, value) {
            true => Ok(()),
            false => Err(ExecutionError::new(format!(
                "out of bounds write at {index}, buffer has {} elements",
                self.len()
            ))),
        }
    }
}
