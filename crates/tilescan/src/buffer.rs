use crate::ScanError;
use core::marker::PhantomData;
use tilescan_runtime::{
    client::ComputeClient,
    server::{BufferFlags, ComputeServer, Handle, KernelArg},
};

/// A device buffer released when dropped.
///
/// Every buffer of a scan is held by a guard, so an early return on any error path releases what
/// was acquired so far.
#[derive(Debug)]
pub struct DeviceBuffer<'a, S: ComputeServer> {
    client: &'a ComputeClient<S>,
    handle: Option<Handle>,
    name: &'static str,
}

impl<'a, S: ComputeServer> DeviceBuffer<'a, S> {
    /// Reserves a buffer holding a copy of `data`.
    pub fn from_slice(
        client: &'a ComputeClient<S>,
        name: &'static str,
        data: &[i32],
        flags: BufferFlags,
    ) -> Result<Self, ScanError> {
        let handle = client
            .create_from_slice(data, flags)
            .map_err(|source| ScanError::AllocationFailure {
                buffer: name,
                source,
            })?;

        Ok(Self::wrap(client, name, handle))
    }

    /// Reserves a zero-filled buffer of `len` elements.
    pub fn zeroed(
        client: &'a ComputeClient<S>,
        name: &'static str,
        len: usize,
        flags: BufferFlags,
    ) -> Result<Self, ScanError> {
        let handle = client
            .empty(len * core::mem::size_of::<i32>(), flags)
            .map_err(|source| ScanError::AllocationFailure {
                buffer: name,
                source,
            })?;

        Ok(Self::wrap(client, name, handle))
    }

    fn wrap(client: &'a ComputeClient<S>, name: &'static str, handle: Handle) -> Self {
        log::trace!("Acquired the {name} buffer {}", handle.id());

        Self {
            client,
            handle: Some(handle),
            name,
        }
    }

    fn handle(&self) -> &Handle {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("The handle is only taken on drop"),
        }
    }

    /// The buffer as a kernel argument.
    pub fn binding(&self) -> KernelArg {
        self.handle().binding()
    }

    /// Number of 32-bit elements.
    pub fn len(&self) -> usize {
        self.handle().size() / core::mem::size_of::<i32>()
    }

    /// Whether the buffer has no element, never true for a live buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the buffer into host memory.
    pub fn read(&self) -> Result<Vec<i32>, ScanError> {
        Ok(self.client.read_one::<i32>(self.handle())?)
    }
}

impl<S: ComputeServer> Drop for DeviceBuffer<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let id = handle.id();
            match self.client.release(handle) {
                Ok(()) => log::trace!("Released the {} buffer {id}", self.name),
                Err(err) => log::warn!("Can't release the {} buffer {id}: {err}", self.name),
            }
        }
    }
}

/// The tile sums hold nothing meaningful yet.
#[derive(Debug)]
pub struct Zeroed;
/// The tile sums hold the total of every tile.
#[derive(Debug)]
pub struct Totals;
/// The tile sums hold the exclusive offset of every tile.
#[derive(Debug)]
pub struct Offsets;

/// What the tile sums buffer currently means.
pub trait Phase: core::fmt::Debug {
    /// Name of the phase, for diagnostics.
    const NAME: &'static str;
}

impl Phase for Zeroed {
    const NAME: &'static str = "zeroed";
}

impl Phase for Totals {
    const NAME: &'static str = "totals";
}

impl Phase for Offsets {
    const NAME: &'static str = "offsets";
}

/// The tile sums buffer, tagged with its phase.
///
/// The same storage holds the tile totals after the tile-local scan, then the tile offsets after
/// the offset scan. Only the stages move it to the next phase, so a value can't be read with a
/// stale meaning.
#[derive(Debug)]
pub struct TileSums<'a, S: ComputeServer, P: Phase> {
    buffer: DeviceBuffer<'a, S>,
    _phase: PhantomData<P>,
}

impl<'a, S: ComputeServer> TileSums<'a, S, Zeroed> {
    /// Reserves the zero-filled tile sums of `tile_count` tiles.
    pub fn allocate(client: &'a ComputeClient<S>, tile_count: u32) -> Result<Self, ScanError> {
        let buffer =
            DeviceBuffer::zeroed(client, "tile sums", tile_count as usize, BufferFlags::READ_WRITE)?;

        Ok(Self {
            buffer,
            _phase: PhantomData,
        })
    }

    pub(crate) fn into_totals(self) -> TileSums<'a, S, Totals> {
        self.advance()
    }
}

impl<'a, S: ComputeServer> TileSums<'a, S, Totals> {
    pub(crate) fn into_offsets(self) -> TileSums<'a, S, Offsets> {
        self.advance()
    }
}

impl<'a, S: ComputeServer, P: Phase> TileSums<'a, S, P> {
    /// The buffer as a kernel argument.
    pub fn binding(&self) -> KernelArg {
        self.buffer.binding()
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether there is no tile.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Copies the values of the current phase into host memory.
    pub fn read(&self) -> Result<Vec<i32>, ScanError> {
        self.buffer.read()
    }

    fn advance<Next: Phase>(self) -> TileSums<'a, S, Next> {
        log::trace!("Tile sums {} -> {}", P::NAME, Next::NAME);

        TileSums {
            buffer: self.buffer,
            _phase: PhantomData,
        }
    }
}
