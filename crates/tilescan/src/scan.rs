use crate::{
    DeviceBuffer, KernelSource, ScanError, ScanKernels, ScanPlan, TileSums,
    stages::{scan_offsets, scan_tiles, uniform_add},
};
use tilescan_runtime::{
    client::ComputeClient,
    server::{BufferFlags, ComputeServer},
};

/// Progress of a scan invocation.
///
/// `Finalized` is only reached when every stage and the readback succeeded. Any failure moves to
/// `Aborted` after the buffers were released. The next invocation starts again from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    /// Nothing acquired.
    Idle,
    /// The sequence and the tile sums are on the device.
    DataLoaded,
    /// Every tile is scanned and the tile sums hold the totals.
    TileScanned,
    /// The tile sums hold the tile offsets.
    OffsetsScanned,
    /// The result was read back and the buffers released.
    Finalized,
    /// The invocation failed and the buffers were released.
    Aborted,
}

/// Exclusive prefix sum of 32-bit integers over a compute backend.
///
/// Kernels are compiled once when the scan is created and reused by every [run](Scan::run).
/// Each run owns its buffers; independent scans may run concurrently on clones of the same client.
#[derive(Debug)]
pub struct Scan<S: ComputeServer> {
    kernels: ScanKernels<S>,
    state: ScanState,
}

impl<S: ComputeServer> Scan<S> {
    /// Compiles the bundled program text.
    pub fn new(client: &ComputeClient<S>) -> Result<Self, ScanError> {
        Self::with_source(client, &KernelSource::default())
    }

    /// Compiles the given program text.
    pub fn with_source(client: &ComputeClient<S>, source: &KernelSource) -> Result<Self, ScanError> {
        Ok(Self {
            kernels: ScanKernels::compile(client, source)?,
            state: ScanState::Idle,
        })
    }

    /// The state reached by the last invocation.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// The client the scan runs on.
    pub fn client(&self) -> &ComputeClient<S> {
        self.kernels.client()
    }

    /// Computes the exclusive prefix sum of `input` in tiles of `tile_size` elements.
    ///
    /// The number of tiles can't exceed `tile_size`, and `tile_size` can't exceed the maximum
    /// work-group size of the device. An empty input returns an empty sequence without touching the
    /// device. Additions wrap on overflow.
    pub fn run(&mut self, input: &[i32], tile_size: u32) -> Result<Vec<i32>, ScanError> {
        let Self { kernels, state } = self;
        transition(state, ScanState::Idle);

        let plan = ScanPlan::generate(kernels.client().properties(), input.len(), tile_size)?;
        if plan.len == 0 {
            return Ok(Vec::new());
        }

        match execute(kernels, &plan, input, state) {
            Ok(output) => {
                transition(state, ScanState::Finalized);
                Ok(output)
            }
            Err(err) => {
                log::debug!("Scan of {} elements aborted: {err}", plan.len);
                transition(state, ScanState::Aborted);
                Err(err)
            }
        }
    }
}

/// Computes the exclusive prefix sum of `input`, compiling the bundled kernels for this call only.
///
/// See [Scan::run].
pub fn exclusive_scan<S: ComputeServer>(
    client: &ComputeClient<S>,
    input: &[i32],
    tile_size: u32,
) -> Result<Vec<i32>, ScanError> {
    if input.is_empty() {
        ScanPlan::generate(client.properties(), 0, tile_size)?;
        return Ok(Vec::new());
    }

    Scan::new(client)?.run(input, tile_size)
}

// Buffers are dropped, thus released, before returning on every path.
fn execute<S: ComputeServer>(
    kernels: &ScanKernels<S>,
    plan: &ScanPlan,
    input: &[i32],
    state: &mut ScanState,
) -> Result<Vec<i32>, ScanError> {
    let client = kernels.client();

    let data = DeviceBuffer::from_slice(client, "sequence", input, BufferFlags::READ_WRITE)?;
    let sums = TileSums::allocate(client, plan.tile_count)?;
    transition(state, ScanState::DataLoaded);

    let totals = scan_tiles(kernels, plan, &data, sums)?;
    transition(state, ScanState::TileScanned);

    let offsets = scan_offsets(kernels, plan, totals)?;
    transition(state, ScanState::OffsetsScanned);

    uniform_add(kernels, plan, &data, &offsets)?;

    data.read()
}

fn transition(state: &mut ScanState, next: ScanState) {
    if *state != next {
        log::trace!("Scan {state:?} -> {next:?}");
        *state = next;
    }
}
