use crate::{
    DeviceBuffer, Offsets, ScanError, ScanKernels, ScanPlan, Stage, TileSums, Totals, Zeroed,
};
use tilescan_runtime::{
    BackTrace,
    client::ComputeClient,
    server::{ComputeServer, KernelArg, LaunchError, LaunchGeometry},
};

/// Scans every tile of `data` in place and writes the tile totals.
///
/// Runs `tile_count` work-groups of `tile_size` units, each with `tile_size` elements of shared
/// memory. Elements past the end of the sequence are read as zero.
pub fn scan_tiles<'a, S: ComputeServer>(
    kernels: &ScanKernels<S>,
    plan: &ScanPlan,
    data: &DeviceBuffer<'a, S>,
    sums: TileSums<'a, S, Zeroed>,
) -> Result<TileSums<'a, S, Totals>, ScanError> {
    launch(
        kernels,
        Stage::ScanTiles,
        &[
            data.binding(),
            sums.binding(),
            KernelArg::Scratch {
                len: plan.tile_size as usize,
            },
            KernelArg::Scalar(plan.len_arg()),
        ],
        plan.tiles,
    )?;

    Ok(sums.into_totals())
}

/// Turns the tile totals into exclusive tile offsets, in place.
///
/// Runs a single work-group of `tile_count` units.
pub fn scan_offsets<'a, S: ComputeServer>(
    kernels: &ScanKernels<S>,
    plan: &ScanPlan,
    sums: TileSums<'a, S, Totals>,
) -> Result<TileSums<'a, S, Offsets>, ScanError> {
    launch(
        kernels,
        Stage::ScanOffsets,
        &[
            sums.binding(),
            KernelArg::Scratch {
                len: plan.tile_count as usize,
            },
            KernelArg::Scalar(plan.tile_count),
        ],
        plan.offsets,
    )?;

    Ok(sums.into_offsets())
}

/// Adds the offset of every tile to each of its elements.
pub fn uniform_add<'a, S: ComputeServer>(
    kernels: &ScanKernels<S>,
    plan: &ScanPlan,
    data: &DeviceBuffer<'a, S>,
    offsets: &TileSums<'a, S, Offsets>,
) -> Result<(), ScanError> {
    launch(
        kernels,
        Stage::UniformAdd,
        &[
            data.binding(),
            offsets.binding(),
            KernelArg::Scalar(plan.len_arg()),
        ],
        plan.tiles,
    )
}

// Binds, launches and waits: the next stage reads what this one wrote.
fn launch<S: ComputeServer>(
    kernels: &ScanKernels<S>,
    stage: Stage,
    args: &[KernelArg],
    geometry: LaunchGeometry,
) -> Result<(), ScanError> {
    let client: &ComputeClient<S> = kernels.client();
    let kernel = kernels.id(stage);
    let failure = |source: LaunchError| ScanError::LaunchFailure { stage, source };

    client.bind_all(kernel, args).map_err(failure)?;
    client.launch(kernel, geometry).map_err(failure)?;
    client.sync().map_err(|err| {
        failure(LaunchError::Unknown {
            reason: format!("Can't wait for the stage to complete: {err}"),
            backtrace: BackTrace::capture(),
        })
    })?;

    log::trace!("Stage `{stage}` completed over {geometry:?}");
    Ok(())
}
