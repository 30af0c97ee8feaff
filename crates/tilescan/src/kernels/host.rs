use crate::Stage;
use tilescan_runtime::{
    client::ComputeClient,
    host::{ExecutionError, HostKernel, HostServer, WorkGroup},
    server::ParamKind,
};

/// Registers the host implementation of every scan kernel.
pub fn register_scan_kernels(server: HostServer) -> HostServer {
    server
        .with_kernel(ScanTiles)
        .with_kernel(ScanGroup)
        .with_kernel(UniformAdd)
}

/// A client of a host server able to run the scan kernels, configured from the global
/// configuration.
pub fn host_client() -> ComputeClient<HostServer> {
    ComputeClient::new(register_scan_kernels(HostServer::default()))
}

/// Host implementation of `scan_tiles`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanTiles;

/// Host implementation of `scan_group`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanGroup;

/// Host implementation of `uniform_add`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformAdd;

impl ScanTiles {
    const PARAMS: [ParamKind; 4] = [
        ParamKind::Buffer,
        ParamKind::Buffer,
        ParamKind::Scratch,
        ParamKind::Scalar,
    ];
}

impl ScanGroup {
    const PARAMS: [ParamKind; 3] = [ParamKind::Buffer, ParamKind::Scratch, ParamKind::Scalar];
}

impl UniformAdd {
    const PARAMS: [ParamKind; 3] = [ParamKind::Buffer, ParamKind::Buffer, ParamKind::Scalar];
}

impl HostKernel for ScanTiles {
    fn entry(&self) -> &str {
        Stage::ScanTiles.entry()
    }

    fn params(&self) -> &[ParamKind] {
        &Self::PARAMS
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError> {
        let data = group.global(0)?;
        let tile_sums = group.global(1)?;
        let len = group.scalar(3)? as usize;
        let size = group.size() as usize;
        let start = group.global_id(0);
        let tile_index = group.id() as usize;

        let tile = local_tile(group.scratch(2)?, size)?;
        for (lid, value) in tile.iter_mut().enumerate() {
            let gid = start + lid;
            *value = if gid < len { data.read(gid)? } else { 0 };
        }

        let total = scan_local(tile);

        for (lid, value) in tile.iter().enumerate() {
            let gid = start + lid;
            if gid < len {
                data.write(gid, *value)?;
            }
        }
        tile_sums.write(tile_index, total)
    }
}

impl HostKernel for ScanGroup {
    fn entry(&self) -> &str {
        Stage::ScanOffsets.entry()
    }

    fn params(&self) -> &[ParamKind] {
        &Self::PARAMS
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError> {
        let values = group.global(0)?;
        let count = group.scalar(2)? as usize;
        let size = group.size() as usize;

        let scratch = local_tile(group.scratch(1)?, size)?;
        for (lid, value) in scratch.iter_mut().enumerate() {
            *value = if lid < count { values.read(lid)? } else { 0 };
        }

        scan_local(scratch);

        for (lid, value) in scratch.iter().enumerate().take(count) {
            values.write(lid, *value)?;
        }

        Ok(())
    }
}

impl HostKernel for UniformAdd {
    fn entry(&self) -> &str {
        Stage::UniformAdd.entry()
    }

    fn params(&self) -> &[ParamKind] {
        &Self::PARAMS
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError> {
        let data = group.global(0)?;
        let offsets = group.global(1)?;
        let len = group.scalar(2)? as usize;
        let offset = offsets.read(group.id() as usize)?;

        for unit in group.units() {
            let gid = group.global_id(unit);
            if gid < len {
                data.write(gid, data.read(gid)?.wrapping_add(offset))?;
            }
        }

        Ok(())
    }
}

fn local_tile(scratch: &mut [i32], size: usize) -> Result<&mut [i32], ExecutionError> {
    let len = scratch.len();
    scratch.get_mut(..size).ok_or_else(|| {
        ExecutionError::new(format!(
            "shared memory of {len} elements can't hold a work-group of {size} units"
        ))
    })
}

/// Exclusive scan of a work-group's shared memory, returns the total.
///
/// Follows `scan_local` of the program text round by round: every unit reads its left neighbour
/// into a register, then every unit accumulates. Running each barrier-delimited phase for all
/// units before the next one gives the same result as the device.
fn scan_local(tile: &mut [i32]) -> i32 {
    let size = tile.len();
    if size == 0 {
        return 0;
    }

    let mut registers = vec![0; size];
    let mut offset = 1;

    while offset < size {
        for (lid, register) in registers.iter_mut().enumerate() {
            *register = if lid >= offset { tile[lid - offset] } else { 0 };
        }
        for (value, register) in tile.iter_mut().zip(registers.iter()) {
            *value = value.wrapping_add(*register);
        }
        offset <<= 1;
    }

    let total = tile[size - 1];
    for (lid, register) in registers.iter_mut().enumerate() {
        *register = if lid > 0 { tile[lid - 1] } else { 0 };
    }
    tile.copy_from_slice(&registers);

    total
}
