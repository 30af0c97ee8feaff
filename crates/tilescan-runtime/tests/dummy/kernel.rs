use tilescan_runtime::{
    host::{ExecutionError, HostKernel, WorkGroup},
    server::ParamKind,
};

#[derive(Debug)]
pub struct AddScalar {
    params: [ParamKind; 2],
}

impl Default for AddScalar {
    fn default() -> Self {
        Self {
            params: [ParamKind::Buffer, ParamKind::Scalar],
        }
    }
}

impl HostKernel for AddScalar {
    fn entry(&self) -> &str {
        "add_scalar"
    }

    fn params(&self) -> &[ParamKind] {
        &self.params
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError> {
        let data = group.global(0)?;
        let value = group.scalar(1)? as i32;

        for unit in group.units() {
            let index = group.global_id(unit);
            data.write(index, data.read(index)?.wrapping_add(value))?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct ReverseGroups {
    params: [ParamKind; 3],
}

impl Default for ReverseGroups {
    fn default() -> Self {
        Self {
            params: [ParamKind::Buffer, ParamKind::Buffer, ParamKind::Scratch],
        }
    }
}

impl HostKernel for ReverseGroups {
    fn entry(&self) -> &str {
        "reverse_groups"
    }

    fn params(&self) -> &[ParamKind] {
        &self.params
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError> {
        let input = group.global(0)?;
        let output = group.global(1)?;
        let size = group.size() as usize;
        let offset = group.global_id(0);

        let tile = group.scratch(2)?;
        for lid in 0..size {
            tile[lid] = input.read(offset + lid)?;
        }
        // barrier
        for lid in 0..size {
            output.write(offset + lid, tile[size - 1 - lid])?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct OutOfBounds {
    params: [ParamKind; 1],
}

impl Default for OutOfBounds {
    fn default() -> Self {
        Self {
            params: [ParamKind::Buffer],
        }
    }
}

impl HostKernel for OutOfBounds {
    fn entry(&self) -> &str {
        "out_of_bounds"
    }

    fn params(&self) -> &[ParamKind] {
        &self.params
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), ExecutionError> {
        let data = group.global(0)?;

        for unit in group.units() {
            data.write(group.global_id(unit) + 1, 0)?;
        }

        Ok(())
    }
}
