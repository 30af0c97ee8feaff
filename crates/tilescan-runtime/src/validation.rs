use crate::{
    BackTrace, DeviceProperties,
    server::{LaunchError, LaunchGeometry, ResourceLimitError},
};

/// Validate the geometry can be partitioned into work-groups that fit within the hardware limits.
pub fn validate_geometry(
    properties: &DeviceProperties,
    geometry: &LaunchGeometry,
) -> Result<(), LaunchError> {
    if geometry.local == 0 || geometry.global == 0 || geometry.global % geometry.local != 0 {
        return Err(LaunchError::InvalidGeometry {
            global: geometry.global,
            local: geometry.local,
            backtrace: BackTrace::capture(),
        });
    }

    validate_group_size(properties, geometry.local)
}

/// Validate the work-group size fits within the hardware limits.
pub fn validate_group_size(properties: &DeviceProperties, requested: u32) -> Result<(), LaunchError> {
    let max = properties.max_group_size;
    if requested > max {
        Err(ResourceLimitError::GroupSize {
            requested,
            max,
            backtrace: BackTrace::capture(),
        }
        .into())
    } else {
        Ok(())
    }
}

/// Validate the shared memory of a work-group fits within the hardware limits.
pub fn validate_shared_memory(
    properties: &DeviceProperties,
    requested: usize,
) -> Result<(), LaunchError> {
    let max = properties.max_shared_memory_size;
    if requested > max {
        Err(ResourceLimitError::SharedMemory {
            requested,
            max,
            backtrace: BackTrace::capture(),
        }
        .into())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_must_be_a_multiple_of_the_group_size() {
        let properties = DeviceProperties::host();

        assert!(validate_geometry(&properties, &LaunchGeometry::new(8, 4)).is_ok());
        assert!(matches!(
            validate_geometry(&properties, &LaunchGeometry::new(6, 4)),
            Err(LaunchError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            validate_geometry(&properties, &LaunchGeometry::new(4, 0)),
            Err(LaunchError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn group_size_is_bounded_by_the_device() {
        let properties = DeviceProperties::host();
        let max = properties.max_group_size;

        assert!(validate_geometry(&properties, &LaunchGeometry::groups(2, max)).is_ok());
        assert!(matches!(
            validate_geometry(&properties, &LaunchGeometry::groups(1, max + 1)),
            Err(LaunchError::TooManyResources(ResourceLimitError::GroupSize { .. }))
        ));
    }

    #[test]
    fn shared_memory_is_bounded_by_the_device() {
        let properties = DeviceProperties::host();

        assert!(validate_shared_memory(&properties, properties.max_shared_memory_size).is_ok());
        assert!(validate_shared_memory(&properties, properties.max_shared_memory_size + 1).is_err());
    }
}
