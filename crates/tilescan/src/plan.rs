use crate::{ScanError, ShapeError};
use tilescan_runtime::{DeviceProperties, server::LaunchGeometry};

/// Launch geometry of every stage of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    /// Number of elements in the sequence.
    pub len: usize,
    /// Number of elements per tile, also the work-group size of the tile stages.
    pub tile_size: u32,
    /// `ceil(len / tile_size)`.
    pub tile_count: u32,
    /// One work-group per tile, used by the tile-local scan and the uniform add.
    pub tiles: LaunchGeometry,
    /// A single work-group of `tile_count` units scanning the tile totals.
    pub offsets: LaunchGeometry,
}

impl ScanPlan {
    /// Plans the scan of `len` elements in tiles of `tile_size` elements.
    ///
    /// `len` must be greater than zero.
    pub fn generate(
        properties: &DeviceProperties,
        len: usize,
        tile_size: u32,
    ) -> Result<Self, ScanError> {
        if tile_size == 0 {
            return Err(ScanError::InvalidTileSize);
        }

        if tile_size > properties.max_group_size {
            return Err(ShapeError::TileTooLarge {
                tile_size,
                max_group_size: properties.max_group_size,
            }
            .into());
        }

        let tile_count = len.div_ceil(tile_size as usize);
        if tile_count > tile_size as usize {
            return Err(ShapeError::TooManyTiles {
                len,
                tile_size,
                tile_count,
            }
            .into());
        }

        // Bounded by the group size from here.
        let tile_count = tile_count as u32;

        // The padded range is indexed with `uint`, which also bounds the length.
        let global = match tile_count.checked_mul(tile_size) {
            Some(global) => global,
            None => return Err(ShapeError::TooManyElements { len }.into()),
        };

        let plan = Self {
            len,
            tile_size,
            tile_count,
            tiles: LaunchGeometry::new(global, tile_size),
            offsets: LaunchGeometry::groups(1, tile_count),
        };
        log::debug!("{plan:?}");

        Ok(plan)
    }

    /// The length as the `uint` kernel argument, checked to fit by [generate](Self::generate).
    pub fn len_arg(&self) -> u32 {
        self.len as u32
    }

    /// Size in bytes of the sequence buffer.
    pub fn data_size(&self) -> usize {
        self.len * core::mem::size_of::<i32>()
    }

    /// Size in bytes of the tile sums buffer.
    pub fn tile_sums_size(&self) -> usize {
        self.tile_count as usize * core::mem::size_of::<i32>()
    }
}
