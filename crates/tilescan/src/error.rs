use core::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;
use tilescan_runtime::server::{AllocationError, CompilationError, IoError, LaunchError};

/// The three kernel launches of a scan, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Exclusive scan inside every tile, producing the tile totals.
    ScanTiles,
    /// Exclusive scan of the tile totals, producing the tile offsets.
    ScanOffsets,
    /// Adds every tile offset to the elements of its tile.
    UniformAdd,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::ScanTiles, Stage::ScanOffsets, Stage::UniformAdd];

    /// The name of the `__kernel` function executing the stage.
    pub fn entry(&self) -> &'static str {
        match self {
            Stage::ScanTiles => "scan_tiles",
            Stage::ScanOffsets => "scan_group",
            Stage::UniformAdd => "uniform_add",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.entry())
    }
}

/// Why a sequence can't be scanned with the requested tile size.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The tile offsets are scanned by a single work-group of `tile_count` units, which can't be
    /// larger than a tile.
    #[error(
        "{len} elements make {tile_count} tiles of {tile_size}, at most {tile_size} tiles are supported"
    )]
    TooManyTiles {
        /// Number of elements in the sequence.
        len: usize,
        /// Requested tile size.
        tile_size: u32,
        /// Number of tiles needed.
        tile_count: usize,
    },

    /// Lengths and global unit ids are 32-bit `uint`s in the kernels.
    #[error("{len} elements padded to whole tiles exceed the {} elements a kernel can index", u32::MAX)]
    TooManyElements {
        /// Number of elements in the sequence.
        len: usize,
    },

    /// A tile is executed by one work-group, which can't exceed the device limit.
    #[error("Tile size {tile_size} exceeds the maximum work-group size {max_group_size}")]
    TileTooLarge {
        /// Requested tile size.
        tile_size: u32,
        /// Maximum work-group size of the device.
        max_group_size: u32,
    },
}

/// Who should act on a [ScanError].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request can't run at this size; retrying with another tile size may succeed.
    Caller,
    /// The device rejected the work; retrying the same call won't help.
    Device,
}

/// Errors of a scan invocation.
///
/// Every error aborts the invocation after releasing the buffers it acquired, no partial result is
/// ever returned.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The tile size must be at least one element.
    #[error("Invalid tile size: tiles must hold at least one element")]
    InvalidTileSize,

    /// The program text couldn't be read.
    #[error("Can't open the kernel source file {}\n{source}", .path.display())]
    SourceUnavailable {
        /// The requested file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The sequence can't be scanned with this tile size.
    #[error("Unsupported shape: {0}")]
    UnsupportedShape(#[from] ShapeError),

    /// A device buffer couldn't be created.
    #[error("Can't allocate the {buffer} buffer\n{source}")]
    AllocationFailure {
        /// Which buffer failed.
        buffer: &'static str,
        /// The backend error.
        #[source]
        source: AllocationError,
    },

    /// The program text failed to build. The build log is carried by the source error.
    #[error("Can't build the scan kernels\n{0}")]
    CompileError(#[from] CompilationError),

    /// A stage was rejected or failed on the device.
    #[error("Stage `{stage}` failed\n{source}")]
    LaunchFailure {
        /// The failing stage.
        stage: Stage,
        /// The backend error.
        #[source]
        source: LaunchError,
    },

    /// The result couldn't be copied to host memory.
    #[error("Can't read the result back\n{0}")]
    ReadbackFailure(#[from] IoError),
}

impl ScanError {
    /// Whether the caller or the device is responsible for the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::InvalidTileSize
            | ScanError::SourceUnavailable { .. }
            | ScanError::UnsupportedShape(_) => ErrorKind::Caller,
            ScanError::AllocationFailure { .. }
            | ScanError::CompileError(_)
            | ScanError::LaunchFailure { .. }
            | ScanError::ReadbackFailure(_) => ErrorKind::Device,
        }
    }
}
