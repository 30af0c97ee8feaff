#![warn(missing_docs)]

//! Tile-parallel exclusive prefix sum.
//!
//! A sequence is cut in tiles of `tile_size` elements. Three kernels, each waited on before the
//! next one starts, compute the scan:
//!
//! 1. every tile is scanned by its own work-group, which also writes the tile total;
//! 2. a single work-group scans the tile totals into tile offsets, in place;
//! 3. every tile adds its offset to each of its elements.
//!
//! The device is any [ComputeServer](tilescan_runtime::server::ComputeServer). The
//! [host backend](tilescan_runtime::host) runs the kernels on CPU threads once the
//! [host kernels](register_scan_kernels) are registered.
//!
//! ```
//! let client = tilescan::host_client();
//! let output = tilescan::exclusive_scan(&client, &[3, 1, 4, 1, 5, 9, 2, 6], 4).unwrap();
//!
//! assert_eq!(output, vec![0, 3, 4, 8, 9, 14, 23, 25]);
//! ```

#[macro_use]
extern crate derive_new;

mod buffer;
mod error;
mod kernels;
mod plan;
mod reference;
mod scan;

/// Benchmark driver.
pub mod benchmark;
/// Launches of the three stages.
pub mod stages;

pub use buffer::*;
pub use error::*;
pub use kernels::*;
pub use plan::*;
pub use reference::*;
pub use scan::*;
