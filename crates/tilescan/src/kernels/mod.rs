mod host;

pub use host::*;

use crate::{ScanError, Stage};
use std::{borrow::Cow, path::Path};
use tilescan_runtime::{KernelId, client::ComputeClient, server::ComputeServer};

/// OpenCL C program text declaring the `scan_tiles`, `scan_group` and `uniform_add` kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    text: Cow<'static, str>,
}

impl Default for KernelSource {
    fn default() -> Self {
        Self {
            text: Cow::Borrowed(include_str!("scan.cl")),
        }
    }
}

impl KernelSource {
    /// Program text loaded by the caller.
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: Cow::Owned(text.into()),
        }
    }

    /// Reads the program text from a `.cl` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| ScanError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        log::debug!("Loaded {} bytes of kernel source from {}", text.len(), path.display());
        Ok(Self::new(text))
    }

    /// The program text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The compiled kernels of every stage, released when dropped.
#[derive(Debug)]
pub struct ScanKernels<S: ComputeServer> {
    client: ComputeClient<S>,
    // Indexed by stage.
    kernels: Vec<KernelId>,
}

impl<S: ComputeServer> ScanKernels<S> {
    /// Builds the entry of every stage from the program text.
    pub fn compile(client: &ComputeClient<S>, source: &KernelSource) -> Result<Self, ScanError> {
        let mut compiled = Self {
            client: client.clone(),
            kernels: Vec::with_capacity(Stage::ALL.len()),
        };

        for stage in Stage::ALL {
            let kernel = client.compile(source.text(), stage.entry())?;
            compiled.kernels.push(kernel);
        }

        Ok(compiled)
    }

    /// The client the kernels were compiled with.
    pub fn client(&self) -> &ComputeClient<S> {
        &self.client
    }

    /// The kernel executing the stage.
    pub fn id(&self, stage: Stage) -> KernelId {
        self.kernels[stage as usize]
    }
}

impl<S: ComputeServer> Drop for ScanKernels<S> {
    fn drop(&mut self) {
        for kernel in self.kernels.drain(..) {
            if let Err(err) = self.client.release_kernel(kernel) {
                log::warn!("Can't release kernel {kernel}: {err}");
            }
        }
    }
}
