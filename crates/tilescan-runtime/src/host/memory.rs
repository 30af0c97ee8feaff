use crate::server::BufferFlags;
use core::sync::atomic::{AtomicU32, Ordering};

const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// Word addressed memory of a host buffer.
///
/// Words are atomics accessed with relaxed ordering: units of different work-groups may touch the
/// same buffer concurrently, and writes only become visible to other groups once the launch
/// returned.
#[derive(Debug)]
pub struct DeviceMemory {
    words: Box<[AtomicU32]>,
    size: usize,
    flags: BufferFlags,
}

impl DeviceMemory {
    /// Reserves `size` bytes, zero-filled or copied from `init`.
    ///
    /// `init` must have exactly `size` bytes when provided.
    pub fn new(size: usize, flags: BufferFlags, init: Option<&[u8]>) -> Self {
        let words = (0..size.div_ceil(WORD_SIZE))
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let memory = Self { words, size, flags };

        if let Some(data) = init {
            memory.copy_from(data);
        }

        memory
    }

    /// The size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The access flags.
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Copies the content into a host vector of `size` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * WORD_SIZE);
        for word in self.words.iter() {
            bytes.extend_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
        }
        bytes.truncate(self.size);
        bytes
    }

    /// Overwrites the content with host data of at most `size` bytes.
    pub fn copy_from(&self, data: &[u8]) {
        for (word, chunk) in self.words.iter().zip(data.chunks(WORD_SIZE)) {
            let mut raw = [0u8; WORD_SIZE];
            raw[..chunk.len()].copy_from_slice(chunk);
            word.store(u32::from_ne_bytes(raw), Ordering::Relaxed);
        }
    }

    /// A 32-bit element view usable by kernels.
    pub fn as_array(&self) -> GlobalArray<'_> {
        GlobalArray {
            words: &self.words[..self.size / WORD_SIZE],
            writable: self.flags.contains(BufferFlags::WRITE),
        }
    }
}

/// A view of a buffer as 32-bit signed integers, as seen by a kernel.
#[derive(Debug, Clone, Copy)]
pub struct GlobalArray<'a> {
    words: &'a [AtomicU32],
    writable: bool,
}

impl GlobalArray<'_> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the array has no element.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Whether kernels may store into the array.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Loads the element at `index`, `None` when out of bounds.
    pub fn load(&self, index: usize) -> Option<i32> {
        self.words
            .get(index)
            .map(|word| word.load(Ordering::Relaxed) as i32)
    }

    /// Stores the element at `index`, returns false when out of bounds or read-only.
    pub fn store(&self, index: usize, value: i32) -> bool {
        match self.words.get(index) {
            Some(word) if self.writable => {
                word.store(value as u32, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }
}
