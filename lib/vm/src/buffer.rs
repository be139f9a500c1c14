//! Off-heap byte buffers backing memories and globals.

use memmap2::MmapMut;
use std::ptr::NonNull;
use wasmheap_types::MemoryError;

/// A zero-initialized byte buffer mapped outside the managed heap.
///
/// The backing store never moves while the buffer is attached, so raw caches
/// may hold its address. Detaching unmaps the bytes and leaves an empty
/// buffer behind.
#[derive(Debug)]
pub struct ArrayBuffer {
    // `None` for empty and detached buffers: anonymous mappings cannot be
    // empty.
    mmap: Option<MmapMut>,
    ptr: NonNull<u8>,
    detached: bool,
}

impl ArrayBuffer {
    /// Maps a zeroed buffer of `byte_length` bytes.
    pub fn new(byte_length: usize) -> Result<Self, MemoryError> {
        if byte_length == 0 {
            return Ok(Self::empty());
        }
        let mut mmap = MmapMut::map_anon(byte_length).map_err(|e| {
            MemoryError::Region(format!("failed to map {} bytes: {}", byte_length, e))
        })?;
        let ptr = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| MemoryError::Region("mapped a null address".to_string()))?;
        Ok(Self {
            mmap: Some(mmap),
            ptr,
            detached: false,
        })
    }

    fn empty() -> Self {
        Self {
            mmap: None,
            ptr: NonNull::<u128>::dangling().cast(),
            detached: false,
        }
    }

    /// Maps a buffer holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemoryError> {
        let mut buffer = Self::new(bytes.len())?;
        buffer.as_mut_slice().copy_from_slice(bytes);
        Ok(buffer)
    }

    /// The address of the first byte. Empty buffers report an aligned,
    /// non-null address that must not be dereferenced.
    pub fn backing_store(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// The length in bytes. Zero once detached.
    pub fn byte_length(&self) -> usize {
        self.mmap.as_ref().map_or(0, |mmap| mmap.len())
    }

    /// Whether the bytes were released by [`ArrayBuffer::detach`].
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// The contents of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => mmap,
            None => &[],
        }
    }

    /// The contents of the buffer, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.mmap {
            Some(mmap) => mmap,
            None => &mut [],
        }
    }

    /// Unmaps the bytes. Anything still holding the old backing store
    /// address must have been repointed before this is called.
    pub fn detach(&mut self) {
        *self = Self::empty();
        self.detached = true;
    }
}
