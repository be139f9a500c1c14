//! Offsets and sizes of the fields of the raw instance cache (`VMContext`)
//! that generated code reads directly.

/// Align an offset used in this module to a specific byte-width by rounding up
#[inline]
const fn align(offset: u32, width: u32) -> u32 {
    (offset + (width - 1)) / width * width
}

/// The alignment of the raw instance cache.
pub const VMCONTEXT_ALIGNMENT: u32 = 16;

/// This class computes offsets to fields within `VMContext` that generated
/// code accesses directly.
///
/// Every pointer-sized field precedes the single `u32` field, so an offset is
/// its position in the field order times the pointer size.
// Invariant: the addresses always fit into an u32 without overflowing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VMOffsets {
    /// The size in bytes of a pointer on the target.
    pointer_size: u8,
}

impl VMOffsets {
    /// Return a new `VMOffsets` instance, for a given pointer size.
    pub fn new(pointer_size: u8) -> Self {
        Self { pointer_size }
    }

    /// Return a new `VMOffsets` instance, for a host's pointer size.
    pub fn for_host() -> Self {
        Self::new(std::mem::size_of::<*const u8>() as u8)
    }

    /// The size in bytes of a pointer on the target.
    pub fn pointer_size(&self) -> u8 {
        self.pointer_size
    }

    fn slot(&self, n: u32) -> u32 {
        n * u32::from(self.pointer_size)
    }
}

/// Offsets for `VMContext`.
impl VMOffsets {
    /// The offset of the `memory_start` field.
    pub fn vmctx_memory_start(&self) -> u32 {
        self.slot(0)
    }

    /// The offset of the `memory_size` field.
    pub fn vmctx_memory_size(&self) -> u32 {
        self.slot(1)
    }

    /// The offset of the `memory_mask` field.
    pub fn vmctx_memory_mask(&self) -> u32 {
        self.slot(2)
    }

    /// The offset of the `isolate_root` field.
    pub fn vmctx_isolate_root(&self) -> u32 {
        self.slot(3)
    }

    /// The offset of the `stack_limit_address` field.
    pub fn vmctx_stack_limit_address(&self) -> u32 {
        self.slot(4)
    }

    /// The offset of the `real_stack_limit_address` field.
    pub fn vmctx_real_stack_limit_address(&self) -> u32 {
        self.slot(5)
    }

    /// The offset of the `imported_function_targets` field.
    pub fn vmctx_imported_function_targets(&self) -> u32 {
        self.slot(6)
    }

    /// The offset of the `globals_start` field.
    pub fn vmctx_globals_start(&self) -> u32 {
        self.slot(7)
    }

    /// The offset of the `imported_mutable_globals` field.
    pub fn vmctx_imported_mutable_globals(&self) -> u32 {
        self.slot(8)
    }

    /// The offset of the `indirect_function_table_sig_ids` field.
    pub fn vmctx_indirect_function_table_sig_ids(&self) -> u32 {
        self.slot(9)
    }

    /// The offset of the `indirect_function_table_targets` field.
    pub fn vmctx_indirect_function_table_targets(&self) -> u32 {
        self.slot(10)
    }

    /// The offset of the `jump_table_start` field.
    pub fn vmctx_jump_table_start(&self) -> u32 {
        self.slot(11)
    }

    /// The offset of the `data_segment_starts` field.
    pub fn vmctx_data_segment_starts(&self) -> u32 {
        self.slot(12)
    }

    /// The offset of the `data_segment_sizes` field.
    pub fn vmctx_data_segment_sizes(&self) -> u32 {
        self.slot(13)
    }

    /// The offset of the `dropped_data_segments` field.
    pub fn vmctx_dropped_data_segments(&self) -> u32 {
        self.slot(14)
    }

    /// The offset of the `indirect_function_table_size` field.
    pub fn vmctx_indirect_function_table_size(&self) -> u32 {
        self.slot(15)
    }

    /// The size of the `VMContext` allocation.
    pub fn size_of_vmctx(&self) -> u32 {
        align(
            self.vmctx_indirect_function_table_size() + 4,
            VMCONTEXT_ALIGNMENT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_align() {
        assert_eq!(align(124, 16), 128);
        assert_eq!(align(128, 16), 128);
        assert_eq!(align(0, 16), 0);
    }

    #[test]
    fn layout_for_64_bit_targets() {
        let offsets = VMOffsets::new(8);
        assert_eq!(offsets.vmctx_memory_mask(), 16);
        assert_eq!(offsets.vmctx_jump_table_start(), 88);
        assert_eq!(offsets.vmctx_indirect_function_table_size(), 120);
        assert_eq!(offsets.size_of_vmctx(), 128);
    }

    #[test]
    fn layout_for_32_bit_targets() {
        let offsets = VMOffsets::new(4);
        assert_eq!(offsets.vmctx_indirect_function_table_size(), 60);
        assert_eq!(offsets.size_of_vmctx(), 64);
    }
}
