//! The raw instance cache read by generated code.
//!
//! Every field here is derived from the managed state of an instance and is
//! rebuilt by `InstanceObject::recompute_raw_caches` whenever that state
//! changes shape.

use crate::VMFunctionBody;
use std::ptr;

/// An index into the shared signature registry, usable for checking
/// signatures at indirect calls.
#[repr(C)]
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct VMSharedSignatureIndex(u32);

impl VMSharedSignatureIndex {
    /// Create a new `VMSharedSignatureIndex`.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw index.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// The signature id of a cleared table slot. It never matches a registered
/// signature, so a call through a cleared slot fails its signature check.
impl Default for VMSharedSignatureIndex {
    fn default() -> Self {
        Self::new(u32::MAX)
    }
}


/// The raw cache of an instance.
///
/// Generated code receives a pointer to this structure and reads the fields
/// at the offsets given by `VMOffsets`. All pointers target memory that does
/// not move when the store's object lists grow: boxed slices owned by the
/// instance, the backing store of an array buffer, the code space of the
/// native module or the store's stack guard.
#[derive(Debug)]
#[repr(C, align(16))]
pub struct VMContext {
    pub(crate) memory_start: *mut u8,
    pub(crate) memory_size: usize,
    pub(crate) memory_mask: usize,
    pub(crate) isolate_root: *const u8,
    pub(crate) stack_limit_address: *const usize,
    pub(crate) real_stack_limit_address: *const usize,
    pub(crate) imported_function_targets: *const *const VMFunctionBody,
    pub(crate) globals_start: *mut u8,
    pub(crate) imported_mutable_globals: *const *mut u8,
    pub(crate) indirect_function_table_sig_ids: *const VMSharedSignatureIndex,
    pub(crate) indirect_function_table_targets: *const *const VMFunctionBody,
    pub(crate) jump_table_start: *const VMFunctionBody,
    pub(crate) data_segment_starts: *const *const u8,
    pub(crate) data_segment_sizes: *const u32,
    pub(crate) dropped_data_segments: *const u8,
    pub(crate) indirect_function_table_size: u32,
    // If more elements are added here, remember to add offset_of tests below!
}

impl VMContext {
    pub(crate) fn empty() -> Self {
        Self {
            memory_start: ptr::null_mut(),
            memory_size: 0,
            memory_mask: 0,
            isolate_root: ptr::null(),
            stack_limit_address: ptr::null(),
            real_stack_limit_address: ptr::null(),
            imported_function_targets: ptr::null(),
            globals_start: ptr::null_mut(),
            imported_mutable_globals: ptr::null(),
            indirect_function_table_sig_ids: ptr::null(),
            indirect_function_table_targets: ptr::null(),
            jump_table_start: ptr::null(),
            data_segment_starts: ptr::null(),
            data_segment_sizes: ptr::null(),
            dropped_data_segments: ptr::null(),
            indirect_function_table_size: 0,
        }
    }

    /// Start of the bound linear memory, or null when no memory is bound.
    pub fn memory_start(&self) -> *mut u8 {
        self.memory_start
    }

    /// Byte length of the bound linear memory.
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// `memory_size.next_power_of_two() - 1`, used to mask untrusted indices.
    pub fn memory_mask(&self) -> usize {
        self.memory_mask
    }

    /// Address of the store's per-thread root data.
    pub fn isolate_root(&self) -> *const u8 {
        self.isolate_root
    }

    /// Address of the stack limit checked by function prologues.
    pub fn stack_limit_address(&self) -> *const usize {
        self.stack_limit_address
    }

    /// Address of the stack limit that is never lowered for interrupts.
    pub fn real_stack_limit_address(&self) -> *const usize {
        self.real_stack_limit_address
    }

    /// Call targets of the imported functions.
    pub fn imported_function_targets(&self) -> *const *const VMFunctionBody {
        self.imported_function_targets
    }

    /// Start of the globals buffer.
    pub fn globals_start(&self) -> *mut u8 {
        self.globals_start
    }

    /// Cell addresses of the imported mutable globals.
    pub fn imported_mutable_globals(&self) -> *const *mut u8 {
        self.imported_mutable_globals
    }

    /// Signature ids of the indirect function table slots.
    pub fn indirect_function_table_sig_ids(&self) -> *const VMSharedSignatureIndex {
        self.indirect_function_table_sig_ids
    }

    /// Call targets of the indirect function table slots.
    pub fn indirect_function_table_targets(&self) -> *const *const VMFunctionBody {
        self.indirect_function_table_targets
    }

    /// Number of slots of the indirect function table.
    pub fn indirect_function_table_size(&self) -> u32 {
        self.indirect_function_table_size
    }

    /// Start of the native module's jump table.
    pub fn jump_table_start(&self) -> *const VMFunctionBody {
        self.jump_table_start
    }

    /// Start addresses of the data segments.
    pub fn data_segment_starts(&self) -> *const *const u8 {
        self.data_segment_starts
    }

    /// Byte lengths of the data segments.
    pub fn data_segment_sizes(&self) -> *const u32 {
        self.data_segment_sizes
    }

    /// One byte per data segment, non-zero once the segment was dropped.
    pub fn dropped_data_segments(&self) -> *const u8 {
        self.dropped_data_segments
    }
}

#[cfg(test)]
mod test_vmcontext {
    use super::VMContext;
    use memoffset::offset_of;
    use std::mem::{align_of, size_of};
    use wasmheap_types::{VMOffsets, VMCONTEXT_ALIGNMENT};

    #[test]
    fn check_vmcontext_offsets() {
        let offsets = VMOffsets::for_host();
        assert_eq!(size_of::<VMContext>(), offsets.size_of_vmctx() as usize);
        assert_eq!(align_of::<VMContext>(), VMCONTEXT_ALIGNMENT as usize);
        assert_eq!(
            offset_of!(VMContext, memory_start),
            offsets.vmctx_memory_start() as usize
        );
        assert_eq!(
            offset_of!(VMContext, memory_size),
            offsets.vmctx_memory_size() as usize
        );
        assert_eq!(
            offset_of!(VMContext, memory_mask),
            offsets.vmctx_memory_mask() as usize
        );
        assert_eq!(
            offset_of!(VMContext, isolate_root),
            offsets.vmctx_isolate_root() as usize
        );
        assert_eq!(
            offset_of!(VMContext, stack_limit_address),
            offsets.vmctx_stack_limit_address() as usize
        );
        assert_eq!(
            offset_of!(VMContext, real_stack_limit_address),
            offsets.vmctx_real_stack_limit_address() as usize
        );
        assert_eq!(
            offset_of!(VMContext, imported_function_targets),
            offsets.vmctx_imported_function_targets() as usize
        );
        assert_eq!(
            offset_of!(VMContext, globals_start),
            offsets.vmctx_globals_start() as usize
        );
        assert_eq!(
            offset_of!(VMContext, imported_mutable_globals),
            offsets.vmctx_imported_mutable_globals() as usize
        );
        assert_eq!(
            offset_of!(VMContext, indirect_function_table_sig_ids),
            offsets.vmctx_indirect_function_table_sig_ids() as usize
        );
        assert_eq!(
            offset_of!(VMContext, indirect_function_table_targets),
            offsets.vmctx_indirect_function_table_targets() as usize
        );
        assert_eq!(
            offset_of!(VMContext, jump_table_start),
            offsets.vmctx_jump_table_start() as usize
        );
        assert_eq!(
            offset_of!(VMContext, data_segment_starts),
            offsets.vmctx_data_segment_starts() as usize
        );
        assert_eq!(
            offset_of!(VMContext, data_segment_sizes),
            offsets.vmctx_data_segment_sizes() as usize
        );
        assert_eq!(
            offset_of!(VMContext, dropped_data_segments),
            offsets.vmctx_dropped_data_segments() as usize
        );
        assert_eq!(
            offset_of!(VMContext, indirect_function_table_size),
            offsets.vmctx_indirect_function_table_size() as usize
        );
    }
}
