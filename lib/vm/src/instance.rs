//! An `InstanceObject` is the aggregate root of a live module instance: it
//! references its module, memory, table, globals and debug info in the
//! managed heap, owns its linkage arrays, and exposes the raw cache
//! (`VMContext`) that generated code reads.

mod entries;

pub use self::entries::{ImportedFunctionEntry, IndirectFunctionTableEntry};

use crate::vmcontext::{VMContext, VMSharedSignatureIndex};
use crate::{
    ArrayBuffer, DebugInfo, ExceptionTag, ExportsObject, GlobalObject, HostFunction,
    MemoryObject, ModuleObject, NativeModule, StoreHandle, StoreObjects, TableObject,
    VMFunctionBody,
};
use more_asserts::{assert_le, assert_lt};
use std::sync::Arc;
use std::{ptr, slice};
use tracing::debug;
use wasmheap_types::entity::EntityRef;
use wasmheap_types::{DataIndex, FunctionIndex, GlobalIndex, ModuleInfo, TagIndex};

/// The object a call target runs in: another instance for wasm-to-wasm
/// calls, a host function for calls leaving wasm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    /// The callee is compiled code of this instance.
    Instance(StoreHandle<InstanceObject>),
    /// The callee is provided by the host.
    HostFunction(StoreHandle<HostFunction>),
}

/// Arrays the instance owns outside the managed heap. The raw cache points
/// into them, so every reallocation is followed by a refresh of the cache.
#[derive(Debug)]
struct NativeAllocations {
    indirect_function_table_sig_ids: Vec<VMSharedSignatureIndex>,
    indirect_function_table_targets: Vec<*const VMFunctionBody>,
    imported_function_targets: Box<[*const VMFunctionBody]>,
    imported_mutable_globals: Box<[*mut u8]>,
    data_segment_starts: Box<[*const u8]>,
    data_segment_sizes: Box<[u32]>,
    dropped_data_segments: Box<[u8]>,
}

impl NativeAllocations {
    fn new(native_module: &NativeModule) -> Self {
        let module = native_module.module();
        let wire_bytes = native_module.wire_bytes();
        let segments = module.data_segments.values();
        let data_segment_starts = segments
            .clone()
            .map(|segment| {
                assert_le!(
                    segment.offset as usize + segment.size as usize,
                    wire_bytes.len(),
                    "data segment out of the wire bytes"
                );
                // Safety: checked to lie inside the wire bytes.
                unsafe { wire_bytes.as_ptr().add(segment.offset as usize) }
            })
            .collect();
        let data_segment_sizes = segments.clone().map(|segment| segment.size).collect();
        // Active segments were copied into memory during instantiation.
        let dropped_data_segments = segments.map(|segment| u8::from(segment.active)).collect();
        Self {
            indirect_function_table_sig_ids: Vec::new(),
            indirect_function_table_targets: Vec::new(),
            imported_function_targets: vec![ptr::null(); module.num_imported_functions]
                .into_boxed_slice(),
            imported_mutable_globals: vec![ptr::null_mut(); module.num_imported_globals]
                .into_boxed_slice(),
            data_segment_starts,
            data_segment_sizes,
            dropped_data_segments,
        }
    }
}

/// The raw-cache inputs that live in other objects of the store.
struct ManagedInputs {
    memory_start: *mut u8,
    memory_size: usize,
    globals_start: *mut u8,
    isolate_root: *const u8,
    stack_limit_address: *const usize,
    real_stack_limit_address: *const usize,
}

/// A live instance of a compiled module.
#[derive(Debug)]
pub struct InstanceObject {
    module_object: StoreHandle<ModuleObject>,
    native_module: Arc<NativeModule>,
    exports_object: ExportsObject,
    memory_object: Option<StoreHandle<MemoryObject>>,
    globals_buffer: Option<StoreHandle<ArrayBuffer>>,
    imported_mutable_globals_buffers: Option<Box<[Option<StoreHandle<ArrayBuffer>>]>>,
    debug_info: Option<StoreHandle<DebugInfo>>,
    table_object: Option<StoreHandle<TableObject>>,
    imported_function_refs: Box<[Option<ObjectRef>]>,
    indirect_function_table_refs: Option<Vec<Option<ObjectRef>>>,
    exceptions_table: Option<Box<[StoreHandle<ExceptionTag>]>>,
    native: NativeAllocations,
    vmctx: Box<VMContext>,
}

impl InstanceObject {
    /// Instantiates `module_object`: allocates the instance, registers it
    /// with its module and fills the raw cache.
    ///
    /// Memory, table, globals and imports are bound afterwards by the
    /// linker.
    pub fn new(
        store: &mut StoreObjects,
        module_object: StoreHandle<ModuleObject>,
    ) -> StoreHandle<Self> {
        let native_module = module_object.get(store).shared_native_module();
        let native = NativeAllocations::new(&native_module);
        let num_imported_functions = native_module.module().num_imported_functions;
        let instance = Self {
            module_object,
            native_module,
            exports_object: ExportsObject::new(),
            memory_object: None,
            globals_buffer: None,
            imported_mutable_globals_buffers: None,
            debug_info: None,
            table_object: None,
            imported_function_refs: vec![None; num_imported_functions].into_boxed_slice(),
            indirect_function_table_refs: None,
            exceptions_table: None,
            native,
            vmctx: Box::new(VMContext::empty()),
        };
        let handle = StoreHandle::new(store, instance);
        module_object.get_mut(store).register_instance(handle);
        Self::recompute_raw_caches(store, handle);
        debug!(
            module = ?handle.get(store).module().name,
            imported_functions = num_imported_functions,
            "created instance"
        );
        handle
    }

    /// Rebuilds the whole raw cache of `instance` from its managed state.
    ///
    /// Returns `false` if the instance was already collected.
    pub fn recompute_raw_caches(store: &mut StoreObjects, instance: StoreHandle<Self>) -> bool {
        let inputs = match instance.try_get(store) {
            Some(this) => this.managed_inputs(store),
            None => return false,
        };
        let this = instance.get_mut(store);
        let vmctx = &mut *this.vmctx;
        vmctx.memory_start = inputs.memory_start;
        vmctx.memory_size = inputs.memory_size;
        vmctx.memory_mask = inputs.memory_size.next_power_of_two().wrapping_sub(1);
        vmctx.globals_start = inputs.globals_start;
        vmctx.isolate_root = inputs.isolate_root;
        vmctx.stack_limit_address = inputs.stack_limit_address;
        vmctx.real_stack_limit_address = inputs.real_stack_limit_address;
        this.refresh_native_caches();
        true
    }

    fn managed_inputs(&self, store: &StoreObjects) -> ManagedInputs {
        let (memory_start, memory_size) = match self.memory_object {
            Some(memory) => {
                let buffer = memory.get(store).array_buffer().get(store);
                (buffer.backing_store(), buffer.byte_length())
            }
            None => (ptr::null_mut(), 0),
        };
        let globals_start = match self.globals_buffer {
            Some(buffer) => buffer.get(store).backing_store(),
            None => ptr::null_mut(),
        };
        ManagedInputs {
            memory_start,
            memory_size,
            globals_start,
            isolate_root: store.isolate_root(),
            stack_limit_address: store.stack_limit_address(),
            real_stack_limit_address: store.real_stack_limit_address(),
        }
    }

    /// Points the raw cache at the instance's own arrays again.
    fn refresh_native_caches(&mut self) {
        let native = &self.native;
        let vmctx = &mut *self.vmctx;
        vmctx.imported_function_targets = native.imported_function_targets.as_ptr();
        vmctx.imported_mutable_globals = native.imported_mutable_globals.as_ptr();
        vmctx.indirect_function_table_sig_ids = native.indirect_function_table_sig_ids.as_ptr();
        vmctx.indirect_function_table_targets = native.indirect_function_table_targets.as_ptr();
        vmctx.indirect_function_table_size = native.indirect_function_table_sig_ids.len() as u32;
        vmctx.jump_table_start = self.native_module.jump_table_start();
        vmctx.data_segment_starts = native.data_segment_starts.as_ptr();
        vmctx.data_segment_sizes = native.data_segment_sizes.as_ptr();
        vmctx.dropped_data_segments = native.dropped_data_segments.as_ptr();
    }

    /// Grows the indirect function table arrays to at least `minimum_size`
    /// slots. New slots are cleared. Returns whether the arrays changed.
    pub fn ensure_indirect_function_table_with_minimum_size(&mut self, minimum_size: u32) -> bool {
        if self.indirect_function_table_size() >= minimum_size {
            return false;
        }
        self.resize_indirect_function_table(minimum_size);
        true
    }

    /// Resizes the indirect function table arrays to exactly `size` slots,
    /// dropping the slots past it. New slots are cleared.
    pub(crate) fn resize_indirect_function_table(&mut self, size: u32) {
        let size = size as usize;
        self.native
            .indirect_function_table_sig_ids
            .resize(size, VMSharedSignatureIndex::default());
        self.native
            .indirect_function_table_targets
            .resize(size, ptr::null());
        self.indirect_function_table_refs
            .get_or_insert_with(Vec::new)
            .resize(size, None);
        self.refresh_native_caches();
    }

    /// Resolves function `index` of `instance` to the object it runs in and
    /// its call target. Imports resolve through the imported function
    /// entries, declared functions to their jump table slot.
    pub fn resolve_call_target(
        store: &StoreObjects,
        instance: StoreHandle<Self>,
        index: FunctionIndex,
    ) -> (ObjectRef, *const VMFunctionBody) {
        let this = instance.get(store);
        if this.module().is_imported_function(index) {
            let entry = ImportedFunctionEntry::new(this, index.index());
            let object_ref = match entry.object_ref() {
                Some(object_ref) => object_ref,
                None => panic!("imported function {} is not linked", index.index()),
            };
            (object_ref, entry.target())
        } else {
            (
                ObjectRef::Instance(instance),
                this.native_module.call_target(index),
            )
        }
    }

    /// Binds the buffer holding the instance's own globals.
    pub fn set_globals_buffer(
        store: &mut StoreObjects,
        instance: StoreHandle<Self>,
        buffer: StoreHandle<ArrayBuffer>,
    ) {
        instance.get_mut(store).globals_buffer = Some(buffer);
        Self::recompute_raw_caches(store, instance);
    }

    /// Links imported global `index` to the cell of `global`. The cell's
    /// buffer is kept alive by the instance.
    pub fn set_imported_mutable_global(
        store: &mut StoreObjects,
        instance: StoreHandle<Self>,
        index: GlobalIndex,
        global: StoreHandle<GlobalObject>,
    ) {
        let cell = *global.get(store);
        let address = cell.address(store);
        let this = instance.get_mut(store);
        let num_imported_globals = this.module().num_imported_globals;
        assert_lt!(index.index(), num_imported_globals, "global is not imported");
        this.imported_mutable_globals_buffers
            .get_or_insert_with(|| vec![None; num_imported_globals].into_boxed_slice())
            [index.index()] = Some(cell.array_buffer());
        this.native.imported_mutable_globals[index.index()] = address;
    }

    /// The cell address of imported global `index`, null until linked.
    pub fn imported_mutable_global_address(&self, index: GlobalIndex) -> *mut u8 {
        assert_lt!(index.index(), self.native.imported_mutable_globals.len());
        self.native.imported_mutable_globals[index.index()]
    }

    /// Creates the tag table: `imported` for the imported tags followed by
    /// a fresh tag per declared one.
    pub fn initialize_exceptions_table(
        store: &mut StoreObjects,
        instance: StoreHandle<Self>,
        imported: &[StoreHandle<ExceptionTag>],
    ) {
        let num_tags = instance.get(store).module().tags.len();
        assert_le!(imported.len(), num_tags, "more imported tags than declared");
        let mut table = Vec::with_capacity(num_tags);
        table.extend_from_slice(imported);
        for index in imported.len()..num_tags {
            table.push(StoreHandle::new(store, ExceptionTag::new(index as u32)));
        }
        instance.get_mut(store).exceptions_table = Some(table.into_boxed_slice());
    }

    /// The tag of declaration `index`.
    pub fn exception_tag(&self, index: TagIndex) -> StoreHandle<ExceptionTag> {
        self.exceptions_table()[index.index()]
    }

    /// The contents of data segment `index`; empty once dropped.
    pub fn data_segment(&self, index: DataIndex) -> &[u8] {
        let i = index.index();
        assert_lt!(i, self.native.data_segment_sizes.len());
        if self.native.dropped_data_segments[i] != 0 {
            return &[];
        }
        // Safety: the segment lies inside the wire bytes of the native
        // module, which the instance keeps alive.
        unsafe {
            slice::from_raw_parts(
                self.native.data_segment_starts[i],
                self.native.data_segment_sizes[i] as usize,
            )
        }
    }

    /// Drops data segment `index`, as `data.drop` does.
    pub fn drop_data_segment(&mut self, index: DataIndex) {
        let i = index.index();
        assert_lt!(i, self.native.dropped_data_segments.len());
        self.native.dropped_data_segments[i] = 1;
    }

    /// The module descriptor the instance was created from.
    pub fn module_object(&self) -> StoreHandle<ModuleObject> {
        self.module_object
    }

    /// The native module, borrowed.
    pub fn native_module(&self) -> &NativeModule {
        &self.native_module
    }

    /// A shared owner of the native module.
    pub fn shared_native_module(&self) -> Arc<NativeModule> {
        Arc::clone(&self.native_module)
    }

    /// The module metadata.
    pub fn module(&self) -> &ModuleInfo {
        self.native_module.module()
    }

    /// The exports of the instance.
    pub fn exports_object(&self) -> &ExportsObject {
        &self.exports_object
    }

    /// The exports of the instance, mutably.
    pub fn exports_object_mut(&mut self) -> &mut ExportsObject {
        &mut self.exports_object
    }

    /// The objects the imported functions run in, by import index.
    pub fn imported_function_refs(&self) -> &[Option<ObjectRef>] {
        &self.imported_function_refs
    }

    /// The number of imported functions.
    pub fn num_imported_functions(&self) -> usize {
        self.imported_function_refs.len()
    }

    /// The number of slots of the indirect function table arrays.
    pub fn indirect_function_table_size(&self) -> u32 {
        self.native.indirect_function_table_sig_ids.len() as u32
    }

    /// The raw cache.
    pub fn vmctx(&self) -> &VMContext {
        &self.vmctx
    }

    /// The address handed to generated code.
    pub fn vmctx_ptr(&self) -> *const VMContext {
        &*self.vmctx
    }

    pub(crate) fn set_memory_object(&mut self, memory: StoreHandle<MemoryObject>) {
        self.memory_object = Some(memory);
    }

    pub(crate) fn set_table_object(&mut self, table: StoreHandle<TableObject>) {
        self.table_object = Some(table);
    }

    pub(crate) fn set_debug_info(&mut self, debug_info: StoreHandle<DebugInfo>) {
        self.debug_info = Some(debug_info);
    }

    optional_accessors! {
        /// The memory bound to the instance.
        has_memory_object, memory_object: memory_object -> StoreHandle<MemoryObject>;
        /// The buffer holding the instance's own globals.
        has_globals_buffer, globals_buffer: globals_buffer -> StoreHandle<ArrayBuffer>;
        /// The buffers of the imported mutable globals, by import index.
        has_imported_mutable_globals_buffers, imported_mutable_globals_buffers:
            imported_mutable_globals_buffers -> Box<[Option<StoreHandle<ArrayBuffer>>]>;
        /// The debug info attached to the instance.
        has_debug_info, debug_info: debug_info -> StoreHandle<DebugInfo>;
        /// The table the instance dispatches indirect calls through.
        has_table_object, table_object: table_object -> StoreHandle<TableObject>;
        /// The objects the indirect function table slots run in.
        has_indirect_function_table_refs, indirect_function_table_refs:
            indirect_function_table_refs -> Vec<Option<ObjectRef>>;
        /// The exception tags, by declaration index.
        has_exceptions_table, exceptions_table: exceptions_table -> Box<[StoreHandle<ExceptionTag>]>;
    }
}
