//! Compiled code and metadata shared by a module and all of its instances.

use crate::{FunctionBodyPtr, VMFunctionBody, VMSharedSignatureIndex};
use more_asserts::assert_lt;
use std::fmt;
use std::sync::Arc;
use wasmheap_types::entity::EntityRef;
use wasmheap_types::{FunctionIndex, ModuleInfo, Tunables};

/// Shared ownership of an off-heap native object from inside the managed
/// heap.
///
/// The object is released when the last `Managed` (or `Arc` handed out by
/// [`Managed::get`]) goes away. `estimated_size` is what the object is
/// reported to weigh for the collector's external memory accounting.
pub struct Managed<T> {
    inner: Arc<T>,
    estimated_size: usize,
}

impl<T> Managed<T> {
    /// Takes ownership of `value`.
    pub fn new(value: T, estimated_size: usize) -> Self {
        Self::from_shared(Arc::new(value), estimated_size)
    }

    /// Shares an object that already has other owners.
    pub fn from_shared(inner: Arc<T>, estimated_size: usize) -> Self {
        Self {
            inner,
            estimated_size,
        }
    }

    /// A new shared owner of the object.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.inner)
    }

    /// Borrows the object without taking a reference count.
    pub fn raw(&self) -> &T {
        &self.inner
    }

    /// The size reported for external memory accounting.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            estimated_size: self.estimated_size,
        }
    }
}

impl<T> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("owners", &Arc::strong_count(&self.inner))
            .field("estimated_size", &self.estimated_size)
            .finish()
    }
}

/// Entry point of a compiled wrapper, tagged with its canonical signature.
#[derive(Debug, Clone, Copy)]
pub struct WrapperCode {
    /// The signature the wrapper adapts.
    pub signature: VMSharedSignatureIndex,
    /// The first instruction of the wrapper.
    pub instruction_start: FunctionBodyPtr,
}

/// The native part of a compiled module: its metadata, its wire bytes and
/// the code space holding one jump table slot per declared function.
pub struct NativeModule {
    module: Arc<ModuleInfo>,
    wire_bytes: Box<[u8]>,
    code_space: Box<[u8]>,
    jump_table_slot_size: u32,
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.module.name)
            .field("wire_bytes", &self.wire_bytes.len())
            .field("code_space", &self.code_space.len())
            .finish()
    }
}

impl NativeModule {
    /// Lays out the code space of `module`.
    pub fn new(module: ModuleInfo, wire_bytes: impl Into<Box<[u8]>>, tunables: &Tunables) -> Self {
        let jump_table_slot_size = tunables.jump_table_slot_size.max(1);
        let code_size = module.num_declared_functions() * jump_table_slot_size as usize;
        Self {
            module: Arc::new(module),
            wire_bytes: wire_bytes.into(),
            code_space: vec![0u8; code_size].into_boxed_slice(),
            jump_table_slot_size,
        }
    }

    /// The module metadata.
    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    /// A shared owner of the module metadata.
    pub fn shared_module(&self) -> Arc<ModuleInfo> {
        Arc::clone(&self.module)
    }

    /// The original bytes of the module.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire_bytes
    }

    /// The first jump table slot.
    pub fn jump_table_start(&self) -> *const VMFunctionBody {
        self.code_space.as_ptr() as *const VMFunctionBody
    }

    /// The byte offset of the jump table slot of a declared function.
    pub fn jump_table_offset(&self, index: FunctionIndex) -> u32 {
        let imported = self.module.num_imported_functions;
        assert!(
            index.index() >= imported,
            "{:?} is imported and has no jump table slot",
            index
        );
        assert_lt!(index.index(), self.module.functions.len());
        (index.index() - imported) as u32 * self.jump_table_slot_size
    }

    /// The call target of a declared function: its jump table slot.
    pub fn call_target(&self, index: FunctionIndex) -> *const VMFunctionBody {
        let offset = self.jump_table_offset(index) as usize;
        // Safety: the offset is inside the code space.
        unsafe { self.jump_table_start().add(offset) }
    }

    /// What the native module weighs outside the managed heap.
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.wire_bytes.len() + self.code_space.len()
    }
}
