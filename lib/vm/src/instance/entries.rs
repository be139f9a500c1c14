use super::{InstanceObject, ObjectRef};
use crate::export::ResolvedCall;
use crate::vmcontext::VMSharedSignatureIndex;
use crate::{FunctionBodyPtr, HostFunction, StoreHandle, VMFunctionBody};
use more_asserts::assert_lt;
use std::ops::{Deref, DerefMut};
use std::ptr;

/// A slot of an instance's indirect function table.
///
/// The slot is stored in three parallel arrays: signature id, call target
/// and the object the target runs in. Writes go through `set`,
/// `set_from_function` or `clear`, which update all three together.
///
/// Reading needs a shared reference to the instance; writing needs a
/// mutable one.
#[derive(Debug)]
pub struct IndirectFunctionTableEntry<I> {
    instance: I,
    index: usize,
}

impl<I> IndirectFunctionTableEntry<I>
where
    I: Deref<Target = InstanceObject>,
{
    /// Selects slot `index`. Panics unless the slot exists.
    pub fn new(instance: I, index: usize) -> Self {
        assert_lt!(
            index,
            instance.indirect_function_table_size() as usize,
            "indirect function table index out of bounds"
        );
        Self { instance, index }
    }

    /// The canonical signature of the slot's function.
    pub fn sig_id(&self) -> VMSharedSignatureIndex {
        self.instance.native.indirect_function_table_sig_ids[self.index]
    }

    /// Where calls through the slot jump to.
    pub fn target(&self) -> *const VMFunctionBody {
        self.instance.native.indirect_function_table_targets[self.index]
    }

    /// The object the slot's function runs in.
    pub fn object_ref(&self) -> Option<ObjectRef> {
        self.instance.indirect_function_table_refs()[self.index]
    }
}

impl<I> IndirectFunctionTableEntry<I>
where
    I: DerefMut<Target = InstanceObject>,
{
    /// Fills the slot.
    pub fn set(
        &mut self,
        sig_id: VMSharedSignatureIndex,
        target: *const VMFunctionBody,
        object_ref: ObjectRef,
    ) {
        self.write(sig_id, target, Some(object_ref));
    }

    /// Fills the slot with a function resolved by
    /// [`ExportedFunctionData::resolve`](crate::ExportedFunctionData::resolve).
    pub fn set_from_function(&mut self, function: &ResolvedCall) {
        self.set(function.signature_id, function.target, function.object_ref);
    }

    /// Empties the slot. Calls through it fail their signature check.
    pub fn clear(&mut self) {
        self.write(VMSharedSignatureIndex::default(), ptr::null(), None);
    }

    fn write(
        &mut self,
        sig_id: VMSharedSignatureIndex,
        target: *const VMFunctionBody,
        object_ref: Option<ObjectRef>,
    ) {
        let index = self.index;
        let instance = &mut *self.instance;
        instance.native.indirect_function_table_sig_ids[index] = sig_id;
        instance.native.indirect_function_table_targets[index] = target;
        if let Some(refs) = instance.indirect_function_table_refs.as_mut() {
            refs[index] = object_ref;
        }
    }
}

/// An imported function of an instance: its call target and the object
/// the target runs in.
#[derive(Debug)]
pub struct ImportedFunctionEntry<I> {
    instance: I,
    index: usize,
}

impl<I> ImportedFunctionEntry<I>
where
    I: Deref<Target = InstanceObject>,
{
    /// Selects import `index`. Panics unless the import exists.
    pub fn new(instance: I, index: usize) -> Self {
        assert_lt!(
            index,
            instance.num_imported_functions(),
            "imported function index out of bounds"
        );
        Self { instance, index }
    }

    /// Where calls to the import jump to.
    pub fn target(&self) -> *const VMFunctionBody {
        self.instance.native.imported_function_targets[self.index]
    }

    /// The object the import runs in.
    pub fn object_ref(&self) -> Option<ObjectRef> {
        self.instance.imported_function_refs[self.index]
    }

    /// The host function behind the import, if it leaves wasm.
    pub fn callable(&self) -> Option<StoreHandle<HostFunction>> {
        match self.object_ref() {
            Some(ObjectRef::HostFunction(function)) => Some(function),
            _ => None,
        }
    }
}

impl<I> ImportedFunctionEntry<I>
where
    I: DerefMut<Target = InstanceObject>,
{
    /// Links the import to compiled code of `callee`.
    pub fn set_wasm_to_wasm(
        &mut self,
        callee: StoreHandle<InstanceObject>,
        target: *const VMFunctionBody,
    ) {
        self.write(target, ObjectRef::Instance(callee));
    }

    /// Links the import to a host function called through `wrapper`.
    pub fn set_wasm_to_host(
        &mut self,
        function: StoreHandle<HostFunction>,
        wrapper: FunctionBodyPtr,
    ) {
        self.write(wrapper.0, ObjectRef::HostFunction(function));
    }

    fn write(&mut self, target: *const VMFunctionBody, object_ref: ObjectRef) {
        let index = self.index;
        let instance = &mut *self.instance;
        instance.native.imported_function_targets[index] = target;
        instance.imported_function_refs[index] = Some(object_ref);
    }
}
