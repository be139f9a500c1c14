use crate::{
    ExceptionTag, GlobalObject, InstanceObject, MemoryObject, ObjectRef, StoreHandle,
    StoreObjects, TableObject, VMFunctionBody, VMSharedSignatureIndex, WrapperCode,
};
use indexmap::IndexMap;
use wasmheap_types::FunctionIndex;

/// The data behind an exported function: enough to call it from the host
/// through its wrapper, or to place it into a table.
#[derive(Debug, Clone)]
pub struct ExportedFunctionData {
    wrapper_code: WrapperCode,
    instance: StoreHandle<InstanceObject>,
    jump_table_offset: i32,
    function_index: FunctionIndex,
    signature_id: VMSharedSignatureIndex,
}

impl ExportedFunctionData {
    /// Describes function `function_index` of `instance`.
    ///
    /// Imported functions have no jump table slot; their offset is `-1`.
    pub fn new(
        store: &mut StoreObjects,
        instance: StoreHandle<InstanceObject>,
        function_index: FunctionIndex,
        wrapper_code: WrapperCode,
    ) -> StoreHandle<Self> {
        let owner = instance.get(store);
        let native_module = owner.shared_native_module();
        let module = native_module.module();
        let jump_table_offset = if module.is_imported_function(function_index) {
            -1
        } else {
            native_module.jump_table_offset(function_index) as i32
        };
        let signature = module.function_type(function_index).clone();
        let signature_id = store.signatures_mut().register(&signature);
        StoreHandle::new(
            store,
            Self {
                wrapper_code,
                instance,
                jump_table_offset,
                function_index,
                signature_id,
            },
        )
    }

    /// The wrapper called by the host.
    pub fn wrapper_code(&self) -> WrapperCode {
        self.wrapper_code
    }

    /// The instance the function belongs to.
    pub fn instance(&self) -> StoreHandle<InstanceObject> {
        self.instance
    }

    /// The byte offset of the function's jump table slot, `-1` for imports.
    pub fn jump_table_offset(&self) -> i32 {
        self.jump_table_offset
    }

    /// The index of the function in its module.
    pub fn function_index(&self) -> FunctionIndex {
        self.function_index
    }

    /// The canonical signature of the function.
    pub fn signature_id(&self) -> VMSharedSignatureIndex {
        self.signature_id
    }

    /// Resolves what a table slot holding this function must contain.
    pub fn resolve(store: &StoreObjects, function: StoreHandle<Self>) -> ResolvedCall {
        let data = function.get(store);
        let (object_ref, target) =
            InstanceObject::resolve_call_target(store, data.instance, data.function_index);
        ResolvedCall {
            signature_id: data.signature_id,
            target,
            object_ref,
        }
    }
}

/// The three values an indirect function table slot holds for one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCall {
    /// The canonical signature of the callee.
    pub signature_id: VMSharedSignatureIndex,
    /// Where calls jump to.
    pub target: *const VMFunctionBody,
    /// The object the callee runs in.
    pub object_ref: ObjectRef,
}

/// An exported entity of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    /// A function export.
    Function(StoreHandle<ExportedFunctionData>),
    /// A table export.
    Table(StoreHandle<TableObject>),
    /// A memory export.
    Memory(StoreHandle<MemoryObject>),
    /// A global export.
    Global(StoreHandle<GlobalObject>),
    /// An exception tag export.
    Exception(StoreHandle<ExceptionTag>),
}

/// The exports of an instance, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ExportsObject {
    exports: IndexMap<String, Export>,
}

impl ExportsObject {
    /// Create an empty exports object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an export, replacing any previous export of the same name.
    pub fn insert(&mut self, name: impl Into<String>, export: Export) -> Option<Export> {
        self.exports.insert(name.into(), export)
    }

    /// Looks up an export by name.
    pub fn get(&self, name: &str) -> Option<Export> {
        self.exports.get(name).copied()
    }

    /// Iterates over the exports in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Export)> + '_ {
        self.exports.iter().map(|(name, export)| (name.as_str(), *export))
    }

    /// The number of exports.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether there is no export.
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}
