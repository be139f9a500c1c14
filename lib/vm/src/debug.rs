//! Per-instance debugging state.

use crate::{FunctionBodyPtr, InstanceObject, StoreHandle, StoreObjects, WrapperCode};
use fnv::FnvHashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use wasmheap_types::entity::EntityRef;
use wasmheap_types::{FunctionIndex, FunctionType};

/// The debugger's interpreter attached to an instance. Opaque to the
/// runtime.
#[derive(Clone)]
pub struct InterpreterHandle(Arc<dyn Any + Send + Sync>);

impl InterpreterHandle {
    /// Wraps the interpreter state.
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self(Arc::new(state))
    }

    /// Downcasts the interpreter state.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for InterpreterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterpreterHandle").finish()
    }
}

/// Debugging state of one instance.
#[derive(Debug)]
pub struct DebugInfo {
    wasm_instance: StoreHandle<InstanceObject>,
    interpreter_handle: Option<InterpreterHandle>,
    interpreted_functions: Box<[Option<FunctionBodyPtr>]>,
    locals_names: Option<Vec<Vec<String>>>,
    c_wasm_entries: Option<Vec<WrapperCode>>,
    c_wasm_entry_map: Option<FnvHashMap<FunctionType, usize>>,
}

impl DebugInfo {
    /// Returns the debug info of `instance`, creating it on first use.
    pub fn attach(
        store: &mut StoreObjects,
        instance: StoreHandle<InstanceObject>,
    ) -> StoreHandle<Self> {
        let owner = instance.get(store);
        if owner.has_debug_info() {
            return *owner.debug_info();
        }
        let num_functions = owner.module().functions.len();
        let debug_info = StoreHandle::new(
            store,
            Self {
                wasm_instance: instance,
                interpreter_handle: None,
                interpreted_functions: vec![None; num_functions].into_boxed_slice(),
                locals_names: None,
                c_wasm_entries: None,
                c_wasm_entry_map: None,
            },
        );
        instance.get_mut(store).set_debug_info(debug_info);
        debug!(functions = num_functions, "attached debug info");
        debug_info
    }

    /// The instance being debugged.
    pub fn wasm_instance(&self) -> StoreHandle<InstanceObject> {
        self.wasm_instance
    }

    /// Attaches the debugger's interpreter.
    pub fn set_interpreter_handle(&mut self, handle: InterpreterHandle) {
        self.interpreter_handle = Some(handle);
    }

    /// The entry stub of a function redirected to the interpreter.
    pub fn interpreted_function(&self, index: FunctionIndex) -> Option<FunctionBodyPtr> {
        self.interpreted_functions[index.index()]
    }

    /// Redirects a function to the interpreter through `entry`.
    pub fn set_interpreted_function(&mut self, index: FunctionIndex, entry: FunctionBodyPtr) {
        self.interpreted_functions[index.index()] = Some(entry);
    }

    /// Records the local variable names, by function then local index.
    pub fn set_locals_names(&mut self, names: Vec<Vec<String>>) {
        self.locals_names = Some(names);
    }

    /// The entry that calls wasm code of signature `sig` from C, compiling
    /// it with `compile` the first time it is requested.
    pub fn get_c_wasm_entry(
        store: &mut StoreObjects,
        debug_info: StoreHandle<Self>,
        sig: &FunctionType,
        compile: impl FnOnce(&FunctionType) -> FunctionBodyPtr,
    ) -> WrapperCode {
        let signature = store.signatures_mut().register(sig);
        let this = debug_info.get_mut(store);
        let entries = this.c_wasm_entries.get_or_insert_with(Vec::new);
        let map = this.c_wasm_entry_map.get_or_insert_with(FnvHashMap::default);
        if let Some(&index) = map.get(sig) {
            return entries[index];
        }
        let entry = WrapperCode {
            signature,
            instruction_start: compile(sig),
        };
        map.insert(sig.clone(), entries.len());
        entries.push(entry);
        entry
    }

    optional_accessors! {
        /// The debugger's interpreter.
        has_interpreter_handle, interpreter_handle: interpreter_handle -> InterpreterHandle;
        /// Local variable names, by function then local index.
        has_locals_names, locals_names: locals_names -> Vec<Vec<String>>;
        /// The compiled C-to-wasm entries.
        has_c_wasm_entries, c_wasm_entries: c_wasm_entries -> Vec<WrapperCode>;
        /// The index into `c_wasm_entries` of each signature.
        has_c_wasm_entry_map, c_wasm_entry_map: c_wasm_entry_map -> FnvHashMap<FunctionType, usize>;
    }
}
