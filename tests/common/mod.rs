#![allow(dead_code)]

use std::ptr;
use wasmheap::types::{FunctionType, ModuleInfo, ModuleOrigin, Type};
use wasmheap::vm::{
    FunctionBodyPtr, InstanceObject, Managed, ModuleObject, NativeModule, StoreHandle,
    StoreObjects, VMFunctionBody, WrapperCode,
};

/// The signature of every function of the test modules.
pub fn unary_i32() -> FunctionType {
    FunctionType::new(vec![Type::I32], vec![Type::I32])
}

/// A module with `imported` imported and `declared` declared functions.
pub fn module(
    store: &mut StoreObjects,
    imported: usize,
    declared: usize,
) -> StoreHandle<ModuleObject> {
    let mut info = ModuleInfo::new(ModuleOrigin::Wasm);
    info.name = Some("test".to_string());
    let sig = info.signatures.push(unary_i32());
    for _ in 0..imported + declared {
        info.functions.push(sig);
    }
    info.num_imported_functions = imported;
    let native = NativeModule::new(info, Vec::<u8>::new(), store.tunables());
    let size = native.estimated_size();
    let module = ModuleObject::new(
        Managed::new(native, size),
        Vec::<WrapperCode>::new(),
        "test.wasm",
        None,
    )
    .expect("wasm module without offset table");
    StoreHandle::new(store, module)
}

/// An instance of a fresh module.
pub fn instance(
    store: &mut StoreObjects,
    imported: usize,
    declared: usize,
) -> StoreHandle<InstanceObject> {
    let module = module(store, imported, declared);
    InstanceObject::new(store, module)
}

/// A fake code address, distinct per `n`.
pub fn body(n: usize) -> FunctionBodyPtr {
    FunctionBodyPtr((0x1000 + 0x10 * n) as *const VMFunctionBody)
}

/// A wrapper that is never called.
pub fn wrapper(store: &mut StoreObjects) -> WrapperCode {
    WrapperCode {
        signature: store.signatures_mut().register(&unary_i32()),
        instruction_start: FunctionBodyPtr(ptr::null()),
    }
}
