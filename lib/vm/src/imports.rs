use crate::{FunctionBodyPtr, StoreHandle, StoreObjects, VMSharedSignatureIndex};
use wasmheap_types::FunctionType;

/// A function provided by the host and imported by instances.
#[derive(Debug)]
pub struct HostFunction {
    name: String,
    signature: VMSharedSignatureIndex,
    body: FunctionBodyPtr,
}

impl HostFunction {
    /// Registers a host function of type `ty` whose wrapper starts at `body`.
    pub fn new(
        store: &mut StoreObjects,
        name: impl Into<String>,
        ty: &FunctionType,
        body: FunctionBodyPtr,
    ) -> StoreHandle<Self> {
        let signature = store.signatures_mut().register(ty);
        StoreHandle::new(
            store,
            Self {
                name: name.into(),
                signature,
                body,
            },
        )
    }

    /// The name the host gave the function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical signature of the function.
    pub fn signature(&self) -> VMSharedSignatureIndex {
        self.signature
    }

    /// The wrapper that adapts calls from generated code.
    pub fn body(&self) -> FunctionBodyPtr {
        self.body
    }
}
