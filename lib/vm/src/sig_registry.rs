//! Implement a registry of function signatures, for fast indirect call
//! signature checking.

use crate::vmcontext::VMSharedSignatureIndex;
use fnv::FnvHashMap;
use more_asserts::{assert_lt, debug_assert_lt};
use std::collections::hash_map;
use wasmheap_types::FunctionType;

/// WebAssembly requires that the caller and callee signatures in an indirect
/// call must match. To implement this efficiently, keep a registry of all
/// signatures, shared by all instances of a store, so that call sites can
/// just do an index comparison.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    signature2index: FnvHashMap<FunctionType, VMSharedSignatureIndex>,
    index2signature: Vec<FunctionType>,
}

impl SignatureRegistry {
    /// Create a new `SignatureRegistry`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a signature and return its unique index.
    pub fn register(&mut self, sig: &FunctionType) -> VMSharedSignatureIndex {
        let len = self.index2signature.len();
        match self.signature2index.entry(sig.clone()) {
            hash_map::Entry::Occupied(entry) => *entry.get(),
            hash_map::Entry::Vacant(entry) => {
                // Keep the registry under 2**32 entries: u32::MAX is reserved
                // for VMSharedSignatureIndex::default().
                debug_assert_lt!(
                    len,
                    u32::MAX as usize,
                    "Invariant check: signature registry len < u32::MAX"
                );
                let sig_id = VMSharedSignatureIndex::new(u32::try_from(len).unwrap_or(u32::MAX));
                entry.insert(sig_id);
                self.index2signature.push(sig.clone());
                sig_id
            }
        }
    }

    /// Looks up a shared signature index within this registry.
    ///
    /// Note that for this operation to be semantically correct the `idx` must
    /// have previously come from a call to `register` of this same object.
    pub fn lookup(&self, idx: VMSharedSignatureIndex) -> Option<&FunctionType> {
        self.index2signature.get(idx.as_u32() as usize)
    }

    /// The number of distinct signatures registered.
    pub fn len(&self) -> usize {
        self.index2signature.len()
    }

    /// Whether no signature was registered yet.
    pub fn is_empty(&self) -> bool {
        self.index2signature.is_empty()
    }
}
