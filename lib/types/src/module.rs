//! Data structure for representing the metadata of a compiled WebAssembly
//! module, as consumed by the runtime object model.

use crate::entity::{EntityRef, PrimaryMap};
use crate::indexes::{DataIndex, FunctionIndex, GlobalIndex, SignatureIndex, TagIndex};
use crate::types::{FunctionType, GlobalType, MemoryType, TableType};
use serde::{Deserialize, Serialize};

/// The source language a module was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleOrigin {
    /// A regular WebAssembly binary.
    Wasm,
    /// A module translated from asm.js source.
    AsmJs,
}

/// A data segment of the module's wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSegment {
    /// Offset of the segment's payload inside the wire bytes.
    pub offset: u32,
    /// Length of the payload in bytes.
    pub size: u32,
    /// Active segments are copied into memory at instantiation and are
    /// dropped afterwards; passive segments stay until `data.drop`.
    pub active: bool,
}

/// A translated module, as seen by the instance object model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// The name of this wasm module, often found in the wasm file.
    pub name: Option<String>,

    /// What the module was compiled from.
    pub origin: ModuleOrigin,

    /// WebAssembly function signatures.
    pub signatures: PrimaryMap<SignatureIndex, FunctionType>,

    /// WebAssembly functions (imported and local).
    pub functions: PrimaryMap<FunctionIndex, SignatureIndex>,

    /// Number of imported functions in the module.
    pub num_imported_functions: usize,

    /// WebAssembly global variables (imported and local).
    pub globals: PrimaryMap<GlobalIndex, GlobalType>,

    /// Number of imported globals in the module.
    pub num_imported_globals: usize,

    /// The memory of the module, if it declares or imports one.
    pub memory: Option<MemoryType>,

    /// The indirect function table of the module, if any.
    pub table: Option<TableType>,

    /// Exception tags (imported and local), by signature.
    pub tags: PrimaryMap<TagIndex, SignatureIndex>,

    /// Data segments.
    pub data_segments: PrimaryMap<DataIndex, DataSegment>,
}

impl ModuleInfo {
    /// Allocates the module data structures.
    pub fn new(origin: ModuleOrigin) -> Self {
        Self {
            name: None,
            origin,
            signatures: PrimaryMap::new(),
            functions: PrimaryMap::new(),
            num_imported_functions: 0,
            globals: PrimaryMap::new(),
            num_imported_globals: 0,
            memory: None,
            table: None,
            tags: PrimaryMap::new(),
            data_segments: PrimaryMap::new(),
        }
    }

    /// Test whether the given function index is for an imported function.
    pub fn is_imported_function(&self, index: FunctionIndex) -> bool {
        index.index() < self.num_imported_functions
    }

    /// Test whether the given global index is for an imported global.
    pub fn is_imported_global(&self, index: GlobalIndex) -> bool {
        index.index() < self.num_imported_globals
    }

    /// The number of functions defined by the module itself.
    pub fn num_declared_functions(&self) -> usize {
        self.functions.len() - self.num_imported_functions
    }

    /// The signature index of a function.
    pub fn function_signature(&self, index: FunctionIndex) -> SignatureIndex {
        self.functions[index]
    }

    /// The type of a function.
    pub fn function_type(&self, index: FunctionIndex) -> &FunctionType {
        &self.signatures[self.functions[index]]
    }

    /// Whether this module was translated from asm.js.
    pub fn is_asm_js(&self) -> bool {
        self.origin == ModuleOrigin::AsmJs
    }
}
