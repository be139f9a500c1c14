//! Runtime object model for wasmheap instances.
//!
//! Every object of the model lives in a [`StoreObjects`] heap and is
//! addressed through a generational [`StoreHandle`]. Next to that canonical
//! state each instance keeps a [`VMContext`]: raw addresses derived from the
//! managed objects, read directly by generated code and recomputed whenever
//! a memory, table or buffer changes shape.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::new_without_default))]
#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::float_arithmetic,
        clippy::mut_mut,
        clippy::nonminimal_bool,
        clippy::map_unwrap_or,
        clippy::print_stdout,
        clippy::unicode_not_nfc,
        clippy::use_self
    )
)]

/// Generates a `has_X` predicate and an `X` accessor for an `Option` field.
/// The accessor panics when the field is not set.
macro_rules! optional_accessors {
    ($($(#[$meta:meta])* $has:ident, $get:ident: $field:ident -> $ty:ty;)*) => {
        $(
            #[doc = concat!("Whether `", stringify!($field), "` is set.")]
            pub fn $has(&self) -> bool {
                self.$field.is_some()
            }

            $(#[$meta])*
            ///
            /// Panics if the field is not set.
            pub fn $get(&self) -> &$ty {
                match &self.$field {
                    Some(value) => value,
                    None => panic!(concat!("`", stringify!($field), "` accessed while not set")),
                }
            }
        )*
    };
}

mod buffer;
mod debug;
mod exception;
mod export;
mod global;
mod imports;
mod instance;
mod memory;
mod module;
mod native_module;
mod sig_registry;
mod store;
mod table;
mod vmcontext;

pub use crate::buffer::ArrayBuffer;
pub use crate::debug::{DebugInfo, InterpreterHandle};
pub use crate::exception::{ExceptionObject, ExceptionTag};
pub use crate::export::{Export, ExportedFunctionData, ExportsObject, ResolvedCall};
pub use crate::global::{GlobalFlags, GlobalObject};
pub use crate::imports::HostFunction;
pub use crate::instance::{
    ImportedFunctionEntry, IndirectFunctionTableEntry, InstanceObject, ObjectRef,
};
pub use crate::memory::MemoryObject;
pub use crate::module::{
    AsmJsOffsetEntry, AsmWasmData, BreakpointInfo, ModuleObject, Script, ScriptKind,
};
pub use crate::native_module::{Managed, NativeModule, WrapperCode};
pub use crate::sig_registry::SignatureRegistry;
pub use crate::store::{
    ObjectList, StackGuard, StoreHandle, StoreObject, StoreObjects, WeakHandleList,
};
pub use crate::table::{DispatchTable, TableObject};
pub use crate::vmcontext::{VMContext, VMSharedSignatureIndex};
pub use wasmheap_types::{MemoryError, ModuleError, TableError, VMOffsets};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A placeholder byte-sized type which is just used to provide some amount of type
/// safety when dealing with pointers to compiled function bodies. Note that it's
/// deliberately not Copy, as we shouldn't be carelessly copying function body bytes
/// around.
#[repr(C)]
pub struct VMFunctionBody(u8);


/// A safe wrapper around `VMFunctionBody`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct FunctionBodyPtr(pub *const VMFunctionBody);

impl std::ops::Deref for FunctionBodyPtr {
    type Target = *const VMFunctionBody;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// # Safety
/// The VMFunctionBody that this points to is opaque, so there's no data to
/// read or write through this pointer. This is essentially a usize.
unsafe impl Send for FunctionBodyPtr {}
/// # Safety
/// The VMFunctionBody that this points to is opaque, so there's no data to
/// read or write through this pointer. This is essentially a usize.
unsafe impl Sync for FunctionBodyPtr {}
