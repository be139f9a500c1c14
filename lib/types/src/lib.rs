//! This are the common types shared by the wasmheap runtime crates.
//!
//! This crate provides the value and limit types of module instances,
//! entity indexes, the compiled-module metadata consumed by the
//! runtime, the tunable engine limits and the layout of the raw
//! instance cache read by generated code.

#![deny(missing_docs, unused_extern_crates)]
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

pub mod error;
mod indexes;
mod module;
mod store_id;
mod tunables;
mod types;
mod units;
mod vmoffsets;

/// The entity module, with common helpers for Rust structures
pub mod entity {
    pub use cranelift_entity::{entity_impl, EntityRef, PrimaryMap};
}

pub use crate::error::{ConfigError, MemoryError, ModuleError, TableError};
pub use crate::indexes::{DataIndex, FunctionIndex, GlobalIndex, SignatureIndex, TagIndex};
pub use crate::module::{DataSegment, ModuleInfo, ModuleOrigin};
pub use crate::store_id::StoreId;
pub use crate::tunables::Tunables;
pub use crate::types::{FunctionType, GlobalType, MemoryType, Mutability, TableType, Type};
pub use crate::units::{Bytes, PageCountOutOfRange, Pages, WASM_MAX_PAGES, WASM_PAGE_SIZE};
pub use crate::vmoffsets::{VMOffsets, VMCONTEXT_ALIGNMENT};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
