//! `wasmheap` re-exports the crates of the workspace under one roof.
//!
//! * [`types`]: value types, entity indexes, module metadata, tunables and
//!   the layout of the raw instance cache.
//! * [`vm`]: the managed heap and the instance object model living in it.

pub use wasmheap_types as types;
pub use wasmheap_vm as vm;
