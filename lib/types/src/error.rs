//! The errors reported by the runtime object model.
use crate::{ModuleOrigin, Pages, Type};
use thiserror::Error;

/// Error type describing things that can go wrong when operating on Wasm Memories.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryError {
    /// Low level error when allocating the backing buffer.
    #[error("Error when allocating memory: {0}")]
    Region(String),
    /// The operation would cause the size of the memory to exceed the maximum or would cause
    /// an overflow leading to unindexable memory.
    #[error("The memory could not grow: current size {} pages, requested increase: {} pages", current.0, attempted_delta.0)]
    CouldNotGrow {
        /// The current size in pages.
        current: Pages,
        /// The attempted amount to grow by in pages.
        attempted_delta: Pages,
    },
    /// Caller asked for more minimum memory than we can give them.
    #[error("The minimum requested ({} pages) memory is greater than the maximum allowed memory ({} pages)", min_requested.0, max_allowed.0)]
    MinimumMemoryTooLarge {
        /// The number of pages requested as the minimum amount of memory.
        min_requested: Pages,
        /// The maximum amount of memory we can allocate.
        max_allowed: Pages,
    },
    /// Caller asked for a maximum memory greater than we can give them.
    #[error("The maximum requested memory ({} pages) is greater than the maximum allowed memory ({} pages)", max_requested.0, max_allowed.0)]
    MaximumMemoryTooLarge {
        /// The number of pages requested as the maximum amount of memory.
        max_requested: Pages,
        /// The number of pages requested as the maximum amount of memory.
        max_allowed: Pages,
    },
}

/// Error type describing things that can go wrong when operating on Wasm Tables.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableError {
    /// The operation would cause the length of the table to exceed its maximum.
    #[error("The table could not grow: current length {current}, requested increase: {attempted_delta}")]
    CouldNotGrow {
        /// The current number of elements.
        current: u32,
        /// The attempted amount to grow by.
        attempted_delta: u32,
    },
    /// Caller asked for a longer initial table than allowed.
    #[error("The minimum requested table length ({min_requested}) is greater than the maximum allowed ({max_allowed})")]
    MinimumTableTooLarge {
        /// The requested initial length.
        min_requested: u32,
        /// The largest length allowed.
        max_allowed: u32,
    },
    /// Only `funcref` tables can be created.
    #[error("tables of element type {0} are not supported")]
    UnsupportedElementType(Type),
    /// An element outside of the table was accessed.
    #[error("table access out of bounds: index {index}, length {length}")]
    AccessOutOfBounds {
        /// The accessed index.
        index: u32,
        /// The current table length.
        length: u32,
    },
}

/// Error building a module descriptor out of compiled module parts.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleError {
    /// The declared origin of the module disagrees with the presence of an
    /// asm.js offset table.
    #[error("module of origin {origin:?} {}", if *has_offset_table { "must not carry an asm.js offset table" } else { "requires an asm.js offset table" })]
    InconsistentOrigin {
        /// The origin declared by the compiled module.
        origin: ModuleOrigin,
        /// Whether an offset table was supplied.
        has_offset_table: bool,
    },
}

/// Error loading the runtime tunables.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration text could not be parsed.
    #[error("invalid tunables: {0}")]
    Parse(#[from] toml::de::Error),
}
