use crate::error::ConfigError;
use crate::units::Pages;
use serde::Deserialize;

/// Engine-wide limits applied by a store on top of the limits each module
/// declares.
///
/// Tunables are usually loaded from the embedder's configuration file:
///
/// ```toml
/// max_memory_pages = 16384
/// max_table_size = 100000
/// ```
///
/// Keys that are left out keep their default value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    /// The largest memory, in wasm pages, any memory of the store may reach.
    pub max_memory_pages: Pages,

    /// The largest length any table of the store may reach.
    pub max_table_size: u32,

    /// The size in bytes of one slot of a module's jump table.
    pub jump_table_slot_size: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            max_memory_pages: Pages::max_value(),
            max_table_size: 10_000_000,
            jump_table_slot_size: 8,
        }
    }
}

impl Tunables {
    /// Parse tunables from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
