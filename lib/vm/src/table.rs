//! Function tables and the instances dispatching through them.

use crate::{
    ExportedFunctionData, IndirectFunctionTableEntry, InstanceObject, ResolvedCall, StoreHandle,
    StoreObjects,
};
use tracing::{debug, trace, warn};
use wasmheap_types::{TableError, TableType, Type};

/// An instance whose indirect function table mirrors a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTable {
    /// The mirroring instance. Held weakly.
    pub instance: StoreHandle<InstanceObject>,
    /// The index of the table inside the instance.
    pub table_index: u32,
}

/// A resizable sequence of nullable function references.
#[derive(Debug)]
pub struct TableObject {
    functions: Vec<Option<StoreHandle<ExportedFunctionData>>>,
    maximum_length: Option<u32>,
    dispatch_tables: Vec<DispatchTable>,
}

impl TableObject {
    /// Creates a table of `ty.minimum` empty slots. Only `funcref` tables
    /// are supported.
    pub fn new(store: &mut StoreObjects, ty: &TableType) -> Result<StoreHandle<Self>, TableError> {
        if ty.ty != Type::FuncRef {
            return Err(TableError::UnsupportedElementType(ty.ty));
        }
        let max_allowed = Self::max_allowed(store, ty.maximum);
        if ty.minimum > max_allowed {
            return Err(TableError::MinimumTableTooLarge {
                min_requested: ty.minimum,
                max_allowed,
            });
        }
        Ok(StoreHandle::new(
            store,
            Self {
                functions: vec![None; ty.minimum as usize],
                maximum_length: ty.maximum,
                dispatch_tables: Vec::new(),
            },
        ))
    }

    fn max_allowed(store: &StoreObjects, maximum: Option<u32>) -> u32 {
        let engine_limit = store.tunables().max_table_size;
        maximum.map_or(engine_limit, |maximum| maximum.min(engine_limit))
    }

    /// The number of slots.
    pub fn current_length(&self) -> u32 {
        self.functions.len() as u32
    }

    /// The declared maximum, if any.
    pub fn maximum_length(&self) -> Option<u32> {
        self.maximum_length
    }

    /// The instances mirroring the table, collected ones included until
    /// the next growth prunes them.
    pub fn dispatch_tables(&self) -> &[DispatchTable] {
        &self.dispatch_tables
    }

    /// The function in slot `index`.
    pub fn get(&self, index: u32) -> Result<Option<StoreHandle<ExportedFunctionData>>, TableError> {
        self.functions
            .get(index as usize)
            .copied()
            .ok_or(TableError::AccessOutOfBounds {
                index,
                length: self.current_length(),
            })
    }

    /// Records `instance` as dispatching through `table` at `table_index`.
    ///
    /// Table 0 is the one mirrored into the instance's indirect function
    /// table: its arrays are resized to exactly the table's length and every
    /// slot is filled from the table. A table previously bound at index 0
    /// stops updating the instance. Other indices are only recorded.
    pub fn add_dispatch_table(
        store: &mut StoreObjects,
        table: StoreHandle<Self>,
        instance: StoreHandle<InstanceObject>,
        table_index: u32,
    ) {
        if table_index != 0 {
            table.get_mut(store).dispatch_tables.push(DispatchTable {
                instance,
                table_index,
            });
            debug!(table_index, "recorded dispatch table");
            return;
        }

        let owner = instance.get(store);
        if owner.has_table_object() {
            let previous = *owner.table_object();
            if let Some(previous) = previous.try_get_mut(store) {
                previous.dispatch_tables.retain(|dispatch| {
                    !(dispatch.instance == instance && dispatch.table_index == 0)
                });
            }
        }

        let this = table.get_mut(store);
        this.dispatch_tables.push(DispatchTable {
            instance,
            table_index,
        });
        let functions = this.functions.clone();
        let resolved: Vec<Option<ResolvedCall>> = functions
            .iter()
            .map(|function| function.map(|function| ExportedFunctionData::resolve(store, function)))
            .collect();

        let owner = instance.get_mut(store);
        owner.set_table_object(table);
        owner.resize_indirect_function_table(resolved.len() as u32);
        for (index, function) in resolved.iter().enumerate() {
            let mut entry = IndirectFunctionTableEntry::new(&mut *owner, index);
            match function {
                Some(function) => entry.set_from_function(function),
                None => entry.clear(),
            }
        }
        debug!(length = resolved.len(), "added dispatch table");
    }

    /// Stores `function` in slot `index` and updates the slot in every
    /// live instance mirroring the table at index 0.
    pub fn set(
        store: &mut StoreObjects,
        table: StoreHandle<Self>,
        index: u32,
        function: Option<StoreHandle<ExportedFunctionData>>,
    ) -> Result<(), TableError> {
        let length = table.get(store).current_length();
        if index >= length {
            return Err(TableError::AccessOutOfBounds { index, length });
        }
        let resolved = function.map(|function| ExportedFunctionData::resolve(store, function));
        let this = table.get_mut(store);
        this.functions[index as usize] = function;
        let dispatch_tables = this.dispatch_tables.clone();

        for dispatch in dispatch_tables.iter().filter(|dispatch| dispatch.table_index == 0) {
            let owner = match dispatch.instance.try_get_mut(store) {
                Some(owner) => owner,
                None => continue,
            };
            let mut entry = IndirectFunctionTableEntry::new(owner, index as usize);
            match &resolved {
                Some(function) => entry.set_from_function(function),
                None => entry.clear(),
            }
        }
        Ok(())
    }

    /// Appends `delta` empty slots to `table` and returns the previous
    /// length. Every live instance mirroring the table at index 0 is resized
    /// before this returns; collected ones are dropped. On failure nothing is
    /// changed.
    pub fn grow(
        store: &mut StoreObjects,
        table: StoreHandle<Self>,
        delta: u32,
    ) -> Result<u32, TableError> {
        let this = table.get(store);
        let old_length = this.current_length();
        let max_allowed = Self::max_allowed(store, this.maximum_length);
        let new_length = match old_length.checked_add(delta) {
            Some(new_length) if new_length <= max_allowed => new_length,
            _ => {
                warn!(
                    current = old_length,
                    delta,
                    maximum = max_allowed,
                    "refused to grow table"
                );
                return Err(TableError::CouldNotGrow {
                    current: old_length,
                    attempted_delta: delta,
                });
            }
        };

        let this = table.get_mut(store);
        this.functions.resize(new_length as usize, None);
        let dispatch_tables = std::mem::take(&mut this.dispatch_tables);

        let mut live = Vec::with_capacity(dispatch_tables.len());
        for dispatch in dispatch_tables {
            match dispatch.instance.try_get_mut(store) {
                Some(owner) => {
                    if dispatch.table_index == 0 {
                        owner.ensure_indirect_function_table_with_minimum_size(new_length);
                    }
                    live.push(dispatch);
                }
                None => trace!(table_index = dispatch.table_index, "pruned collected dispatch table"),
            }
        }
        let instances = live.len();
        table.get_mut(store).dispatch_tables = live;

        debug!(
            from = old_length,
            to = new_length,
            instances, "grew table"
        );
        Ok(old_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmheap_types::Tunables;

    fn funcref(minimum: u32, maximum: Option<u32>) -> TableType {
        TableType::new(Type::FuncRef, minimum, maximum)
    }

    #[test_log::test]
    fn length_tracks_growth() {
        let mut store = StoreObjects::default();
        let table = TableObject::new(&mut store, &funcref(2, Some(4))).unwrap();
        assert_eq!(table.get(&store).current_length(), 2);
        assert_eq!(TableObject::grow(&mut store, table, 2), Ok(2));
        assert_eq!(table.get(&store).current_length(), 4);
        assert_eq!(table.get(&store).get(3), Ok(None));
    }

    #[test_log::test]
    fn growth_beyond_the_maximum_fails_without_change() {
        let mut store = StoreObjects::default();
        let table = TableObject::new(&mut store, &funcref(2, Some(3))).unwrap();
        assert_eq!(
            TableObject::grow(&mut store, table, 2),
            Err(TableError::CouldNotGrow {
                current: 2,
                attempted_delta: 2,
            })
        );
        assert_eq!(table.get(&store).current_length(), 2);
    }

    #[test_log::test]
    fn tunables_cap_the_length() {
        let tunables = Tunables {
            max_table_size: 8,
            ..Tunables::default()
        };
        let mut store = StoreObjects::new(tunables);
        assert_eq!(
            TableObject::new(&mut store, &funcref(9, None)).unwrap_err(),
            TableError::MinimumTableTooLarge {
                min_requested: 9,
                max_allowed: 8,
            }
        );
        let table = TableObject::new(&mut store, &funcref(8, None)).unwrap();
        assert!(TableObject::grow(&mut store, table, 1).is_err());
    }

    #[test_log::test]
    fn out_of_bounds_access_is_an_error() {
        let mut store = StoreObjects::default();
        let table = TableObject::new(&mut store, &funcref(1, None)).unwrap();
        assert_eq!(
            table.get(&store).get(1),
            Err(TableError::AccessOutOfBounds { index: 1, length: 1 })
        );
        assert_eq!(
            TableObject::set(&mut store, table, 1, None),
            Err(TableError::AccessOutOfBounds { index: 1, length: 1 })
        );
    }

    #[test_log::test]
    fn only_funcref_tables_are_supported() {
        let mut store = StoreObjects::default();
        assert_eq!(
            TableObject::new(&mut store, &TableType::new(Type::ExternRef, 1, None)).unwrap_err(),
            TableError::UnsupportedElementType(Type::ExternRef)
        );
        assert_eq!(store.count::<TableObject>(), 0);
    }
}
