//! Linear memories and their growth.

use crate::{ArrayBuffer, InstanceObject, StoreHandle, StoreObjects, WeakHandleList};
use tracing::{debug, warn};
use wasmheap_types::{Bytes, MemoryError, MemoryType, Pages, WASM_PAGE_SIZE};

/// A linear memory: one contiguous buffer plus the instances whose raw
/// caches point into it.
#[derive(Debug)]
pub struct MemoryObject {
    array_buffer: StoreHandle<ArrayBuffer>,
    maximum_pages: Option<Pages>,
    instances: Option<WeakHandleList<InstanceObject>>,
}

impl MemoryObject {
    /// Creates a zeroed memory of `ty.minimum` pages.
    pub fn new(store: &mut StoreObjects, ty: &MemoryType) -> Result<StoreHandle<Self>, MemoryError> {
        Self::check_limits(store, ty.minimum, ty.maximum)?;
        let buffer = ArrayBuffer::new(ty.minimum.bytes().0)?;
        let array_buffer = StoreHandle::new(store, buffer);
        Ok(Self::from_buffer(store, array_buffer, ty.maximum))
    }

    /// Wraps an existing buffer whose length is a whole number of pages.
    pub fn from_buffer(
        store: &mut StoreObjects,
        array_buffer: StoreHandle<ArrayBuffer>,
        maximum: Option<Pages>,
    ) -> StoreHandle<Self> {
        debug_assert_eq!(
            array_buffer.get(store).byte_length() % WASM_PAGE_SIZE,
            0
        );
        StoreHandle::new(
            store,
            Self {
                array_buffer,
                maximum_pages: maximum,
                instances: None,
            },
        )
    }

    fn check_limits(
        store: &StoreObjects,
        initial: Pages,
        maximum: Option<Pages>,
    ) -> Result<(), MemoryError> {
        let max_allowed = store.tunables().max_memory_pages.min(Pages::max_value());
        if let Some(maximum) = maximum {
            if maximum > Pages::max_value() {
                return Err(MemoryError::MaximumMemoryTooLarge {
                    max_requested: maximum,
                    max_allowed: Pages::max_value(),
                });
            }
        }
        let max_allowed = maximum.map_or(max_allowed, |maximum| maximum.min(max_allowed));
        if initial > max_allowed {
            return Err(MemoryError::MinimumMemoryTooLarge {
                min_requested: initial,
                max_allowed,
            });
        }
        Ok(())
    }

    /// The buffer currently backing the memory.
    pub fn array_buffer(&self) -> StoreHandle<ArrayBuffer> {
        self.array_buffer
    }

    /// The declared maximum, if any.
    pub fn maximum_pages(&self) -> Option<Pages> {
        self.maximum_pages
    }

    /// Whether the memory declares a maximum.
    pub fn has_maximum_pages(&self) -> bool {
        self.maximum_pages.is_some()
    }

    /// The current size in pages.
    pub fn current_pages(&self, store: &StoreObjects) -> Pages {
        let bytes = Bytes(self.array_buffer.get(store).byte_length());
        Pages::try_from(bytes).unwrap_or_else(|_| Pages::max_value())
    }

    /// Binds `instance` to `memory`: the instance caches the memory's
    /// buffer, and is updated whenever the memory grows.
    pub fn add_instance(
        store: &mut StoreObjects,
        memory: StoreHandle<Self>,
        instance: StoreHandle<InstanceObject>,
    ) {
        memory
            .get_mut(store)
            .instances
            .get_or_insert_with(WeakHandleList::new)
            .push(instance);
        instance.get_mut(store).set_memory_object(memory);
        InstanceObject::recompute_raw_caches(store, instance);
        debug!(
            pages = memory.get(store).current_pages(store).0,
            "bound memory to instance"
        );
    }

    /// Grows `memory` by `delta` pages and returns the previous size.
    ///
    /// The contents move to a new buffer; the old buffer is detached once
    /// every live bound instance points at the new one. On failure nothing
    /// is changed.
    pub fn grow(
        store: &mut StoreObjects,
        memory: StoreHandle<Self>,
        delta: Pages,
    ) -> Result<Pages, MemoryError> {
        let this = memory.get(store);
        let old_pages = this.current_pages(store);
        let max_allowed = store.tunables().max_memory_pages.min(Pages::max_value());
        let maximum = this
            .maximum_pages
            .map_or(max_allowed, |maximum| maximum.min(max_allowed));
        let new_pages = match old_pages.checked_add(delta) {
            Some(new_pages) if new_pages <= maximum => new_pages,
            _ => {
                warn!(
                    current = old_pages.0,
                    delta = delta.0,
                    maximum = maximum.0,
                    "refused to grow memory"
                );
                return Err(MemoryError::CouldNotGrow {
                    current: old_pages,
                    attempted_delta: delta,
                });
            }
        };
        if delta.0 == 0 {
            return Ok(old_pages);
        }

        let old_buffer = this.array_buffer;
        let mut new_buffer = ArrayBuffer::new(new_pages.bytes().0)?;
        let old_contents = old_buffer.get(store).as_slice();
        new_buffer.as_mut_slice()[..old_contents.len()].copy_from_slice(old_contents);
        let new_buffer = StoreHandle::new(store, new_buffer);
        memory.get_mut(store).array_buffer = new_buffer;

        let mut updated = 0;
        if let Some(mut instances) = memory.get_mut(store).instances.take() {
            instances.prune(store);
            for instance in instances.live(store).collect::<Vec<_>>() {
                if InstanceObject::recompute_raw_caches(store, instance) {
                    updated += 1;
                }
            }
            memory.get_mut(store).instances = Some(instances);
        }
        old_buffer.get_mut(store).detach();

        debug!(
            from = old_pages.0,
            to = new_pages.0,
            instances = updated,
            "grew memory"
        );
        Ok(old_pages)
    }

    optional_accessors! {
        /// The instances bound to the memory.
        has_instances, instances: instances -> WeakHandleList<InstanceObject>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wasmheap_types::Tunables;

    #[test_log::test]
    fn new_memories_respect_their_limits() {
        let mut store = StoreObjects::default();
        let memory = MemoryObject::new(&mut store, &MemoryType::new(Pages(2), Some(Pages(4)))).unwrap();
        assert_eq!(memory.get(&store).current_pages(&store), Pages(2));
        assert!(memory.get(&store).has_maximum_pages());
        assert!(!memory.get(&store).has_instances());

        assert_eq!(
            MemoryObject::new(&mut store, &MemoryType::new(Pages(5), Some(Pages(4)))).unwrap_err(),
            MemoryError::MinimumMemoryTooLarge {
                min_requested: Pages(5),
                max_allowed: Pages(4),
            }
        );
        assert!(matches!(
            MemoryObject::new(&mut store, &MemoryType::new(Pages(0), Some(Pages(0x10001)))),
            Err(MemoryError::MaximumMemoryTooLarge { .. })
        ));
    }

    #[test_log::test]
    fn growth_copies_and_detaches() {
        let mut store = StoreObjects::default();
        let memory = MemoryObject::new(&mut store, &MemoryType::new(Pages(1), None)).unwrap();
        let old = memory.get(&store).array_buffer();
        old.get_mut(&mut store).as_mut_slice()[WASM_PAGE_SIZE - 1] = 7;

        assert_eq!(MemoryObject::grow(&mut store, memory, Pages(1)), Ok(Pages(1)));
        let new = memory.get(&store).array_buffer();
        assert_ne!(old, new);
        assert!(old.get(&store).is_detached());
        assert_eq!(new.get(&store).byte_length(), 2 * WASM_PAGE_SIZE);
        assert_eq!(new.get(&store).as_slice()[WASM_PAGE_SIZE - 1], 7);
    }

    #[test_log::test]
    fn growing_by_zero_keeps_the_buffer() {
        let mut store = StoreObjects::default();
        let memory = MemoryObject::new(&mut store, &MemoryType::new(Pages(1), Some(Pages(1)))).unwrap();
        let old = memory.get(&store).array_buffer();
        assert_eq!(MemoryObject::grow(&mut store, memory, Pages(0)), Ok(Pages(1)));
        assert_eq!(memory.get(&store).array_buffer(), old);
        assert!(!old.get(&store).is_detached());
    }

    #[test_log::test]
    fn tunables_cap_growth() {
        let tunables = Tunables {
            max_memory_pages: Pages(3),
            ..Tunables::default()
        };
        let mut store = StoreObjects::new(tunables);
        let memory = MemoryObject::new(&mut store, &MemoryType::new(Pages(2), None)).unwrap();
        assert_eq!(
            MemoryObject::grow(&mut store, memory, Pages(2)),
            Err(MemoryError::CouldNotGrow {
                current: Pages(2),
                attempted_delta: Pages(2),
            })
        );
        assert_eq!(memory.get(&store).current_pages(&store), Pages(2));
    }
}
