use crate::{
    ArrayBuffer, AsmWasmData, DebugInfo, ExceptionObject, ExceptionTag, ExportedFunctionData,
    GlobalObject, HostFunction, InstanceObject, MemoryObject, ModuleObject, SignatureRegistry,
    TableObject,
};
use std::{fmt, marker::PhantomData, num::NonZeroUsize};
use tracing::trace;
use wasmheap_types::{StoreId, Tunables};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A generational list of the objects of one kind living in a store.
///
/// Collected slots are recycled; bumping the slot generation on collection
/// makes every outstanding handle to the old object observe its absence.
pub struct ObjectList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<NonZeroUsize>,
}

impl<T> Default for ObjectList<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for ObjectList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectList")
            .field("live", &self.len())
            .field("free", &self.free.len())
            .finish()
    }
}

impl<T> ObjectList<T> {
    fn append(&mut self, obj: T) -> (NonZeroUsize, u32) {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx.get() - 1];
            slot.value = Some(obj);
            return (idx, slot.generation);
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(obj),
        });
        let idx = NonZeroUsize::new(self.slots.len()).unwrap_or(NonZeroUsize::MIN);
        (idx, 0)
    }

    fn get(&self, idx: NonZeroUsize, generation: u32) -> Option<&T> {
        let slot = self.slots.get(idx.get() - 1)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    fn get_mut(&mut self, idx: NonZeroUsize, generation: u32) -> Option<&mut T> {
        let slot = self.slots.get_mut(idx.get() - 1)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    fn remove(&mut self, idx: NonZeroUsize, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(idx.get() - 1)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(idx);
        Some(value)
    }

    /// The number of live objects in the list.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether the list holds no live object.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait to represent an object managed by a store. This is implemented on
/// the object kinds of the instance model.
pub trait StoreObject: Sized {
    /// List the objects in the store.
    fn list(store: &StoreObjects) -> &ObjectList<Self>;

    /// List the objects in the store, mutably.
    fn list_mut(store: &mut StoreObjects) -> &mut ObjectList<Self>;
}

macro_rules! impl_context_object {
    ($($field:ident => $ty:ty,)*) => {
        $(
            impl StoreObject for $ty {
                fn list(store: &StoreObjects) -> &ObjectList<Self> {
                    &store.$field
                }
                fn list_mut(store: &mut StoreObjects) -> &mut ObjectList<Self> {
                    &mut store.$field
                }
            }
        )*
    };
}

impl_context_object! {
    array_buffers => ArrayBuffer,
    memories => MemoryObject,
    tables => TableObject,
    globals => GlobalObject,
    instances => InstanceObject,
    modules => ModuleObject,
    functions => ExportedFunctionData,
    host_functions => HostFunction,
    tags => ExceptionTag,
    exceptions => ExceptionObject,
    debug_infos => DebugInfo,
    asm_wasm_data => AsmWasmData,
}

/// The stack limits of the thread driving a store.
///
/// Instances cache the addresses of both words, so the guard is boxed and
/// never moves. Its own address doubles as the store's isolate root.
#[derive(Debug)]
#[repr(C)]
pub struct StackGuard {
    stack_limit: usize,
    real_stack_limit: usize,
}

impl StackGuard {
    /// The limit checked by function prologues.
    pub fn stack_limit(&self) -> usize {
        self.stack_limit
    }

    /// The limit that is never lowered for interrupts.
    pub fn real_stack_limit(&self) -> usize {
        self.real_stack_limit
    }
}

/// The managed heap of a store: every object of the instance model lives
/// here and is addressed through a [`StoreHandle`].
#[derive(Debug)]
pub struct StoreObjects {
    id: StoreId,
    tunables: Tunables,
    signatures: SignatureRegistry,
    stack_guard: Box<StackGuard>,
    array_buffers: ObjectList<ArrayBuffer>,
    memories: ObjectList<MemoryObject>,
    tables: ObjectList<TableObject>,
    globals: ObjectList<GlobalObject>,
    instances: ObjectList<InstanceObject>,
    modules: ObjectList<ModuleObject>,
    functions: ObjectList<ExportedFunctionData>,
    host_functions: ObjectList<HostFunction>,
    tags: ObjectList<ExceptionTag>,
    exceptions: ObjectList<ExceptionObject>,
    debug_infos: ObjectList<DebugInfo>,
    asm_wasm_data: ObjectList<AsmWasmData>,
}

impl Default for StoreObjects {
    fn default() -> Self {
        Self::new(Tunables::default())
    }
}

impl StoreObjects {
    /// Create an empty heap governed by the given tunables.
    pub fn new(tunables: Tunables) -> Self {
        Self {
            id: StoreId::default(),
            tunables,
            signatures: SignatureRegistry::new(),
            stack_guard: Box::new(StackGuard {
                stack_limit: 0,
                real_stack_limit: 0,
            }),
            array_buffers: ObjectList::default(),
            memories: ObjectList::default(),
            tables: ObjectList::default(),
            globals: ObjectList::default(),
            instances: ObjectList::default(),
            modules: ObjectList::default(),
            functions: ObjectList::default(),
            host_functions: ObjectList::default(),
            tags: ObjectList::default(),
            exceptions: ObjectList::default(),
            debug_infos: ObjectList::default(),
            asm_wasm_data: ObjectList::default(),
        }
    }

    /// Returns the ID of this store.
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// The engine limits of this store.
    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// The signature registry shared by all instances of this store.
    pub fn signatures(&self) -> &SignatureRegistry {
        &self.signatures
    }

    /// The signature registry, mutably.
    pub fn signatures_mut(&mut self) -> &mut SignatureRegistry {
        &mut self.signatures
    }

    /// The stack limits of the thread driving this store.
    pub fn stack_guard(&self) -> &StackGuard {
        &self.stack_guard
    }

    /// The address every instance of this store caches as its isolate root.
    pub fn isolate_root(&self) -> *const u8 {
        &*self.stack_guard as *const StackGuard as *const u8
    }

    pub(crate) fn stack_limit_address(&self) -> *const usize {
        &self.stack_guard.stack_limit
    }

    pub(crate) fn real_stack_limit_address(&self) -> *const usize {
        &self.stack_guard.real_stack_limit
    }

    /// Sets the stack limit of the driving thread.
    pub fn set_stack_limit(&mut self, limit: usize) {
        self.stack_guard.stack_limit = limit;
        self.stack_guard.real_stack_limit = limit;
    }

    /// Lowers the checked limit so that the next function prologue traps
    /// into the runtime. The real limit is kept.
    pub fn request_interrupt(&mut self) {
        self.stack_guard.stack_limit = usize::MAX;
    }

    /// Restores the checked limit after an interrupt was handled.
    pub fn clear_interrupt(&mut self) {
        self.stack_guard.stack_limit = self.stack_guard.real_stack_limit;
    }

    /// Reclaims an object that is no longer reachable.
    ///
    /// This is how the collector hands a dead object back to the heap. Weak
    /// handles to it stop resolving; strong accessors panic on them.
    pub fn collect<T: StoreObject>(&mut self, handle: StoreHandle<T>) -> Option<T> {
        assert_eq!(handle.id, self.id, "object used with the wrong store");
        let collected = T::list_mut(self).remove(handle.idx, handle.generation);
        if collected.is_some() {
            trace!(
                kind = std::any::type_name::<T>(),
                index = handle.idx.get(),
                "collected object"
            );
        }
        collected
    }

    /// The number of live objects of kind `T`.
    pub fn count<T: StoreObject>(&self) -> usize {
        T::list(self).len()
    }
}

/// Handle to an object managed by a store.
///
/// Internally this is an index and a generation into a store. A reference to
/// the store must be passed in separately to access the actual object.
pub struct StoreHandle<T> {
    id: StoreId,
    idx: NonZeroUsize,
    generation: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StoreHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StoreHandle<T> {}

impl<T> std::hash::Hash for StoreHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.idx.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for StoreHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("id", &self.id)
            .field("idx", &self.idx)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> PartialEq for StoreHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.idx == other.idx && self.generation == other.generation
    }
}

impl<T> Eq for StoreHandle<T> {}

impl<T: StoreObject> StoreHandle<T> {
    /// Moves the given object into a store and returns a handle to it.
    pub fn new(store: &mut StoreObjects, val: T) -> Self {
        let (idx, generation) = T::list_mut(store).append(val);
        Self {
            id: store.id,
            idx,
            generation,
            marker: PhantomData,
        }
    }

    /// Returns a reference to the object that this handle points to.
    ///
    /// Panics if the object was collected.
    pub fn get<'a>(&self, store: &'a StoreObjects) -> &'a T {
        match self.try_get(store) {
            Some(obj) => obj,
            None => panic!("{:?} used after its object was collected", self),
        }
    }

    /// Returns a mutable reference to the object that this handle points to.
    ///
    /// Panics if the object was collected.
    pub fn get_mut<'a>(&self, store: &'a mut StoreObjects) -> &'a mut T {
        let handle = *self;
        match self.try_get_mut(store) {
            Some(obj) => obj,
            None => panic!("{:?} used after its object was collected", handle),
        }
    }

    /// Resolves the handle as a weak reference: `None` once the object was
    /// collected.
    pub fn try_get<'a>(&self, store: &'a StoreObjects) -> Option<&'a T> {
        assert_eq!(self.id, store.id, "object used with the wrong store");
        T::list(store).get(self.idx, self.generation)
    }

    /// Mutable counterpart of [`StoreHandle::try_get`].
    pub fn try_get_mut<'a>(&self, store: &'a mut StoreObjects) -> Option<&'a mut T> {
        assert_eq!(self.id, store.id, "object used with the wrong store");
        T::list_mut(store).get_mut(self.idx, self.generation)
    }

    /// Whether the object is still alive.
    pub fn is_live(&self, store: &StoreObjects) -> bool {
        self.try_get(store).is_some()
    }

    /// Returns the ID of the store associated with the handle.
    pub fn store_id(&self) -> StoreId {
        self.id
    }
}

/// A registry of weakly held objects.
///
/// Entries never keep their object alive. Collected entries are skipped by
/// [`WeakHandleList::live`] and removed by [`WeakHandleList::prune`].
pub struct WeakHandleList<T> {
    handles: Vec<StoreHandle<T>>,
}

impl<T> Default for WeakHandleList<T> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<T> Clone for WeakHandleList<T> {
    fn clone(&self) -> Self {
        Self {
            handles: self.handles.clone(),
        }
    }
}

impl<T> fmt::Debug for WeakHandleList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handles.iter()).finish()
    }
}

impl<T: StoreObject> WeakHandleList<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle. Registering the same handle twice is a no-op.
    pub fn push(&mut self, handle: StoreHandle<T>) {
        if !self.handles.contains(&handle) {
            self.handles.push(handle);
        }
    }

    /// The handles whose objects are still alive, in registration order.
    pub fn live<'a>(
        &'a self,
        store: &'a StoreObjects,
    ) -> impl Iterator<Item = StoreHandle<T>> + 'a {
        self.handles
            .iter()
            .copied()
            .filter(move |handle| handle.is_live(store))
    }

    /// Drops the entries of collected objects and returns how many were
    /// dropped.
    pub fn prune(&mut self, store: &StoreObjects) -> usize {
        let before = self.handles.len();
        self.handles.retain(|handle| handle.is_live(store));
        let pruned = before - self.handles.len();
        if pruned > 0 {
            trace!(
                kind = std::any::type_name::<T>(),
                pruned,
                "pruned collected entries from a weak registry"
            );
        }
        pruned
    }

    /// The number of entries, including collected ones not yet pruned.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the registry has no entry at all.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether `handle` is registered.
    pub fn contains(&self, handle: StoreHandle<T>) -> bool {
        self.handles.contains(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(store: &mut StoreObjects, index: u32) -> StoreHandle<ExceptionTag> {
        StoreHandle::new(store, ExceptionTag::new(index))
    }

    #[test]
    fn collected_handles_stop_resolving() {
        let mut store = StoreObjects::default();
        let a = tag(&mut store, 1);
        let b = tag(&mut store, 2);
        assert_eq!(store.count::<ExceptionTag>(), 2);

        assert_eq!(store.collect(a).map(|t| t.index()), Some(1));
        assert!(!a.is_live(&store));
        assert!(a.try_get(&store).is_none());
        assert_eq!(b.get(&store).index(), 2);
        assert!(store.collect(a).is_none());
        assert_eq!(store.count::<ExceptionTag>(), 1);
    }

    #[test]
    fn recycled_slots_do_not_revive_old_handles() {
        let mut store = StoreObjects::default();
        let old = tag(&mut store, 1);
        store.collect(old);
        let new = tag(&mut store, 7);
        assert_ne!(old, new);
        assert!(old.try_get(&store).is_none());
        assert_eq!(new.get(&store).index(), 7);
    }

    #[test]
    #[should_panic(expected = "collected")]
    fn strong_access_to_a_collected_object_panics() {
        let mut store = StoreObjects::default();
        let a = tag(&mut store, 1);
        store.collect(a);
        a.get(&store);
    }

    #[test]
    #[should_panic(expected = "wrong store")]
    fn handles_are_bound_to_their_store() {
        let mut store = StoreObjects::default();
        let other = StoreObjects::default();
        let a = tag(&mut store, 1);
        a.get(&other);
    }

    #[test]
    fn weak_lists_skip_and_prune_collected_entries() {
        let mut store = StoreObjects::default();
        let a = tag(&mut store, 1);
        let b = tag(&mut store, 2);
        let mut list = WeakHandleList::new();
        list.push(a);
        list.push(b);
        list.push(a);
        assert_eq!(list.len(), 2);

        store.collect(a);
        assert_eq!(list.live(&store).collect::<Vec<_>>(), vec![b]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.prune(&store), 1);
        assert_eq!(list.len(), 1);
        assert!(list.contains(b));
    }

    #[test]
    fn interrupts_lower_only_the_checked_limit() {
        let mut store = StoreObjects::default();
        store.set_stack_limit(0x1000);
        store.request_interrupt();
        assert_eq!(store.stack_guard().stack_limit(), usize::MAX);
        assert_eq!(store.stack_guard().real_stack_limit(), 0x1000);
        store.clear_interrupt();
        assert_eq!(store.stack_guard().stack_limit(), 0x1000);
        assert_eq!(
            store.isolate_root(),
            store.stack_guard() as *const StackGuard as *const u8
        );
    }

    #[test]
    fn default_store_uses_default_tunables() {
        let store = StoreObjects::default();
        assert_eq!(store.tunables(), &Tunables::default());
        assert!(store.signatures().is_empty());
    }
}
