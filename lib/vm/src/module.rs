//! Module descriptors: what the managed heap knows about a compiled module.

use crate::{
    InstanceObject, Managed, NativeModule, StoreHandle, StoreObjects, WeakHandleList, WrapperCode,
};
use std::sync::Arc;
use wasmheap_types::{ModuleError, ModuleInfo, ModuleOrigin};

/// What kind of source a script holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// WebAssembly bytes.
    Wasm,
    /// JavaScript written by the user, such as an asm.js module.
    UserJavaScript,
}

/// Source metadata of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    name: String,
    source_url: Option<String>,
    kind: ScriptKind,
}

impl Script {
    /// The name of the script.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the source was loaded from, if known.
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Sets where the source was loaded from.
    pub fn set_source_url(&mut self, url: impl Into<String>) {
        self.source_url = Some(url.into());
    }

    /// The kind of source.
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }
}

/// Maps a byte offset of the translated module back to a position in the
/// asm.js source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsmJsOffsetEntry {
    /// Offset in the translated wasm bytes.
    pub byte_offset: u32,
    /// Position of the call in the asm.js source.
    pub call_position: u32,
    /// Position to report when converting arguments to numbers.
    pub to_number_position: u32,
}

/// The breakpoints set at one source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo {
    /// The source position.
    pub position: u32,
    /// The ids of the breakpoints at that position.
    pub breakpoint_ids: Vec<u32>,
}

/// A compiled module as seen from the managed heap.
///
/// Whether the module came from asm.js is one fact recorded three ways: the
/// origin of the module metadata, the kind of the script and the presence
/// of an offset table. Construction rejects any disagreement.
#[derive(Debug)]
pub struct ModuleObject {
    managed_native_module: Managed<NativeModule>,
    export_wrappers: Box<[WrapperCode]>,
    script: Script,
    weak_instance_list: WeakHandleList<InstanceObject>,
    asm_js_offset_table: Option<Box<[AsmJsOffsetEntry]>>,
    breakpoint_infos: Option<Vec<BreakpointInfo>>,
}

impl ModuleObject {
    /// Describes a compiled module. An offset table must be supplied exactly
    /// when the module was translated from asm.js.
    pub fn new(
        managed_native_module: Managed<NativeModule>,
        export_wrappers: impl Into<Box<[WrapperCode]>>,
        script_name: impl Into<String>,
        asm_js_offset_table: Option<Box<[AsmJsOffsetEntry]>>,
    ) -> Result<Self, ModuleError> {
        let origin = managed_native_module.raw().module().origin;
        let has_offset_table = asm_js_offset_table.is_some();
        let kind = match (origin, has_offset_table) {
            (ModuleOrigin::Wasm, false) => ScriptKind::Wasm,
            (ModuleOrigin::AsmJs, true) => ScriptKind::UserJavaScript,
            _ => {
                return Err(ModuleError::InconsistentOrigin {
                    origin,
                    has_offset_table,
                })
            }
        };
        Ok(Self {
            managed_native_module,
            export_wrappers: export_wrappers.into(),
            script: Script {
                name: script_name.into(),
                source_url: None,
                kind,
            },
            weak_instance_list: WeakHandleList::new(),
            asm_js_offset_table,
            breakpoint_infos: None,
        })
    }

    /// Whether the module was translated from asm.js.
    pub fn is_asm_js(&self) -> bool {
        let asm_js = self.module().is_asm_js();
        debug_assert_eq!(asm_js, self.script.kind == ScriptKind::UserJavaScript);
        debug_assert_eq!(asm_js, self.asm_js_offset_table.is_some());
        asm_js
    }

    /// The shared native module handle.
    pub fn managed_native_module(&self) -> &Managed<NativeModule> {
        &self.managed_native_module
    }

    /// The native module, borrowed.
    pub fn native_module(&self) -> &NativeModule {
        self.managed_native_module.raw()
    }

    /// A shared owner of the native module.
    pub fn shared_native_module(&self) -> Arc<NativeModule> {
        self.managed_native_module.get()
    }

    /// The module metadata.
    pub fn module(&self) -> &ModuleInfo {
        self.native_module().module()
    }

    /// The compiled export wrappers.
    pub fn export_wrappers(&self) -> &[WrapperCode] {
        &self.export_wrappers
    }

    /// The source metadata.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The source metadata, mutably.
    pub fn script_mut(&mut self) -> &mut Script {
        &mut self.script
    }

    pub(crate) fn register_instance(&mut self, instance: StoreHandle<InstanceObject>) {
        self.weak_instance_list.push(instance);
    }

    /// The live instances created from the module.
    pub fn instances(&self, store: &StoreObjects) -> Vec<StoreHandle<InstanceObject>> {
        self.weak_instance_list.live(store).collect()
    }

    /// Forgets collected instances.
    pub fn prune_instances(store: &mut StoreObjects, module: StoreHandle<Self>) -> usize {
        let mut instances = std::mem::take(&mut module.get_mut(store).weak_instance_list);
        let pruned = instances.prune(store);
        module.get_mut(store).weak_instance_list = instances;
        pruned
    }

    /// Records breakpoint `breakpoint_id` at `position`. Infos stay sorted
    /// by position.
    pub fn set_breakpoint(&mut self, position: u32, breakpoint_id: u32) {
        let infos = self.breakpoint_infos.get_or_insert_with(Vec::new);
        match infos.binary_search_by_key(&position, |info| info.position) {
            Ok(found) => {
                let ids = &mut infos[found].breakpoint_ids;
                if !ids.contains(&breakpoint_id) {
                    ids.push(breakpoint_id);
                }
            }
            Err(insert_at) => infos.insert(
                insert_at,
                BreakpointInfo {
                    position,
                    breakpoint_ids: vec![breakpoint_id],
                },
            ),
        }
    }

    /// Removes every breakpoint.
    pub fn reset_breakpoint_infos(&mut self) {
        self.breakpoint_infos = None;
    }

    optional_accessors! {
        /// The asm.js source positions of the translated module.
        has_asm_js_offset_table, asm_js_offset_table: asm_js_offset_table -> Box<[AsmJsOffsetEntry]>;
        /// The breakpoints, sorted by position.
        has_breakpoint_infos, breakpoint_infos: breakpoint_infos -> Vec<BreakpointInfo>;
    }
}

/// What an asm.js module keeps between instantiations: the compiled code
/// and everything needed to rebuild a module descriptor from it.
#[derive(Debug, Clone)]
pub struct AsmWasmData {
    managed_native_module: Managed<NativeModule>,
    export_wrappers: Box<[WrapperCode]>,
    asm_js_offset_table: Box<[AsmJsOffsetEntry]>,
    uses_bitset: u64,
}

impl AsmWasmData {
    /// Packs the compiled parts of an asm.js module.
    pub fn new(
        managed_native_module: Managed<NativeModule>,
        export_wrappers: impl Into<Box<[WrapperCode]>>,
        asm_js_offset_table: impl Into<Box<[AsmJsOffsetEntry]>>,
        uses_bitset: u64,
    ) -> Result<Self, ModuleError> {
        let origin = managed_native_module.raw().module().origin;
        if origin != ModuleOrigin::AsmJs {
            return Err(ModuleError::InconsistentOrigin {
                origin,
                has_offset_table: true,
            });
        }
        Ok(Self {
            managed_native_module,
            export_wrappers: export_wrappers.into(),
            asm_js_offset_table: asm_js_offset_table.into(),
            uses_bitset,
        })
    }

    /// The shared native module handle.
    pub fn managed_native_module(&self) -> &Managed<NativeModule> {
        &self.managed_native_module
    }

    /// The language features the source used.
    pub fn uses_bitset(&self) -> u64 {
        self.uses_bitset
    }

    /// Builds a module descriptor sharing the compiled code.
    pub fn to_module_object(&self, script_name: impl Into<String>) -> ModuleObject {
        let module = ModuleObject::new(
            self.managed_native_module.clone(),
            self.export_wrappers.clone(),
            script_name,
            Some(self.asm_js_offset_table.clone()),
        );
        match module {
            Ok(module) => module,
            Err(e) => unreachable!("asm.js data is consistent by construction: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wasmheap_types::Tunables;

    fn no_wrappers() -> Vec<WrapperCode> {
        Vec::new()
    }

    fn native(origin: ModuleOrigin) -> Managed<NativeModule> {
        let info = ModuleInfo::new(origin);
        let native = NativeModule::new(info, Vec::<u8>::new(), &Tunables::default());
        let size = native.estimated_size();
        Managed::new(native, size)
    }

    fn offsets() -> Box<[AsmJsOffsetEntry]> {
        vec![AsmJsOffsetEntry {
            byte_offset: 3,
            call_position: 10,
            to_number_position: 12,
        }]
        .into_boxed_slice()
    }

    #[test]
    fn wasm_modules_have_no_offset_table() {
        let module = ModuleObject::new(native(ModuleOrigin::Wasm), no_wrappers(), "m", None).unwrap();
        assert!(!module.is_asm_js());
        assert_eq!(module.script().kind(), ScriptKind::Wasm);
        assert!(!module.has_asm_js_offset_table());

        assert_eq!(
            ModuleObject::new(native(ModuleOrigin::Wasm), no_wrappers(), "m", Some(offsets()))
                .unwrap_err(),
            ModuleError::InconsistentOrigin {
                origin: ModuleOrigin::Wasm,
                has_offset_table: true,
            }
        );
    }

    #[test]
    fn asm_js_modules_need_an_offset_table() {
        assert!(ModuleObject::new(native(ModuleOrigin::AsmJs), no_wrappers(), "m", None).is_err());
        let module =
            ModuleObject::new(native(ModuleOrigin::AsmJs), no_wrappers(), "m", Some(offsets()))
                .unwrap();
        assert!(module.is_asm_js());
        assert_eq!(module.script().kind(), ScriptKind::UserJavaScript);
    }

    #[test]
    fn asm_wasm_data_shares_the_native_module() {
        let managed = native(ModuleOrigin::AsmJs);
        let shared: Arc<NativeModule> = managed.get();
        let data = AsmWasmData::new(managed, no_wrappers(), offsets(), 0b101).unwrap();
        let module = data.to_module_object("asm");
        assert!(module.is_asm_js());
        assert!(Arc::ptr_eq(&module.shared_native_module(), &shared));
        assert_eq!(module.asm_js_offset_table()[0].call_position, 10);
        assert_eq!(data.uses_bitset(), 0b101);

        assert!(AsmWasmData::new(native(ModuleOrigin::Wasm), no_wrappers(), offsets(), 0).is_err());
    }

    #[test]
    fn breakpoints_stay_sorted_by_position() {
        let mut module =
            ModuleObject::new(native(ModuleOrigin::Wasm), no_wrappers(), "m", None).unwrap();
        assert!(!module.has_breakpoint_infos());
        module.set_breakpoint(20, 1);
        module.set_breakpoint(5, 2);
        module.set_breakpoint(20, 3);
        module.set_breakpoint(20, 3);
        let positions: Vec<_> = module
            .breakpoint_infos()
            .iter()
            .map(|info| (info.position, info.breakpoint_ids.clone()))
            .collect();
        assert_eq!(positions, vec![(5, vec![2]), (20, vec![1, 3])]);
        module.reset_breakpoint_infos();
        assert!(!module.has_breakpoint_infos());
    }
}
