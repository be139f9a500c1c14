mod common;

use common::instance;
use wasmheap::types::{ConfigError, FunctionIndex, MemoryType, Pages, TableType, Tunables, Type};
use wasmheap::vm::{MemoryObject, StoreObjects, TableObject};

#[test_log::test]
fn stores_enforce_tunables_loaded_from_toml() {
    let tunables = Tunables::from_toml_str(
        r#"
        max_memory_pages = 2
        max_table_size = 4
        jump_table_slot_size = 16
        "#,
    )
    .unwrap();
    assert_eq!(tunables.max_memory_pages, Pages(2));
    let mut store = StoreObjects::new(tunables);

    let memory = MemoryObject::new(&mut store, &MemoryType::new(Pages(1), None)).unwrap();
    assert!(MemoryObject::grow(&mut store, memory, Pages(1)).is_ok());
    assert!(MemoryObject::grow(&mut store, memory, Pages(1)).is_err());

    let table = TableObject::new(&mut store, &TableType::new(Type::FuncRef, 4, Some(100))).unwrap();
    assert!(TableObject::grow(&mut store, table, 1).is_err());

    let owner = instance(&mut store, 0, 2);
    let native_module = owner.get(&store).native_module();
    assert_eq!(native_module.jump_table_offset(FunctionIndex::from_u32(1)), 16);
}

#[test_log::test]
fn unknown_keys_are_rejected() {
    let error = Tunables::from_toml_str("max_pages = 3\n").unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)));
    assert!(error.to_string().contains("max_pages"));
}
