use pretty_assertions::assert_eq;
use wasmheap::types::{GlobalType, Mutability, Type};
use wasmheap::vm::{ArrayBuffer, GlobalObject, StoreHandle, StoreObjects};

fn cell(
    store: &mut StoreObjects,
    buffer: Option<StoreHandle<ArrayBuffer>>,
    ty: Type,
    offset: u32,
) -> GlobalObject {
    let global = GlobalObject::new(store, buffer, GlobalType::new(ty, Mutability::Var), offset)
        .expect("global buffer allocation");
    *global.get(store)
}

#[test_log::test]
fn float_cells_keep_their_bit_patterns() {
    let mut store = StoreObjects::default();
    let f32_cell = cell(&mut store, None, Type::F32, 0);
    let f64_cell = cell(&mut store, None, Type::F64, 0);

    for bits in [0x7fc0_0001u32, 0xffc0_0000, 0x8000_0000, 0, 0x7f80_0000] {
        f32_cell.set_f32(&mut store, f32::from_bits(bits));
        assert_eq!(f32_cell.get_f32(&store).to_bits(), bits);
    }
    for bits in [
        0x7ff8_0000_0000_0001u64,
        0x8000_0000_0000_0000,
        0,
        0xfff0_0000_0000_0000,
    ] {
        f64_cell.set_f64(&mut store, f64::from_bits(bits));
        assert_eq!(f64_cell.get_f64(&store).to_bits(), bits);
    }
}

#[test_log::test]
fn integer_cells_round_trip_extremes() {
    let mut store = StoreObjects::default();
    let i32_cell = cell(&mut store, None, Type::I32, 0);
    let i64_cell = cell(&mut store, None, Type::I64, 0);
    for value in [i32::MIN, -1, 0, 1, i32::MAX] {
        i32_cell.set_i32(&mut store, value);
        assert_eq!(i32_cell.get_i32(&store), value);
    }
    for value in [i64::MIN, -1, 0, i64::MAX] {
        i64_cell.set_i64(&mut store, value);
        assert_eq!(i64_cell.get_i64(&store), value);
    }
}

#[test_log::test]
fn cells_sharing_a_buffer_do_not_overlap() {
    let mut store = StoreObjects::default();
    let buffer = ArrayBuffer::new(16).unwrap();
    let buffer = StoreHandle::new(&mut store, buffer);
    let low = cell(&mut store, Some(buffer), Type::I64, 0);
    let high = cell(&mut store, Some(buffer), Type::I32, 8);

    low.set_i64(&mut store, -1);
    high.set_i32(&mut store, 0x1234_5678);
    assert_eq!(low.get_i64(&store), -1);
    assert_eq!(
        &buffer.get(&store).as_slice()[8..12],
        &[0x78, 0x56, 0x34, 0x12]
    );
    assert_eq!(&buffer.get(&store).as_slice()[12..], &[0, 0, 0, 0]);
}

#[test_log::test]
fn an_i32_fits_at_the_start_of_an_eight_byte_buffer() {
    let mut store = StoreObjects::default();
    let buffer = StoreHandle::new(&mut store, ArrayBuffer::new(8).unwrap());
    let global = cell(&mut store, Some(buffer), Type::I32, 0);
    global.set_i32(&mut store, 42);
    assert_eq!(global.get_i32(&store), 42);

    let last = cell(&mut store, Some(buffer), Type::I32, 4);
    last.set_i32(&mut store, -42);
    assert_eq!(global.get_i32(&store), 42);
    assert_eq!(last.get_i32(&store), -42);
}

#[test_log::test]
#[should_panic(expected = "global cell out of its buffer")]
fn an_i32_at_offset_five_of_an_eight_byte_buffer_panics() {
    let mut store = StoreObjects::default();
    let buffer = StoreHandle::new(&mut store, ArrayBuffer::new(8).unwrap());
    cell(&mut store, Some(buffer), Type::I32, 5);
}

#[test_log::test]
fn global_types_survive_packing() {
    let mut store = StoreObjects::default();
    let ty = GlobalType::new(Type::F32, Mutability::Const);
    let global = GlobalObject::new(&mut store, None, ty, 4).unwrap();
    let global = global.get(&store);
    assert_eq!(global.global_type(), ty);
    assert_eq!(global.type_size(), 4);
    assert_eq!(global.offset(), 4);
    assert_eq!(global.array_buffer().get(&store).byte_length(), 8);
}
