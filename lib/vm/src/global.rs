use crate::{ArrayBuffer, StoreHandle, StoreObjects};
use byteorder::{ByteOrder, LittleEndian};
use more_asserts::assert_le;
use std::fmt;
use wasmheap_types::{GlobalType, MemoryError, Mutability, Type};

/// The type and mutability of a global packed into one word.
///
/// Layout: bits 0 to 3 hold the type code of [`Type`], bit 4 is set for
/// mutable globals. All other bits are zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalFlags(u32);

impl GlobalFlags {
    const TYPE_MASK: u32 = 0b1111;
    const MUTABLE: u32 = 1 << 4;

    /// Packs a global type.
    pub fn new(ty: GlobalType) -> Self {
        let mut bits = u32::from(ty.ty.code()) & Self::TYPE_MASK;
        if ty.mutability.is_mutable() {
            bits |= Self::MUTABLE;
        }
        Self(bits)
    }

    /// The value type.
    pub fn ty(self) -> Type {
        match Type::from_code((self.0 & Self::TYPE_MASK) as u8) {
            Some(ty) => ty,
            None => unreachable!("global flags always hold a valid type code"),
        }
    }

    /// Whether the global may be written after instantiation.
    pub fn is_mutable(self) -> bool {
        self.0 & Self::MUTABLE != 0
    }

    /// The packed word.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for GlobalFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalFlags")
            .field("ty", &self.ty())
            .field("mutable", &self.is_mutable())
            .finish()
    }
}

/// A typed cell inside an array buffer.
///
/// Values are stored little-endian whatever the host byte order, so a
/// buffer has the same contents on every platform. Only the accessors
/// matching the declared type may be used; the type-checking phase that
/// produces the callers guarantees it.
#[derive(Debug, Clone, Copy)]
pub struct GlobalObject {
    array_buffer: StoreHandle<ArrayBuffer>,
    offset: u32,
    flags: GlobalFlags,
}

impl GlobalObject {
    /// Creates a cell of type `ty` at `offset` inside `buffer`, or inside a
    /// fresh zeroed buffer of exactly the cell's size when none is given.
    ///
    /// Panics if the type is not numeric or the cell does not fit into the
    /// buffer.
    pub fn new(
        store: &mut StoreObjects,
        buffer: Option<StoreHandle<ArrayBuffer>>,
        ty: GlobalType,
        offset: u32,
    ) -> Result<StoreHandle<Self>, MemoryError> {
        assert!(ty.ty.is_num(), "global cells hold numeric values, not {}", ty.ty);
        let size = ty.ty.size_in_bytes();
        let array_buffer = match buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = ArrayBuffer::new(offset as usize + size)?;
                StoreHandle::new(store, buffer)
            }
        };
        assert_le!(
            offset as usize + size,
            array_buffer.get(store).byte_length(),
            "global cell out of its buffer"
        );
        let global = Self {
            array_buffer,
            offset,
            flags: GlobalFlags::new(ty),
        };
        Ok(StoreHandle::new(store, global))
    }

    /// The buffer holding the cell.
    pub fn array_buffer(&self) -> StoreHandle<ArrayBuffer> {
        self.array_buffer
    }

    /// The byte offset of the cell inside its buffer.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The packed type and mutability.
    pub fn flags(&self) -> GlobalFlags {
        self.flags
    }

    /// The value type of the cell.
    pub fn ty(&self) -> Type {
        self.flags.ty()
    }

    /// The global type of the cell.
    pub fn global_type(&self) -> GlobalType {
        GlobalType::new(self.ty(), Mutability::from(self.is_mutable()))
    }

    /// Whether the cell is mutable.
    pub fn is_mutable(&self) -> bool {
        self.flags.is_mutable()
    }

    /// The size of the cell in bytes.
    pub fn type_size(&self) -> usize {
        self.ty().size_in_bytes()
    }

    /// The address of the first byte of the cell.
    pub fn address(&self, store: &StoreObjects) -> *mut u8 {
        let buffer = self.array_buffer.get(store);
        self.check_bounds(buffer);
        // Safety: the cell lies inside the buffer.
        unsafe { buffer.backing_store().add(self.offset as usize) }
    }

    fn check_bounds(&self, buffer: &ArrayBuffer) {
        assert_le!(
            self.offset as usize + self.type_size(),
            buffer.byte_length(),
            "global cell out of its buffer"
        );
    }

    fn bytes<'a>(&self, store: &'a StoreObjects) -> &'a [u8] {
        let buffer = self.array_buffer.get(store);
        self.check_bounds(buffer);
        let start = self.offset as usize;
        &buffer.as_slice()[start..start + self.type_size()]
    }

    fn bytes_mut<'a>(&self, store: &'a mut StoreObjects) -> &'a mut [u8] {
        let size = self.type_size();
        let buffer = self.array_buffer.get_mut(store);
        self.check_bounds(buffer);
        let start = self.offset as usize;
        &mut buffer.as_mut_slice()[start..start + size]
    }

    /// Reads an `i32` cell.
    pub fn get_i32(&self, store: &StoreObjects) -> i32 {
        debug_assert_eq!(self.ty(), Type::I32);
        LittleEndian::read_i32(self.bytes(store))
    }

    /// Reads an `i64` cell.
    pub fn get_i64(&self, store: &StoreObjects) -> i64 {
        debug_assert_eq!(self.ty(), Type::I64);
        LittleEndian::read_i64(self.bytes(store))
    }

    /// Reads an `f32` cell, bit pattern included.
    pub fn get_f32(&self, store: &StoreObjects) -> f32 {
        debug_assert_eq!(self.ty(), Type::F32);
        f32::from_bits(LittleEndian::read_u32(self.bytes(store)))
    }

    /// Reads an `f64` cell, bit pattern included.
    pub fn get_f64(&self, store: &StoreObjects) -> f64 {
        debug_assert_eq!(self.ty(), Type::F64);
        f64::from_bits(LittleEndian::read_u64(self.bytes(store)))
    }

    /// Writes an `i32` cell.
    pub fn set_i32(&self, store: &mut StoreObjects, value: i32) {
        debug_assert_eq!(self.ty(), Type::I32);
        LittleEndian::write_i32(self.bytes_mut(store), value);
    }

    /// Writes an `i64` cell.
    pub fn set_i64(&self, store: &mut StoreObjects, value: i64) {
        debug_assert_eq!(self.ty(), Type::I64);
        LittleEndian::write_i64(self.bytes_mut(store), value);
    }

    /// Writes an `f32` cell, bit pattern included.
    pub fn set_f32(&self, store: &mut StoreObjects, value: f32) {
        debug_assert_eq!(self.ty(), Type::F32);
        LittleEndian::write_u32(self.bytes_mut(store), value.to_bits());
    }

    /// Writes an `f64` cell, bit pattern included.
    pub fn set_f64(&self, store: &mut StoreObjects, value: f64) {
        debug_assert_eq!(self.ty(), Type::F64);
        LittleEndian::write_u64(self.bytes_mut(store), value.to_bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(store: &mut StoreObjects, len: usize) -> StoreHandle<ArrayBuffer> {
        let buffer = ArrayBuffer::new(len).unwrap();
        StoreHandle::new(store, buffer)
    }

    #[test]
    fn flags_pack_type_and_mutability() {
        let flags = GlobalFlags::new(GlobalType::new(Type::F64, Mutability::Var));
        assert_eq!(flags.bits(), 3 | 1 << 4);
        assert_eq!(flags.ty(), Type::F64);
        assert!(flags.is_mutable());

        let flags = GlobalFlags::new(GlobalType::new(Type::I64, Mutability::Const));
        assert_eq!(flags.bits(), 1);
        assert!(!flags.is_mutable());
    }

    #[test]
    fn cells_are_little_endian() {
        let mut store = StoreObjects::default();
        let buf = buffer(&mut store, 16);
        let ty = GlobalType::new(Type::I32, Mutability::Var);
        let global = *GlobalObject::new(&mut store, Some(buf), ty, 4)
            .unwrap()
            .get(&store);
        global.set_i32(&mut store, 0x0102_0304);
        assert_eq!(&buf.get(&store).as_slice()[4..8], &[4, 3, 2, 1]);
        assert_eq!(global.get_i32(&store), 0x0102_0304);
        assert_eq!(
            global.address(&store) as usize,
            buf.get(&store).backing_store() as usize + 4
        );
    }

    #[test]
    fn a_missing_buffer_is_allocated() {
        let mut store = StoreObjects::default();
        let ty = GlobalType::new(Type::F64, Mutability::Const);
        let global = *GlobalObject::new(&mut store, None, ty, 0)
            .unwrap()
            .get(&store);
        assert_eq!(global.array_buffer().get(&store).byte_length(), 8);
        assert_eq!(global.get_f64(&store), 0.0);
        assert_eq!(global.global_type(), ty);
    }

    #[test]
    #[should_panic(expected = "global cell out of its buffer")]
    fn cells_must_fit_their_buffer() {
        let mut store = StoreObjects::default();
        let buf = buffer(&mut store, 8);
        let ty = GlobalType::new(Type::I64, Mutability::Var);
        let _ = GlobalObject::new(&mut store, Some(buf), ty, 1);
    }

    #[test]
    #[should_panic(expected = "numeric")]
    fn reference_cells_are_rejected() {
        let mut store = StoreObjects::default();
        let ty = GlobalType::new(Type::FuncRef, Mutability::Var);
        let _ = GlobalObject::new(&mut store, None, ty, 0);
    }
}
