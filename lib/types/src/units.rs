use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size of a wasm page in bytes.
pub const WASM_PAGE_SIZE: usize = 0x10000;

/// Largest page count a 32-bit memory can address.
pub const WASM_MAX_PAGES: u32 = 0x10000;

/// A length of linear memory counted in wasm pages.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pages(pub u32);

impl Pages {
    /// The largest addressable page count.
    #[inline(always)]
    pub const fn max_value() -> Self {
        Self(WASM_MAX_PAGES)
    }

    /// `self + rhs`, or `None` past [`Pages::max_value`].
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_add(rhs.0)
            .filter(|&pages| pages <= WASM_MAX_PAGES)
            .map(Self)
    }

    /// The same length in bytes.
    pub fn bytes(self) -> Bytes {
        Bytes(self.0 as usize * WASM_PAGE_SIZE)
    }
}

impl fmt::Debug for Pages {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} pages", self.0)
    }
}

/// A length of linear memory counted in bytes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bytes(pub usize);

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// A byte length whose page count does not fit in a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page count does not fit in 32 bits")]
pub struct PageCountOutOfRange;

/// Whole pages only; a trailing partial page is dropped.
impl TryFrom<Bytes> for Pages {
    type Error = PageCountOutOfRange;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        u32::try_from(bytes.0 / WASM_PAGE_SIZE)
            .map(Self)
            .map_err(|_| PageCountOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_pages_round_down() {
        assert_eq!(Pages::try_from(Bytes(0)), Ok(Pages(0)));
        assert_eq!(Pages::try_from(Bytes(WASM_PAGE_SIZE - 1)), Ok(Pages(0)));
        assert_eq!(Pages::try_from(Bytes(3 * WASM_PAGE_SIZE + 42)), Ok(Pages(3)));
        assert_eq!(Pages(3).bytes(), Bytes(3 * WASM_PAGE_SIZE));

        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            Pages::try_from(Bytes((u32::MAX as usize + 1) * WASM_PAGE_SIZE)),
            Err(PageCountOutOfRange)
        );
    }

    #[test]
    fn checked_add_stops_at_the_page_limit() {
        assert_eq!(Pages(1).checked_add(Pages(2)), Some(Pages(3)));
        assert_eq!(
            Pages(WASM_MAX_PAGES - 1).checked_add(Pages(1)),
            Some(Pages::max_value())
        );
        assert_eq!(Pages(WASM_MAX_PAGES).checked_add(Pages(1)), None);
        assert_eq!(Pages(u32::MAX).checked_add(Pages(1)), None);
    }
}
