use crate::{StoreHandle, StoreObjects};
use wasmheap_types::{FunctionType, Type};

/// The identity of an exception declaration. Instances importing the same
/// tag share one object, so tags are compared by handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTag {
    index: u32,
}

impl ExceptionTag {
    /// A tag for declaration `index` of its defining module.
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    /// The declaration index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// An exception type as seen from the host: a signature and its tag.
#[derive(Debug, Clone)]
pub struct ExceptionObject {
    serialized_signature: Box<[Type]>,
    exception_tag: StoreHandle<ExceptionTag>,
}

impl ExceptionObject {
    /// Creates an exception type carrying the parameters of `sig`.
    pub fn new(
        store: &mut StoreObjects,
        sig: &FunctionType,
        exception_tag: StoreHandle<ExceptionTag>,
    ) -> StoreHandle<Self> {
        debug_assert!(sig.results().is_empty());
        StoreHandle::new(
            store,
            Self {
                serialized_signature: sig.params().into(),
                exception_tag,
            },
        )
    }

    /// The value types the exception carries.
    pub fn serialized_signature(&self) -> &[Type] {
        &self.serialized_signature
    }

    /// The tag of the exception.
    pub fn exception_tag(&self) -> StoreHandle<ExceptionTag> {
        self.exception_tag
    }

    /// Whether `sig` describes the same payload.
    pub fn is_signature_equal(&self, sig: &FunctionType) -> bool {
        sig.results().is_empty() && sig.params() == &*self.serialized_signature
    }

    /// Whether the exception was thrown with `tag`.
    pub fn matches_tag(&self, tag: StoreHandle<ExceptionTag>) -> bool {
        self.exception_tag == tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exceptions_compare_signature_and_tag_identity() {
        let mut store = StoreObjects::default();
        let tag = StoreHandle::new(&mut store, ExceptionTag::new(0));
        let other = StoreHandle::new(&mut store, ExceptionTag::new(0));
        let sig = FunctionType::new(vec![Type::I32, Type::F64], vec![]);
        let exception = ExceptionObject::new(&mut store, &sig, tag);
        let exception = exception.get(&store);

        assert!(exception.is_signature_equal(&sig));
        assert!(!exception.is_signature_equal(&FunctionType::new(vec![Type::I32], vec![])));
        assert!(exception.matches_tag(tag));
        // Same index, different declaration.
        assert!(!exception.matches_tag(other));
    }
}
