use crate::jvm::linker::VTable;
use crate::jvm::Name;
use std::fmt;
use std::sync::Arc;

/// Handle to a heap object, as far as type checks care: its class
#[derive(Clone)]
pub struct Object {
    vtable: Arc<VTable>,
    length: Option<usize>,
}

impl Object {
    pub(crate) fn new(vtable: Arc<VTable>, length: Option<usize>) -> Object {
        Object { vtable, length }
    }

    pub fn vtable(&self) -> &Arc<VTable> {
        &self.vtable
    }

    /// Length, for arrays
    pub fn array_length(&self) -> Option<usize> {
        self.length
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            Some(length) => write!(f, "{}[{}]", self.vtable.name.as_str(), length),
            None => write!(f, "{} instance", self.vtable.name.as_str()),
        }
    }
}
