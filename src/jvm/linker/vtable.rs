use super::ArrayDescriptor;
use crate::jvm::class_graph::{ClassId, ClassInfo, LoaderId, MethodInfo};
use crate::jvm::{ClassAccessFlags, ClassName, Error, Name, Result};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Entry in a virtual or interface table
#[derive(Clone)]
pub enum MethodEntry {
    /// Dispatch lands on this method
    Method(Arc<MethodInfo>),

    /// Trampoline raising `AbstractMethodError` (remembering the abstract declaration, if any)
    AbstractMethodError(Option<Arc<MethodInfo>>),
}

impl MethodEntry {
    /// Method the entry dispatches to or stands in for
    pub fn method(&self) -> Option<&Arc<MethodInfo>> {
        match self {
            MethodEntry::Method(method) => Some(method),
            MethodEntry::AbstractMethodError(method) => method.as_ref(),
        }
    }

    pub fn is_abstract_method_error(&self) -> bool {
        matches!(self, MethodEntry::AbstractMethodError(_))
    }

    /// Entry for a method: abstract methods (and miranda methods) get the trampoline
    pub fn for_method(method: &Arc<MethodInfo>) -> MethodEntry {
        if method.is_abstract() || method.is_miranda() {
            MethodEntry::AbstractMethodError(Some(method.clone()))
        } else {
            MethodEntry::Method(method.clone())
        }
    }

    fn resolve(&self) -> Result<Arc<MethodInfo>> {
        match self {
            MethodEntry::Method(method) => Ok(method.clone()),
            MethodEntry::AbstractMethodError(Some(method)) => {
                Err(Error::AbstractMethod(format!("{:?}", method)))
            }
            MethodEntry::AbstractMethodError(None) => {
                Err(Error::AbstractMethod("no implementation".to_owned()))
            }
        }
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodEntry::Method(method) => write!(f, "{:?}", method),
            MethodEntry::AbstractMethodError(Some(method)) => write!(f, "!{:?}", method),
            MethodEntry::AbstractMethodError(None) => f.write_str("!"),
        }
    }
}

/// Dispatch tables and subtype numbering of a linked class
///
/// Virtual slots are inherited by position: a class's table starts with a copy of its
/// superclass's table, with overriding methods replacing entries in place, followed by the slots
/// of new methods. Interface tables are indexed by interface index, with a row for every
/// interface the class implements (an interface's own table contains itself).
pub struct VTable {
    pub class: ClassId,
    pub name: ClassName,
    pub loader: LoaderId,
    pub access_flags: ClassAccessFlags,
    baseval: AtomicI32,
    diffval: AtomicI32,
    interface_index: Option<usize>,
    interface_table: Vec<Option<Box<[MethodEntry]>>>,
    table: Vec<MethodEntry>,
    array_descriptor: Option<ArrayDescriptor>,
}

impl VTable {
    pub(crate) fn new(
        class: &ClassInfo,
        interface_index: Option<usize>,
        table: Vec<MethodEntry>,
        interface_table: Vec<Option<Box<[MethodEntry]>>>,
        array_descriptor: Option<ArrayDescriptor>,
    ) -> VTable {
        // Interfaces are numbered by their interface index, never renumbered
        let baseval = match interface_index {
            Some(index) => -(index as i32),
            None => 0,
        };
        VTable {
            class: class.id,
            name: class.name.clone(),
            loader: class.loader,
            access_flags: class.access_flags,
            baseval: AtomicI32::new(baseval),
            diffval: AtomicI32::new(0),
            interface_index,
            interface_table,
            table,
            array_descriptor,
        }
    }

    /// Table with no slots, for exercising the numbering on its own
    #[cfg(test)]
    pub(crate) fn bare(
        class: ClassId,
        name: ClassName,
        loader: LoaderId,
        access_flags: ClassAccessFlags,
    ) -> VTable {
        VTable {
            class,
            name,
            loader,
            access_flags,
            baseval: AtomicI32::new(0),
            diffval: AtomicI32::new(0),
            interface_index: None,
            interface_table: vec![],
            table: vec![],
            array_descriptor: None,
        }
    }

    /// Pre-order number of the class in the class tree (or minus the interface index)
    ///
    /// Only meaningful while holding the class hierarchy lock.
    pub fn baseval(&self) -> i32 {
        self.baseval.load(Ordering::Relaxed)
    }

    /// Number of (transitive) subclasses numbered after this class
    pub fn diffval(&self) -> i32 {
        self.diffval.load(Ordering::Relaxed)
    }

    pub(crate) fn set_numbering(&self, baseval: i32, diffval: i32) {
        self.baseval.store(baseval, Ordering::Relaxed);
        self.diffval.store(diffval, Ordering::Relaxed);
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }

    pub fn interface_index(&self) -> Option<usize> {
        self.interface_index
    }

    pub fn array_descriptor(&self) -> Option<&ArrayDescriptor> {
        self.array_descriptor.as_ref()
    }

    /// Number of virtual slots
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn entries(&self) -> &[MethodEntry] {
        &self.table
    }

    pub fn entry(&self, slot: usize) -> Option<&MethodEntry> {
        self.table.get(slot)
    }

    /// Virtual dispatch through a slot
    pub fn dispatch(&self, slot: usize) -> Result<Arc<MethodInfo>> {
        match self.table.get(slot) {
            Some(entry) => entry.resolve(),
            None => Err(Error::IncompatibleClassChange(format!(
                "{} has no virtual slot {}",
                self.name.as_str(),
                slot
            ))),
        }
    }

    /// Length of the interface table (one more than the highest interface index implemented)
    pub fn interface_table_len(&self) -> usize {
        self.interface_table.len()
    }

    /// Row of the interface table for the interface with the given index
    pub fn interface_entries(&self, interface_index: usize) -> Option<&[MethodEntry]> {
        self.interface_table.get(interface_index)?.as_deref()
    }

    pub fn implements_interface(&self, interface_index: usize) -> bool {
        self.interface_entries(interface_index).is_some()
    }

    /// Interface dispatch: method `method_index` of the interface with index `interface_index`
    pub fn dispatch_interface(
        &self,
        interface_index: usize,
        method_index: usize,
    ) -> Result<Arc<MethodInfo>> {
        match self
            .interface_entries(interface_index)
            .and_then(|row| row.get(method_index))
        {
            Some(entry) => entry.resolve(),
            None => Err(Error::IncompatibleClassChange(format!(
                "{} does not implement interface method {}/{}",
                self.name.as_str(),
                interface_index,
                method_index
            ))),
        }
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VTable")
            .field("name", &self.name)
            .field("baseval", &self.baseval())
            .field("diffval", &self.diffval())
            .field("table", &self.table)
            .finish()
    }
}
