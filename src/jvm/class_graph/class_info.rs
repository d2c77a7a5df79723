use crate::jvm::linker::VTable;
use crate::jvm::resolver::{FieldRef, MethodRef};
use crate::jvm::{
    ClassAccessFlags, ClassName, ClassRefIndex, Error, FieldAccessFlags, FieldType,
    MethodAccessFlags, MethodDesc, Name, RefType, RenderDescriptor, TypeDesc, UnqualifiedName,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Index of a class in the class graph
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identity of a class loader
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LoaderId(pub u32);

impl LoaderId {
    pub const BOOTSTRAP: LoaderId = LoaderId(0);
}

/// Method, identified by its position in its class's method table
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodId {
    pub class: ClassId,
    pub index: u16,
}

/// Field, identified by its position in its class's field table
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldId {
    pub class: ClassId,
    pub index: u16,
}

/// Lifecycle of a class
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ClassState {
    /// Defined, with symbolic references to its superclass and interfaces
    Loaded,

    /// Some thread is running the linker on the class
    Linking,

    /// Layout, dispatch tables, and subtype numbering are available
    Linked,

    /// Linking failed: the class can never be linked and this is the error
    Erroneous(Error),
}

/// Symbolic reference to a class, as it appears in a constant pool
///
/// Once resolved, the target is cached on the reference so resolving it again is constant time.
pub struct ClassRef {
    pub name: ClassName,
    resolved: OnceLock<ClassId>,
}

impl ClassRef {
    pub fn resolved(&self) -> Option<ClassId> {
        self.resolved.get().copied()
    }

    /// Record the resolved class, returning whichever class won if several threads raced
    pub(crate) fn set_resolved(&self, class: ClassId) -> ClassId {
        *self.resolved.get_or_init(|| class)
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved() {
            Some(id) => write!(f, "{:?}@{}", self.name, id.0),
            None => write!(f, "{:?}", self.name),
        }
    }
}

/// Deduplicated class references of one class
///
/// Index 0 is always the owning class itself.
pub struct ClassRefTable {
    owner: ClassId,
    loader: LoaderId,
    refs: Vec<ClassRef>,
}

impl ClassRefTable {
    pub(crate) fn new(owner: ClassId, loader: LoaderId, names: Vec<ClassName>) -> ClassRefTable {
        let refs = names
            .into_iter()
            .map(|name| ClassRef {
                name,
                resolved: OnceLock::new(),
            })
            .collect::<Vec<_>>();
        if let Some(this) = refs.first() {
            this.set_resolved(owner);
        }
        ClassRefTable {
            owner,
            loader,
            refs,
        }
    }

    /// Class whose references these are (and whose loader resolves them)
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    pub fn loader(&self) -> LoaderId {
        self.loader
    }

    pub fn get(&self, index: ClassRefIndex) -> Option<&ClassRef> {
        self.refs.get(index.0 as usize)
    }

    pub fn name(&self, index: ClassRefIndex) -> Option<&ClassName> {
        self.get(index).map(|class_ref| &class_ref.name)
    }

    /// Symbolic form of a reference
    pub fn symbolic(&self, index: ClassRefIndex) -> Option<SymbolicClassRef> {
        self.name(index).map(|name| SymbolicClassRef {
            referer: self.owner,
            name: name.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassRefIndex, &ClassRef)> {
        self.refs
            .iter()
            .enumerate()
            .map(|(idx, class_ref)| (ClassRefIndex(idx as u16), class_ref))
    }

    /// Name of the class mentioned by a type, rendered as a class name
    ///
    /// Primitive types mention no class. Arrays of references produce the array class name.
    pub fn type_class_name(&self, typ: &TypeDesc) -> Option<ClassName> {
        match typ {
            FieldType::Base(_) => None,
            FieldType::Ref(RefType::Object(index)) => self.name(*index).cloned(),
            FieldType::Ref(RefType::PrimitiveArray(arr)) => {
                Some(ClassName::of_ref_type(&RefType::PrimitiveArray(*arr)))
            }
            FieldType::Ref(RefType::ObjectArray(arr)) => {
                let element = self.name(arr.element_type)?.referenced_class()?;
                Some(ClassName::of_ref_type(&RefType::ObjectArray(
                    arr.map(|_| element),
                )))
            }
        }
    }
}

impl fmt::Debug for ClassRefTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.refs.iter()).finish()
    }
}

/// Unresolved reference to a class: who refers to it and by what name
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SymbolicClassRef {
    pub referer: ClassId,
    pub name: ClassName,
}

/// Either a symbolic reference or an already resolved class
///
/// Call sites that carry types around (eg. the verifier's subtype constraint sets) use this so
/// they need not care whether the type has been resolved yet.
#[derive(Clone)]
pub enum ClassRefOrInfo {
    Unresolved(SymbolicClassRef),
    Resolved(Arc<ClassInfo>),
}

impl ClassRefOrInfo {
    pub fn name(&self) -> &ClassName {
        match self {
            ClassRefOrInfo::Unresolved(symbolic) => &symbolic.name,
            ClassRefOrInfo::Resolved(class) => &class.name,
        }
    }
}

impl fmt::Debug for ClassRefOrInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassRefOrInfo::Unresolved(symbolic) => write!(f, "?{:?}", symbolic.name),
            ClassRefOrInfo::Resolved(class) => write!(f, "{:?}", class.name),
        }
    }
}

pub struct FieldInfo {
    pub id: FieldId,
    pub class_name: ClassName,
    pub name: UnqualifiedName,
    pub descriptor: TypeDesc,
    pub descriptor_string: String,
    pub access_flags: FieldAccessFlags,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::FINAL)
    }

    pub fn matches(&self, name: &UnqualifiedName, descriptor: &str) -> bool {
        &self.name == name && self.descriptor_string == descriptor
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.class_name.as_str(),
            self.name.as_str(),
            self.descriptor_string
        )
    }
}

pub struct MethodInfo {
    pub id: MethodId,
    pub class_name: ClassName,
    pub name: UnqualifiedName,
    pub descriptor: Arc<MethodDesc>,
    pub descriptor_string: String,

    /// Class references the descriptor indexes into (those of the declaring class, which differ
    /// from the owning class for miranda methods)
    pub refs: Arc<ClassRefTable>,
    pub access_flags: MethodAccessFlags,

    /// For miranda methods, the interface method being stood in for
    pub miranda_of: Option<MethodId>,

    vtable_index: OnceLock<usize>,

    /// Some subclass provides an implementation that overrides this method
    implemented: AtomicBool,

    /// Some subclass overrides this method
    overridden: AtomicBool,

    /// Callers compiled under the assumption that this method is never overridden
    monomorphic_callers: Mutex<Vec<MethodId>>,
}

impl MethodInfo {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: MethodId,
        class_name: ClassName,
        name: UnqualifiedName,
        descriptor: Arc<MethodDesc>,
        descriptor_string: String,
        refs: Arc<ClassRefTable>,
        access_flags: MethodAccessFlags,
        miranda_of: Option<MethodId>,
    ) -> MethodInfo {
        MethodInfo {
            id,
            class_name,
            name,
            descriptor,
            descriptor_string,
            refs,
            access_flags,
            miranda_of,
            vtable_index: OnceLock::new(),
            implemented: AtomicBool::new(false),
            overridden: AtomicBool::new(false),
            monomorphic_callers: Mutex::new(vec![]),
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::FINAL)
    }

    pub fn is_private(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    pub fn is_miranda(&self) -> bool {
        self.miranda_of.is_some()
    }

    /// Does this method take part in virtual dispatch?
    pub fn is_virtual(&self) -> bool {
        !self.is_static() && !self.name.is_initializer()
    }

    pub fn matches(&self, name: &UnqualifiedName, descriptor: &str) -> bool {
        &self.name == name && self.descriptor_string == descriptor
    }

    /// Slot in the virtual table, once the declaring class is linked
    pub fn vtable_index(&self) -> Option<usize> {
        self.vtable_index.get().copied()
    }

    pub(crate) fn set_vtable_index(&self, index: usize) {
        let _ = self.vtable_index.set(index);
    }

    pub fn is_overridden(&self) -> bool {
        self.overridden.load(Ordering::Acquire)
    }

    /// Is there code to run for this method (here or in an overriding method)?
    pub fn is_implemented(&self) -> bool {
        !self.is_abstract() || self.implemented.load(Ordering::Acquire)
    }

    /// Note that a subclass overrides this method
    ///
    /// Returns the callers whose monomorphism assumption just got invalidated.
    pub(crate) fn mark_overridden(&self, by_implementation: bool) -> Vec<MethodId> {
        if by_implementation {
            self.implemented.store(true, Ordering::Release);
        }
        let mut callers = self.monomorphic_callers.lock();
        if self.overridden.swap(true, Ordering::AcqRel) {
            vec![]
        } else {
            std::mem::take(&mut *callers)
        }
    }

    /// Record that `caller` assumes this method is never overridden
    ///
    /// Returns `false` (and records nothing) if that assumption is already wrong.
    pub(crate) fn assume_monomorphic(&self, caller: MethodId) -> bool {
        let mut callers = self.monomorphic_callers.lock();
        if self.overridden.load(Ordering::Acquire) {
            false
        } else {
            callers.push(caller);
            true
        }
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.class_name.as_str(),
            self.name.as_str(),
            self.descriptor_string
        )
    }
}

/// Everything linking computes for a class
pub struct LinkedClass {
    pub superclass: Option<Arc<ClassInfo>>,
    pub interfaces: Vec<Arc<ClassInfo>>,
    pub vtable: Arc<VTable>,

    /// Offset of every field in an instance (`None` for static fields)
    pub field_offsets: Vec<Option<usize>>,

    /// Size of an instance in bytes, including the object header
    pub instance_size: usize,

    /// Does an instance hold references (in its own fields or inherited ones)?
    pub has_references: bool,

    /// Most derived `finalize()V`
    pub finalizer: Option<Arc<MethodInfo>>,
}

/// A class (or interface, or array class) as defined by some loader
pub struct ClassInfo {
    pub id: ClassId,
    pub name: ClassName,

    /// Defining loader
    pub loader: LoaderId,
    pub access_flags: ClassAccessFlags,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<ClassRefIndex>,
    pub interfaces: Vec<ClassRefIndex>,
    pub refs: Arc<ClassRefTable>,
    pub fields: Vec<Arc<FieldInfo>>,

    /// Constant pool field references
    pub field_refs: Vec<Arc<FieldRef>>,

    /// Constant pool method references
    pub method_refs: Vec<Arc<MethodRef>>,

    /// Declared methods followed by any synthesized miranda methods
    methods: RwLock<Vec<Arc<MethodInfo>>>,
    monitor: Mutex<ClassState>,
    linked: OnceLock<LinkedClass>,
}

impl ClassInfo {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ClassId,
        name: ClassName,
        loader: LoaderId,
        access_flags: ClassAccessFlags,
        superclass: Option<ClassRefIndex>,
        interfaces: Vec<ClassRefIndex>,
        refs: Arc<ClassRefTable>,
        fields: Vec<Arc<FieldInfo>>,
        methods: Vec<Arc<MethodInfo>>,
        field_refs: Vec<Arc<FieldRef>>,
        method_refs: Vec<Arc<MethodRef>>,
    ) -> ClassInfo {
        ClassInfo {
            id,
            name,
            loader,
            access_flags,
            superclass,
            interfaces,
            refs,
            fields,
            field_refs,
            method_refs,
            methods: RwLock::new(methods),
            monitor: Mutex::new(ClassState::Loaded),
            linked: OnceLock::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::FINAL)
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::PUBLIC)
    }

    pub fn is_array(&self) -> bool {
        self.name.is_array()
    }

    pub fn state(&self) -> ClassState {
        self.monitor.lock().clone()
    }

    /// Lock guarding the lifecycle state of the class
    pub(crate) fn monitor(&self) -> MutexGuard<'_, ClassState> {
        self.monitor.lock()
    }

    pub fn linked(&self) -> Option<&LinkedClass> {
        self.linked.get()
    }

    pub(crate) fn set_linked(&self, linked: LinkedClass) -> &LinkedClass {
        self.linked.get_or_init(|| linked)
    }

    pub fn vtable(&self) -> Option<&Arc<VTable>> {
        self.linked().map(|linked| &linked.vtable)
    }

    pub fn instance_size(&self) -> Option<usize> {
        self.linked().map(|linked| linked.instance_size)
    }

    /// Does the class override the (empty) finalizer of `java/lang/Object`?
    pub fn has_finalizer(&self) -> bool {
        match self.linked().and_then(|linked| linked.finalizer.as_ref()) {
            Some(finalizer) => finalizer.class_name != ClassName::OBJECT,
            None => false,
        }
    }

    pub fn superclass_name(&self) -> Option<&ClassName> {
        self.superclass.and_then(|index| self.refs.name(index))
    }

    /// Snapshot of the method table, including miranda methods
    pub fn methods(&self) -> Vec<Arc<MethodInfo>> {
        self.methods.read().clone()
    }

    /// Methods as reflection sees them: miranda methods are not declared by the class
    pub fn declared_methods(&self) -> Vec<Arc<MethodInfo>> {
        self.methods
            .read()
            .iter()
            .filter(|method| !method.is_miranda())
            .cloned()
            .collect()
    }

    pub fn method(&self, index: u16) -> Option<Arc<MethodInfo>> {
        self.methods.read().get(index as usize).cloned()
    }

    /// Find a method (declared or miranda) by name and descriptor
    pub fn find_method(&self, name: &UnqualifiedName, descriptor: &str) -> Option<Arc<MethodInfo>> {
        self.methods
            .read()
            .iter()
            .find(|method| method.matches(name, descriptor))
            .cloned()
    }

    pub fn find_field(&self, name: &UnqualifiedName, descriptor: &str) -> Option<&Arc<FieldInfo>> {
        self.fields
            .iter()
            .find(|field| field.matches(name, descriptor))
    }

    /// Append a miranda method, returning it
    pub(crate) fn add_miranda(&self, interface_method: &MethodInfo) -> Arc<MethodInfo> {
        let mut methods = self.methods.write();
        let method = Arc::new(MethodInfo::new(
            MethodId {
                class: self.id,
                index: methods.len() as u16,
            },
            self.name.clone(),
            interface_method.name.clone(),
            interface_method.descriptor.clone(),
            interface_method.descriptor_string.clone(),
            interface_method.refs.clone(),
            interface_method.access_flags,
            Some(interface_method.id),
        ));
        methods.push(method.clone());
        method
    }

    /// Same runtime package: same defining loader and same package name
    pub fn same_runtime_package(&self, other: &ClassInfo) -> bool {
        self.loader == other.loader && self.name.package() == other.name.package()
    }

    /// Instance field offset, once linked
    pub fn field_offset(&self, field: &FieldInfo) -> Option<usize> {
        if field.id.class != self.id {
            return None;
        }
        self.linked()?
            .field_offsets
            .get(field.id.index as usize)
            .copied()
            .flatten()
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

impl RenderDescriptor for ClassInfo {
    fn render_to(&self, write_to: &mut String) {
        if self.is_array() {
            write_to.push_str(self.name.as_str());
        } else {
            write_to.push('L');
            write_to.push_str(self.name.as_str());
            write_to.push(';');
        }
    }
}
