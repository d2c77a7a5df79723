use crate::jvm::class_graph::{
    ClassInfo, ClassRefOrInfo, ClassRefTable, FieldInfo, MethodId, MethodInfo, SymbolicClassRef,
};
use crate::jvm::{ClassName, ClassRefIndex, MethodDesc, Name, TypeDesc, UnqualifiedName};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Field reference from a constant pool
///
/// The resolved field is cached on the reference, so resolving it again skips the lookup.
pub struct FieldRef {
    /// Class references of the class whose constant pool this is
    pub refs: Arc<ClassRefTable>,
    pub class: ClassRefIndex,
    pub name: UnqualifiedName,
    pub descriptor: TypeDesc,
    pub descriptor_string: String,
    resolved: OnceLock<Arc<FieldInfo>>,
}

impl FieldRef {
    pub(crate) fn new(
        refs: Arc<ClassRefTable>,
        class: ClassRefIndex,
        name: UnqualifiedName,
        descriptor: TypeDesc,
        descriptor_string: String,
    ) -> FieldRef {
        FieldRef {
            refs,
            class,
            name,
            descriptor,
            descriptor_string,
            resolved: OnceLock::new(),
        }
    }

    pub fn class_name(&self) -> Option<&ClassName> {
        self.refs.name(self.class)
    }

    pub fn resolved(&self) -> Option<&Arc<FieldInfo>> {
        self.resolved.get()
    }

    pub(crate) fn set_resolved(&self, field: Arc<FieldInfo>) -> &Arc<FieldInfo> {
        self.resolved.get_or_init(|| field)
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class_name = self.class_name().map_or("?", |name| name.as_str());
        write!(
            f,
            "{}.{}:{}",
            class_name,
            self.name.as_str(),
            self.descriptor_string
        )
    }
}

/// Method (or interface method) reference from a constant pool
pub struct MethodRef {
    pub refs: Arc<ClassRefTable>,
    pub class: ClassRefIndex,
    pub name: UnqualifiedName,

    /// Parsed descriptor, whose receiver slot is filled in once resolution finds the target
    pub descriptor: Arc<MethodDesc>,
    pub descriptor_string: String,
    resolved: OnceLock<Arc<MethodInfo>>,
}

impl MethodRef {
    pub(crate) fn new(
        refs: Arc<ClassRefTable>,
        class: ClassRefIndex,
        name: UnqualifiedName,
        descriptor: Arc<MethodDesc>,
        descriptor_string: String,
    ) -> MethodRef {
        MethodRef {
            refs,
            class,
            name,
            descriptor,
            descriptor_string,
            resolved: OnceLock::new(),
        }
    }

    pub fn class_name(&self) -> Option<&ClassName> {
        self.refs.name(self.class)
    }

    pub fn resolved(&self) -> Option<&Arc<MethodInfo>> {
        self.resolved.get()
    }

    pub(crate) fn set_resolved(&self, method: Arc<MethodInfo>) -> &Arc<MethodInfo> {
        self.resolved.get_or_init(|| method)
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class_name = self.class_name().map_or("?", |name| name.as_str());
        write!(
            f,
            "{}.{}:{}",
            class_name,
            self.name.as_str(),
            self.descriptor_string
        )
    }
}

/// Instruction accessing a field
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FieldAccess {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

impl FieldAccess {
    pub fn is_static(self) -> bool {
        matches!(self, FieldAccess::GetStatic | FieldAccess::PutStatic)
    }

    pub fn is_put(self) -> bool {
        matches!(self, FieldAccess::PutStatic | FieldAccess::PutField)
    }
}

/// Instruction invoking a method
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvokeKind {
    Static,
    Special,
    Virtual,
    Interface,
}

/// Types that must all turn out to be assignable to some other type
///
/// The verifier collects these when it cannot (or chooses not to) load the classes involved.
#[derive(Clone, Debug, Default)]
pub struct SubtypeConstraintSet {
    pub types: Vec<ClassRefOrInfo>,
}

impl SubtypeConstraintSet {
    pub fn new() -> SubtypeConstraintSet {
        SubtypeConstraintSet::default()
    }

    /// Add a type to the set, unless a type of that name is already there
    pub fn push(&mut self, typ: ClassRefOrInfo) {
        if !self.types.iter().any(|other| other.name() == typ.name()) {
            self.types.push(typ);
        }
    }

    pub fn with(mut self, typ: ClassRefOrInfo) -> SubtypeConstraintSet {
        self.push(typ);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

/// Request to resolve a class reference, for `new`, `checkcast`, `instanceof`, and friends
#[derive(Clone, Debug)]
pub struct UnresolvedClass {
    /// Method containing the instruction, if any
    pub referer_method: Option<MethodId>,
    pub class_ref: SymbolicClassRef,

    /// Types that must be assignable to the resolved class
    pub subtype_constraints: SubtypeConstraintSet,
}

impl UnresolvedClass {
    pub fn new(class_ref: SymbolicClassRef) -> UnresolvedClass {
        UnresolvedClass {
            referer_method: None,
            class_ref,
            subtype_constraints: SubtypeConstraintSet::new(),
        }
    }

    pub fn from_method(mut self, method: MethodId) -> UnresolvedClass {
        self.referer_method = Some(method);
        self
    }

    pub fn with_subtype_constraints(mut self, constraints: SubtypeConstraintSet) -> Self {
        self.subtype_constraints = constraints;
        self
    }
}

/// Request to resolve a field reference for a particular instruction
#[derive(Clone, Debug)]
pub struct UnresolvedField {
    pub referer_method: Option<MethodId>,
    pub field_ref: Arc<FieldRef>,
    pub access: FieldAccess,

    /// Possible types of the object whose field is accessed
    pub instance_types: SubtypeConstraintSet,

    /// Possible types of the value stored (for puts)
    pub value_types: SubtypeConstraintSet,
}

impl UnresolvedField {
    pub fn new(field_ref: Arc<FieldRef>, access: FieldAccess) -> UnresolvedField {
        UnresolvedField {
            referer_method: None,
            field_ref,
            access,
            instance_types: SubtypeConstraintSet::new(),
            value_types: SubtypeConstraintSet::new(),
        }
    }

    pub fn from_method(mut self, method: MethodId) -> UnresolvedField {
        self.referer_method = Some(method);
        self
    }

    pub fn with_instance_types(mut self, types: SubtypeConstraintSet) -> UnresolvedField {
        self.instance_types = types;
        self
    }

    pub fn with_value_types(mut self, types: SubtypeConstraintSet) -> UnresolvedField {
        self.value_types = types;
        self
    }
}

/// Request to resolve a method reference for a particular call instruction
#[derive(Clone, Debug)]
pub struct UnresolvedMethod {
    pub referer_method: Option<MethodId>,
    pub method_ref: Arc<MethodRef>,
    pub kind: InvokeKind,

    /// Possible types of the receiver
    pub instance_types: SubtypeConstraintSet,

    /// Possible types of each declared parameter (missing or empty sets are not checked)
    pub param_types: Vec<SubtypeConstraintSet>,
}

impl UnresolvedMethod {
    pub fn new(method_ref: Arc<MethodRef>, kind: InvokeKind) -> UnresolvedMethod {
        UnresolvedMethod {
            referer_method: None,
            method_ref,
            kind,
            instance_types: SubtypeConstraintSet::new(),
            param_types: vec![],
        }
    }

    pub fn from_method(mut self, method: MethodId) -> UnresolvedMethod {
        self.referer_method = Some(method);
        self
    }

    pub fn with_instance_types(mut self, types: SubtypeConstraintSet) -> UnresolvedMethod {
        self.instance_types = types;
        self
    }

    /// Constrain the argument passed for the parameter at `index` (counting declared
    /// parameters only)
    pub fn with_param_types(mut self, index: usize, types: SubtypeConstraintSet) -> Self {
        if self.param_types.len() <= index {
            self.param_types.resize_with(index + 1, SubtypeConstraintSet::new);
        }
        self.param_types[index] = types;
        self
    }
}

/// Shorthand for an unresolved type, named from the point of view of `referer`
pub fn symbolic(referer: &ClassInfo, name: &ClassName) -> ClassRefOrInfo {
    ClassRefOrInfo::Unresolved(SymbolicClassRef {
        referer: referer.id,
        name: name.clone(),
    })
}
