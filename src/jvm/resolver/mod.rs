//! Resolution of symbolic references to classes, fields, and methods
//!
//! Resolution runs in one of two modes. Eager resolution loads (and links) whatever it needs.
//! Lazy resolution never loads a class: if a class it needs is not loaded yet, the result is
//! [`ResolveResult::Deferred`] and the caller is expected to retry later, typically at run time.

/// Unwrap a successful resolution, returning early on anything else
macro_rules! try_resolve {
    ($result:expr) => {
        match $result {
            $crate::jvm::resolver::ResolveResult::Succeeded(value) => value,
            $crate::jvm::resolver::ResolveResult::Deferred => {
                return $crate::jvm::resolver::ResolveResult::Deferred
            }
            $crate::jvm::resolver::ResolveResult::Failed(err) => {
                return $crate::jvm::resolver::ResolveResult::Failed(err)
            }
        }
    };
}

/// Unwrap a `Result` inside a function returning a resolution result
macro_rules! try_result {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => return $crate::jvm::resolver::ResolveResult::Failed(err),
        }
    };
}

pub(crate) mod access;
mod subtype;
mod unresolved;

pub use subtype::*;
pub use unresolved::*;

use crate::jvm::class_graph::{
    ClassId, ClassInfo, ClassRefOrInfo, ClassRefTable, FieldInfo, LoaderId, MethodInfo,
};
use crate::jvm::linker::{interface_closure, superclasses};
use crate::jvm::{
    ClassAccessFlags, ClassName, ClassRefIndex, Error, FieldAccessFlags, FieldType,
    MethodAccessFlags, Name, Result, TypeDesc, UnqualifiedName,
};
use crate::Vm;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use std::sync::Arc;

/// How far resolution may go to find what it needs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ResolveMode {
    /// Only use classes that are already loaded
    Lazy,

    /// Load classes as needed
    Eager,
}

/// Outcome of resolving a reference
#[derive(Clone, Debug)]
pub enum ResolveResult<T> {
    Succeeded(T),

    /// Resolution would have to load a class, which lazy mode does not do
    Deferred,

    /// Resolution failed: this is the error to raise
    Failed(Error),
}

impl<T> ResolveResult<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, ResolveResult::Succeeded(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, ResolveResult::Deferred)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResolveResult::Failed(_))
    }

    pub fn succeeded(self) -> Option<T> {
        match self {
            ResolveResult::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ResolveResult::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolveResult<U> {
        match self {
            ResolveResult::Succeeded(value) => ResolveResult::Succeeded(f(value)),
            ResolveResult::Deferred => ResolveResult::Deferred,
            ResolveResult::Failed(err) => ResolveResult::Failed(err),
        }
    }

    /// Convert to a `Result`, for callers that cannot defer
    ///
    /// A deferred resolution becomes a `NoClassDefFoundError` for `name`.
    pub fn into_result(self, name: Option<&ClassName>) -> Result<T> {
        match self {
            ResolveResult::Succeeded(value) => Ok(value),
            ResolveResult::Failed(err) => Err(err),
            ResolveResult::Deferred => Err(Error::NoClassDefFound(
                name.map_or("<unknown>", |name| name.as_str()).to_owned(),
            )),
        }
    }
}

impl<T> From<Result<T>> for ResolveResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => ResolveResult::Succeeded(value),
            Err(err) => ResolveResult::Failed(err),
        }
    }
}

impl Vm {
    /// Resolve a class name as seen from `referer`
    ///
    /// If `check_access` is set, the referer must be able to access the class. If `link` is set,
    /// the class also gets linked.
    pub fn resolve_class_from_name(
        &self,
        referer: &ClassInfo,
        name: &ClassName,
        mode: ResolveMode,
        check_access: bool,
        link: bool,
    ) -> ResolveResult<Arc<ClassInfo>> {
        let class = match self.graph().lookup(referer.loader, name) {
            Some(class) => class,
            None => match mode {
                ResolveMode::Eager => try_result!(self.load_class(referer.loader, name)),
                ResolveMode::Lazy => match try_result!(self.load_array_lazily(referer.loader, name))
                {
                    Some(class) => class,
                    None => {
                        log::trace!(
                            "Deferring resolution of {} from {}",
                            name.as_str(),
                            referer.name.as_str()
                        );
                        return ResolveResult::Deferred;
                    }
                },
            },
        };

        if check_access && !access::is_class_accessible(referer, &class) {
            return ResolveResult::Failed(Error::IllegalAccess(format!(
                "class {} tried to access class {}",
                referer.name.as_str(),
                class.name.as_str()
            )));
        }
        if link {
            try_result!(self.link_class(&class));
        }
        ResolveResult::Succeeded(class)
    }

    /// Array classes need no loader, so lazy resolution may create them as long as their
    /// component class is already loaded
    fn load_array_lazily(
        &self,
        loader: LoaderId,
        name: &ClassName,
    ) -> Result<Option<Arc<ClassInfo>>> {
        let component = match name.component_type() {
            None => return Ok(None),
            Some(component) => component,
        };
        if let FieldType::Ref(component_type) = &component {
            let component_name = ClassName::of_ref_type(component_type);
            let loaded = self.graph().lookup(loader, &component_name).is_some()
                || self.load_array_lazily(loader, &component_name)?.is_some();
            if !loaded {
                return Ok(None);
            }
        }
        self.load_class(loader, name).map(Some)
    }

    /// Resolve an entry of a class reference table, caching the result on the entry
    pub fn resolve_classref(
        &self,
        refs: &ClassRefTable,
        index: ClassRefIndex,
        mode: ResolveMode,
        check_access: bool,
        link: bool,
    ) -> ResolveResult<Arc<ClassInfo>> {
        let referer = try_result!(self.referer_of(refs));
        let class_ref = match refs.get(index) {
            Some(class_ref) => class_ref,
            None => {
                return ResolveResult::Failed(Error::ClassFormat(format!(
                    "Invalid class reference {} in {}",
                    index.0,
                    referer.name.as_str()
                )))
            }
        };

        match class_ref.resolved().and_then(|id| self.graph().get(id)) {
            Some(class) => {
                if check_access && !access::is_class_accessible(&referer, &class) {
                    return ResolveResult::Failed(Error::IllegalAccess(format!(
                        "class {} tried to access class {}",
                        referer.name.as_str(),
                        class.name.as_str()
                    )));
                }
                if link {
                    try_result!(self.link_class(&class));
                }
                ResolveResult::Succeeded(class)
            }
            None => {
                let class = try_resolve!(self.resolve_class_from_name(
                    &referer,
                    &class_ref.name,
                    mode,
                    check_access,
                    link
                ));
                class_ref.set_resolved(class.id);
                ResolveResult::Succeeded(class)
            }
        }
    }

    /// Resolve a type that may already be a class
    pub fn resolve_classref_or_classinfo(
        &self,
        class: &ClassRefOrInfo,
        mode: ResolveMode,
        check_access: bool,
        link: bool,
    ) -> ResolveResult<Arc<ClassInfo>> {
        match class {
            ClassRefOrInfo::Resolved(class) => {
                if link {
                    try_result!(self.link_class(class));
                }
                ResolveResult::Succeeded(class.clone())
            }
            ClassRefOrInfo::Unresolved(symbolic) => {
                let referer = match self.graph().get(symbolic.referer) {
                    Some(referer) => referer,
                    None => return ResolveResult::Failed(unknown_referer()),
                };
                self.resolve_class_from_name(&referer, &symbolic.name, mode, check_access, link)
            }
        }
    }

    /// Resolve the class operand of an instruction and check the types the verifier recorded
    /// for it
    pub fn resolve_class(
        &self,
        request: &UnresolvedClass,
        mode: ResolveMode,
    ) -> ResolveResult<Arc<ClassInfo>> {
        let referer = match self.graph().get(request.class_ref.referer) {
            Some(referer) => referer,
            None => return ResolveResult::Failed(unknown_referer()),
        };
        let class = try_resolve!(self.resolve_class_from_name(
            &referer,
            &request.class_ref.name,
            mode,
            true,
            false
        ));

        if self.settings().verify && !request.subtype_constraints.is_empty() {
            try_resolve!(self.check_subtype_set(
                &referer,
                &request.subtype_constraints,
                &ClassRefOrInfo::Resolved(class.clone()),
                mode,
                SubtypeError::Linkage
            ));
        }
        ResolveResult::Succeeded(class)
    }

    /// Resolve a field reference for a field access instruction
    pub fn resolve_field(
        &self,
        request: &UnresolvedField,
        mode: ResolveMode,
    ) -> ResolveResult<Arc<FieldInfo>> {
        let scratch = self.dump().checkpoint();
        let field_ref = &request.field_ref;
        let referer = try_result!(self.referer_of(&field_ref.refs));
        let container =
            try_resolve!(self.resolve_classref(&field_ref.refs, field_ref.class, mode, true, true));

        let field = match field_ref.resolved() {
            Some(field) => field.clone(),
            None => match self.lookup_field(
                &scratch,
                &container,
                &field_ref.name,
                &field_ref.descriptor_string,
            ) {
                Some(field) => field_ref.set_resolved(field).clone(),
                None => {
                    return ResolveResult::Failed(Error::NoSuchField(format!(
                        "{}.{}",
                        container.name.as_str(),
                        field_ref.name.as_str()
                    )))
                }
            },
        };
        let declaring = try_result!(self.declaring_class(field.id.class));

        if field.is_static() != request.access.is_static() {
            return ResolveResult::Failed(Error::IncompatibleClassChange(format!(
                "{} field {:?} accessed with {:?}",
                if field.is_static() { "Static" } else { "Instance" },
                field,
                request.access
            )));
        }
        if !access::is_member_accessible(
            self.graph(),
            &referer,
            &declaring,
            field.access_flags.visibility(),
        ) {
            return ResolveResult::Failed(Error::IllegalAccess(format!(
                "class {} tried to access field {:?}",
                referer.name.as_str(),
                field
            )));
        }
        if request.access.is_put() && field.is_final() && referer.id != declaring.id {
            return ResolveResult::Failed(Error::IllegalAccess(format!(
                "Update to final field {:?} attempted from a different class ({})",
                field,
                referer.name.as_str()
            )));
        }

        if self.settings().verify {
            if referer.loader != declaring.loader {
                if let Some(name) = constrained_class(&field_ref.refs, &field_ref.descriptor) {
                    try_result!(self
                        .graph()
                        .add_constraint(referer.loader, declaring.loader, &name));
                }
            }

            let protected = field.access_flags.contains(FieldAccessFlags::PROTECTED);
            if !request.access.is_static()
                && protected
                && !referer.same_runtime_package(&declaring)
                && self.graph().is_subclass_of(&referer, &declaring)
            {
                try_resolve!(self.check_subtype_set(
                    &referer,
                    &request.instance_types,
                    &ClassRefOrInfo::Resolved(referer.clone()),
                    mode,
                    SubtypeError::IllegalAccess
                ));
            }

            if request.access.is_put() && field_ref.descriptor.is_reference() {
                if let Some(name) = field_ref.refs.type_class_name(&field_ref.descriptor) {
                    try_resolve!(self.check_subtype_set(
                        &referer,
                        &request.value_types,
                        &symbolic(&referer, &name),
                        mode,
                        SubtypeError::Linkage
                    ));
                }
            }
        }

        ResolveResult::Succeeded(field)
    }

    /// Resolve a method reference for a call instruction
    pub fn resolve_method(
        &self,
        request: &UnresolvedMethod,
        mode: ResolveMode,
    ) -> ResolveResult<Arc<MethodInfo>> {
        let scratch = self.dump().checkpoint();
        let method_ref = &request.method_ref;
        let referer = try_result!(self.referer_of(&method_ref.refs));
        let container = try_resolve!(self.resolve_classref(
            &method_ref.refs,
            method_ref.class,
            mode,
            true,
            true
        ));

        match request.kind {
            InvokeKind::Interface if !container.is_interface() => {
                return ResolveResult::Failed(Error::IncompatibleClassChange(format!(
                    "Found class {}, but interface was expected",
                    container.name.as_str()
                )))
            }
            InvokeKind::Virtual if container.is_interface() => {
                return ResolveResult::Failed(Error::IncompatibleClassChange(format!(
                    "Found interface {}, but class was expected",
                    container.name.as_str()
                )))
            }
            _ => (),
        }

        let method = match method_ref.resolved() {
            Some(method) => method.clone(),
            None => {
                let name = &method_ref.name;
                let descriptor = method_ref.descriptor_string.as_str();
                let found = if container.is_interface() {
                    lookup_interface_method(&container, name, descriptor)
                } else {
                    lookup_class_method(&scratch, &container, name, descriptor)
                };
                match found {
                    Some(method) => method_ref.set_resolved(method).clone(),
                    None => {
                        return ResolveResult::Failed(Error::NoSuchMethod(format!(
                            "{}.{}{}",
                            container.name.as_str(),
                            method_ref.name.as_str(),
                            method_ref.descriptor_string
                        )))
                    }
                }
            }
        };

        let method = if request.kind == InvokeKind::Special {
            try_result!(self.select_special(&scratch, &referer, &container, method))
        } else {
            method
        };
        let declaring = try_result!(self.declaring_class(method.id.class));

        let static_call = request.kind == InvokeKind::Static;
        if method.is_static() != static_call {
            return ResolveResult::Failed(Error::IncompatibleClassChange(format!(
                "{} method {:?} invoked with {:?}",
                if method.is_static() { "Static" } else { "Instance" },
                method,
                request.kind
            )));
        }
        if !access::is_member_accessible(
            self.graph(),
            &referer,
            &declaring,
            method.access_flags.visibility(),
        ) {
            return ResolveResult::Failed(Error::IllegalAccess(format!(
                "class {} tried to access method {:?}",
                referer.name.as_str(),
                method
            )));
        }

        if !method_ref
            .descriptor
            .finalize(method.access_flags, method_ref.class)
        {
            return ResolveResult::Failed(Error::IncompatibleClassChange(format!(
                "Call site {:?} was already bound with a different receiver",
                method_ref
            )));
        }

        if self.settings().verify {
            if referer.loader != declaring.loader {
                try_result!(self.add_method_constraints(referer.loader, declaring.loader, &method));
            }

            let protected = method.access_flags.contains(MethodAccessFlags::PROTECTED);
            if !static_call
                && protected
                && !referer.same_runtime_package(&declaring)
                && self.graph().is_subclass_of(&referer, &declaring)
            {
                try_resolve!(self.check_subtype_set(
                    &referer,
                    &request.instance_types,
                    &ClassRefOrInfo::Resolved(referer.clone()),
                    mode,
                    SubtypeError::IllegalAccess
                ));
            }

            // Receivers of constructors are still uninitialized, and have no type to check yet
            if !static_call && !method.name.is_initializer() {
                try_resolve!(self.check_subtype_set(
                    &referer,
                    &request.instance_types,
                    &ClassRefOrInfo::Resolved(container.clone()),
                    mode,
                    SubtypeError::Linkage
                ));
            }

            let parameters = &method_ref.descriptor.descriptor.parameters;
            for (parameter, types) in parameters.iter().zip(&request.param_types) {
                if types.is_empty() {
                    continue;
                }
                if let Some(name) = method_ref.refs.type_class_name(parameter) {
                    try_resolve!(self.check_subtype_set(
                        &referer,
                        types,
                        &symbolic(&referer, &name),
                        mode,
                        SubtypeError::Linkage
                    ));
                }
            }
        }

        ResolveResult::Succeeded(method)
    }

    /// Require both loaders to agree on every class a method's signature mentions
    pub(crate) fn add_method_constraints(
        &self,
        a: LoaderId,
        b: LoaderId,
        method: &MethodInfo,
    ) -> Result<()> {
        for typ in method.descriptor.descriptor.types() {
            if let Some(name) = constrained_class(&method.refs, typ) {
                self.graph().add_constraint(a, b, &name)?;
            }
        }
        Ok(())
    }

    /// `invokespecial` on a superclass method dispatches from the direct superclass of the
    /// caller, provided the caller has `ACC_SUPER` set
    ///
    /// The lookup goes up the superclass chain, then through the superinterfaces of that chain.
    /// Finding nothing, or only an abstract method, is an `AbstractMethodError`.
    fn select_special(
        &self,
        scratch: &Bump,
        referer: &Arc<ClassInfo>,
        container: &Arc<ClassInfo>,
        method: Arc<MethodInfo>,
    ) -> Result<Arc<MethodInfo>> {
        if !referer.access_flags.contains(ClassAccessFlags::SUPER)
            || method.name == UnqualifiedName::INIT
            || container.is_interface()
            || referer.id == container.id
            || !self.graph().is_subclass_of(referer, container)
        {
            return Ok(method);
        }

        let name = &method.name;
        let descriptor = method.descriptor_string.as_str();
        let mut chain = BumpVec::new_in(scratch);
        chain.extend(superclasses(self.graph().superclass_of(referer)));
        let selected = chain
            .iter()
            .filter_map(|class| class.find_method(name, descriptor))
            .find(|method| !method.is_miranda())
            .or_else(|| {
                let interfaces = superinterfaces(scratch, &chain);
                lookup_superinterface_method(&interfaces, name, descriptor)
            });

        match selected {
            Some(selected) if !selected.is_abstract() => Ok(selected),
            _ => Err(Error::AbstractMethod(format!(
                "{}.{}{}",
                referer.name.as_str(),
                name.as_str(),
                descriptor
            ))),
        }
    }

    /// Field lookup: declared fields, then superinterfaces, then the superclass
    fn lookup_field(
        &self,
        scratch: &Bump,
        class: &Arc<ClassInfo>,
        name: &UnqualifiedName,
        descriptor: &str,
    ) -> Option<Arc<FieldInfo>> {
        let mut to_visit = BumpVec::new_in(scratch);
        to_visit.push(class.clone());
        while let Some(class) = to_visit.pop() {
            if let Some(field) = class.find_field(name, descriptor) {
                return Some(field.clone());
            }
            // Pushed in reverse, so superinterfaces come off before the superclass
            if let Some(superclass) = self.graph().superclass_of(&class) {
                to_visit.push(superclass);
            }
            if let Some(linked) = class.linked() {
                to_visit.extend(linked.interfaces.iter().rev().cloned());
            }
        }
        None
    }

    fn referer_of(&self, refs: &ClassRefTable) -> Result<Arc<ClassInfo>> {
        self.graph().get(refs.owner()).ok_or_else(unknown_referer)
    }

    fn declaring_class(&self, id: ClassId) -> Result<Arc<ClassInfo>> {
        self.graph().get(id).ok_or_else(|| {
            Error::NoClassDefFound(format!("declaring class #{} is missing", id.index()))
        })
    }
}

/// Method lookup in a class: the superclass chain, then superinterfaces (preferring a default
/// method over an abstract one)
fn lookup_class_method(
    scratch: &Bump,
    class: &Arc<ClassInfo>,
    name: &UnqualifiedName,
    descriptor: &str,
) -> Option<Arc<MethodInfo>> {
    let mut chain = BumpVec::new_in(scratch);
    chain.extend(superclasses(Some(class.clone())));
    if let Some(method) = chain
        .iter()
        .find_map(|class| class.find_method(name, descriptor))
    {
        return Some(method);
    }
    lookup_superinterface_method(&superinterfaces(scratch, &chain), name, descriptor)
}

/// Interfaces implemented anywhere along a superclass chain, with their superinterfaces
fn superinterfaces(scratch: &Bump, chain: &[Arc<ClassInfo>]) -> Vec<Arc<ClassInfo>> {
    let mut interfaces = BumpVec::new_in(scratch);
    for class in chain {
        if let Some(linked) = class.linked() {
            interfaces.extend(linked.interfaces.iter().cloned());
        }
    }
    interface_closure(&interfaces)
}

/// Method lookup in an interface: the interface itself, then superinterfaces, then the public
/// instance methods of `java/lang/Object`
fn lookup_interface_method(
    interface: &Arc<ClassInfo>,
    name: &UnqualifiedName,
    descriptor: &str,
) -> Option<Arc<MethodInfo>> {
    if let Some(method) = interface.find_method(name, descriptor) {
        return Some(method);
    }

    let linked = interface.linked()?;
    let superinterfaces = interface_closure(&linked.interfaces);
    let inherited = lookup_superinterface_method(&superinterfaces, name, descriptor);
    if inherited.is_some() {
        return inherited;
    }

    superclasses(linked.superclass.clone())
        .find_map(|class| class.find_method(name, descriptor))
        .filter(|method| {
            method.access_flags.contains(MethodAccessFlags::PUBLIC) && !method.is_static()
        })
}

fn lookup_superinterface_method(
    interfaces: &[Arc<ClassInfo>],
    name: &UnqualifiedName,
    descriptor: &str,
) -> Option<Arc<MethodInfo>> {
    let candidates: Vec<Arc<MethodInfo>> = interfaces
        .iter()
        .filter_map(|interface| interface.find_method(name, descriptor))
        .filter(|method| !method.is_private() && !method.is_static())
        .collect();
    candidates
        .iter()
        .find(|method| !method.is_abstract())
        .or_else(|| candidates.first())
        .cloned()
}

/// Class that a loading constraint on this type is about, if any
fn constrained_class(refs: &ClassRefTable, typ: &TypeDesc) -> Option<ClassName> {
    let name = refs.type_class_name(typ)?;
    name.referenced_class().map(ClassName::from)
}

fn unknown_referer() -> Error {
    Error::Linkage("reference from a class the VM does not know".to_owned())
}
