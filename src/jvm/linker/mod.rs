//! Linking: instance layout, dispatch tables, and subtype numbering
//!
//! A class is linked once all of its ancestors are. Linking a class therefore starts by resolving
//! and linking its superclass and interfaces (outside of the class's monitor, so that a thread
//! never holds more than one class monitor), then builds everything under the monitor. The last
//! step inserts the class in the class hierarchy, which renumbers every class and is the one
//! point where linking needs the whole hierarchy to itself.

mod array;
mod invalidation;
mod layout;
mod vtable;

pub use array::*;
pub use invalidation::*;
pub use layout::*;
pub use vtable::*;

use crate::jvm::class_graph::{ClassId, ClassInfo, ClassState, LinkedClass, MethodInfo};
use crate::jvm::resolver::{access, ResolveMode};
use crate::jvm::{ClassName, Error, FieldType, Name, Result, UnqualifiedName, Visibility};
use crate::Vm;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use std::sync::Arc;

/// Classes being linked by the current call chain, innermost last
#[derive(Default)]
struct LinkStack(Vec<ClassId>);

/// Linked ancestors of a class about to be linked
struct Ancestors {
    superclass: Option<Arc<ClassInfo>>,
    interfaces: Vec<Arc<ClassInfo>>,

    /// Component class, for arrays of references
    component: Option<Arc<ClassInfo>>,
}

impl Vm {
    /// Link a class (and all of its ancestors), returning its virtual table
    ///
    /// Linking is idempotent: once a class is linked, this returns the same table right away.
    /// Failure is permanent: the class is left erroneous, and linking it again fails with the
    /// same error.
    pub fn link_class(&self, class: &Arc<ClassInfo>) -> Result<Arc<VTable>> {
        self.link_with(class, &mut LinkStack::default())
    }

    fn link_with(&self, class: &Arc<ClassInfo>, stack: &mut LinkStack) -> Result<Arc<VTable>> {
        if let Some(vtable) = class.vtable() {
            return Ok(vtable.clone());
        }
        if stack.0.contains(&class.id) {
            return Err(Error::ClassCircularity(class.name.as_str().to_owned()));
        }

        stack.0.push(class.id);
        let result = self
            .link_ancestors(class, stack)
            .and_then(|ancestors| self.link_locked(class, ancestors));
        stack.0.pop();

        if let Err(err) = &result {
            let mut state = class.monitor();
            if !matches!(*state, ClassState::Linked | ClassState::Erroneous(_)) {
                log::debug!("Linking {} failed: {}", class.name.as_str(), err);
                *state = ClassState::Erroneous(err.clone());
            }
        }
        result
    }

    fn link_ancestors(&self, class: &Arc<ClassInfo>, stack: &mut LinkStack) -> Result<Ancestors> {
        if let ClassState::Erroneous(err) = class.state() {
            return Err(err);
        }

        let superclass = match class.superclass {
            None => None,
            Some(index) => {
                let superclass = self
                    .resolve_classref(&class.refs, index, ResolveMode::Eager, false, false)
                    .into_result(class.superclass_name())?;
                if superclass.is_interface() {
                    return Err(Error::IncompatibleClassChange(format!(
                        "class {} has interface {} as super class",
                        class.name.as_str(),
                        superclass.name.as_str()
                    )));
                }
                if superclass.is_final() {
                    return Err(Error::Verify(format!(
                        "Cannot inherit from final class {} (in {})",
                        superclass.name.as_str(),
                        class.name.as_str()
                    )));
                }
                if !access::is_class_accessible(class, &superclass) {
                    return Err(Error::IllegalAccess(format!(
                        "class {} cannot access its superclass {}",
                        class.name.as_str(),
                        superclass.name.as_str()
                    )));
                }
                self.link_with(&superclass, stack)?;
                Some(superclass)
            }
        };

        let mut interfaces = Vec::with_capacity(class.interfaces.len());
        for index in &class.interfaces {
            let interface = self
                .resolve_classref(&class.refs, *index, ResolveMode::Eager, false, false)
                .into_result(class.refs.name(*index))?;
            if !interface.is_interface() {
                return Err(Error::IncompatibleClassChange(format!(
                    "class {} can not implement {}, because it is not an interface",
                    class.name.as_str(),
                    interface.name.as_str()
                )));
            }
            if !access::is_class_accessible(class, &interface) {
                return Err(Error::IllegalAccess(format!(
                    "class {} cannot access its superinterface {}",
                    class.name.as_str(),
                    interface.name.as_str()
                )));
            }
            self.link_with(&interface, stack)?;
            interfaces.push(interface);
        }

        let component = match class.name.component_type() {
            Some(FieldType::Ref(component_type)) => {
                let component_name = ClassName::of_ref_type(&component_type);
                let component = self.load_class(class.loader, &component_name)?;
                self.link_with(&component, stack)?;
                Some(component)
            }
            _ => None,
        };

        Ok(Ancestors {
            superclass,
            interfaces,
            component,
        })
    }

    fn link_locked(&self, class: &Arc<ClassInfo>, ancestors: Ancestors) -> Result<Arc<VTable>> {
        let mut state = class.monitor();
        match &*state {
            ClassState::Linked => {
                return class.vtable().cloned().ok_or_else(|| {
                    Error::Linkage(format!("{} is linked but has no vtable", class.name.as_str()))
                })
            }
            ClassState::Erroneous(err) => return Err(err.clone()),
            ClassState::Loaded | ClassState::Linking => (),
        }

        *state = ClassState::Linking;
        log::debug!("Linking {}", class.name.as_str());
        match self.link_intern(class, ancestors) {
            Ok(vtable) => {
                *state = ClassState::Linked;
                log::debug!(
                    "Linked {} ({} virtual slots, instance size {})",
                    class.name.as_str(),
                    vtable.len(),
                    class.instance_size().unwrap_or(0)
                );
                Ok(vtable)
            }
            Err(err) => {
                log::debug!("Linking {} failed: {}", class.name.as_str(), err);
                *state = ClassState::Erroneous(err.clone());
                Err(err)
            }
        }
    }

    fn link_intern(&self, class: &Arc<ClassInfo>, ancestors: Ancestors) -> Result<Arc<VTable>> {
        let interface_index = if class.is_interface() {
            Some(self.graph().hierarchy_mut().assign_interface_index())
        } else {
            None
        };

        let table = if class.is_interface() {
            vec![]
        } else {
            self.build_virtual_table(class, &ancestors)?
        };
        let interface_table = self.build_interface_table(class, &ancestors, interface_index)?;

        let inherited = ancestors
            .superclass
            .as_ref()
            .and_then(|superclass| superclass.linked())
            .map(|linked| (linked.instance_size, linked.has_references));
        let layout = InstanceLayout::compute(&self.settings().layout, inherited, &class.fields);

        let finalizer = if class.is_interface() {
            None
        } else {
            std::iter::once(class.clone())
                .chain(superclasses(ancestors.superclass.clone()))
                .find_map(|ancestor| {
                    ancestor
                        .find_method(&UnqualifiedName::FINALIZE, "()V")
                        .filter(|method| !method.is_static())
                })
        };

        let array_descriptor = match class.name.component_type() {
            None => None,
            Some(component_type) => {
                let component = ancestors
                    .component
                    .as_ref()
                    .and_then(|component| component.vtable().cloned());
                Some(ArrayDescriptor::new(
                    &self.settings().layout,
                    &component_type,
                    component,
                ))
            }
        };

        let vtable = Arc::new(VTable::new(
            class,
            interface_index,
            table,
            interface_table,
            array_descriptor,
        ));

        // Publish only once numbered, so no type check ever sees an unnumbered class
        let mut hierarchy = self.graph().hierarchy_mut();
        if !class.is_interface() {
            let superclass = ancestors.superclass.as_ref().map(|superclass| superclass.id);
            hierarchy.insert_class(vtable.clone(), superclass);
        }
        class.set_linked(LinkedClass {
            superclass: ancestors.superclass,
            interfaces: ancestors.interfaces,
            vtable: vtable.clone(),
            field_offsets: layout.field_offsets,
            instance_size: layout.instance_size,
            has_references: layout.has_references,
            finalizer,
        });
        Ok(vtable)
    }

    /// Assign virtual slots to the methods of a (non-interface) class and build its table
    fn build_virtual_table(
        &self,
        class: &Arc<ClassInfo>,
        ancestors: &Ancestors,
    ) -> Result<Vec<MethodEntry>> {
        let mut table: Vec<MethodEntry> = match &ancestors.superclass {
            Some(superclass) => superclass
                .vtable()
                .map(|vtable| vtable.entries().to_vec())
                .unwrap_or_default(),
            None => vec![],
        };

        for method in class.methods() {
            if !method.is_virtual() {
                continue;
            }
            let overridden = if method.is_private() {
                None
            } else {
                find_overridden(class, ancestors.superclass.clone(), &method)
            };

            let slot = match overridden {
                None => {
                    table.push(MethodEntry::AbstractMethodError(None));
                    table.len() - 1
                }
                Some(overridden) => self.override_method(class, &method, &overridden)?,
            };
            method.set_vtable_index(slot);
            table[slot] = MethodEntry::for_method(&method);
        }

        if class.is_abstract() {
            let scope = self.dump().checkpoint();
            let missing = unimplemented_interface_methods(&scope, class, ancestors);
            for (interface_method, default) in missing.iter() {
                let miranda = class.add_miranda(interface_method);
                table.push(match default {
                    Some(default) => MethodEntry::Method(default.clone()),
                    None => MethodEntry::for_method(&miranda),
                });
                miranda.set_vtable_index(table.len() - 1);
                log::debug!(
                    "Added miranda method {:?} to {} in slot {}",
                    interface_method,
                    class.name.as_str(),
                    table.len() - 1
                );
            }
        }

        Ok(table)
    }

    /// Take over the slot of an overridden method, returning the slot
    fn override_method(
        &self,
        class: &ClassInfo,
        method: &Arc<MethodInfo>,
        overridden: &Arc<MethodInfo>,
    ) -> Result<usize> {
        if overridden.is_final() {
            return Err(Error::Verify(format!(
                "{:?} overrides final method {:?}",
                method, overridden
            )));
        }
        let slot = overridden.vtable_index().ok_or_else(|| {
            Error::Linkage(format!("{:?} was never assigned a virtual slot", overridden))
        })?;

        if self.settings().verify {
            if let Some(declaring) = self.graph().get(overridden.id.class) {
                if declaring.loader != class.loader {
                    self.add_method_constraints(class.loader, declaring.loader, method)?;
                }
            }
        }

        for caller in overridden.mark_overridden(!method.is_abstract()) {
            self.invalidations().push(Invalidation {
                caller,
                callee: overridden.id,
                overrider: method.id,
            });
        }
        log::trace!("{:?} overrides {:?} in slot {}", method, overridden, slot);
        Ok(slot)
    }

    /// Build the interface table: one row per implemented interface (including the class itself
    /// for interfaces), with an entry per method of that interface
    fn build_interface_table(
        &self,
        class: &Arc<ClassInfo>,
        ancestors: &Ancestors,
        interface_index: Option<usize>,
    ) -> Result<Vec<Option<Box<[MethodEntry]>>>> {
        let mut implemented: Vec<Arc<ClassInfo>> = vec![];
        if interface_index.is_some() {
            implemented.push(class.clone());
        }
        for ancestor in superclasses(ancestors.superclass.clone()) {
            if let Some(linked) = ancestor.linked() {
                implemented.extend(linked.interfaces.iter().cloned());
            }
        }
        implemented.extend(ancestors.interfaces.iter().cloned());
        let implemented = interface_closure(&implemented);

        let mut interface_table: Vec<Option<Box<[MethodEntry]>>> = vec![];
        for interface in &implemented {
            let index = if interface.id == class.id {
                interface_index
            } else {
                interface.vtable().and_then(|vtable| vtable.interface_index())
            };
            let index = index.ok_or_else(|| {
                Error::Linkage(format!("interface {} is not linked", interface.name.as_str()))
            })?;

            let mut row = vec![];
            for interface_method in interface.methods() {
                row.push(self.interface_entry(class, ancestors, &implemented, &interface_method)?);
            }
            if row.is_empty() {
                row.push(MethodEntry::AbstractMethodError(None));
            }

            if interface_table.len() <= index {
                interface_table.resize_with(index + 1, || None);
            }
            interface_table[index] = Some(row.into_boxed_slice());
        }
        Ok(interface_table)
    }

    fn interface_entry(
        &self,
        class: &Arc<ClassInfo>,
        ancestors: &Ancestors,
        implemented: &[Arc<ClassInfo>],
        interface_method: &Arc<MethodInfo>,
    ) -> Result<MethodEntry> {
        if !interface_method.is_virtual() || interface_method.is_private() {
            return Ok(MethodEntry::AbstractMethodError(Some(interface_method.clone())));
        }
        let name = &interface_method.name;
        let descriptor = interface_method.descriptor_string.as_str();

        // The class itself and its superclasses (interfaces only look at themselves)
        let superclass = if class.is_interface() {
            None
        } else {
            ancestors.superclass.clone()
        };
        let declared = std::iter::once(class.clone())
            .chain(superclasses(superclass))
            .filter_map(|ancestor| ancestor.find_method(name, descriptor))
            .find(|method| !method.is_static() && !method.is_private());
        if let Some(method) = &declared {
            if !method.is_miranda() {
                return Ok(MethodEntry::for_method(method));
            }
        }

        // Default methods
        if !interface_method.is_abstract() {
            return Ok(MethodEntry::Method(interface_method.clone()));
        }
        if let Some(default) = find_default(implemented, name, descriptor) {
            return Ok(MethodEntry::Method(default));
        }

        let concrete = !class.is_abstract() && !class.is_interface();
        if concrete && self.settings().require_concrete_implementations {
            return Err(Error::Verify(format!(
                "class {} does not implement interface method {:?}",
                class.name.as_str(),
                interface_method
            )));
        }
        Ok(MethodEntry::AbstractMethodError(Some(
            declared.unwrap_or_else(|| interface_method.clone()),
        )))
    }
}

/// Linked superclass chain, starting from `first`
pub(crate) fn superclasses(first: Option<Arc<ClassInfo>>) -> impl Iterator<Item = Arc<ClassInfo>> {
    std::iter::successors(first, |class| {
        class.linked().and_then(|linked| linked.superclass.clone())
    })
}

/// Interfaces along with all their (linked) superinterfaces, without duplicates
pub(crate) fn interface_closure(interfaces: &[Arc<ClassInfo>]) -> Vec<Arc<ClassInfo>> {
    let mut closure: Vec<Arc<ClassInfo>> = vec![];
    let mut to_visit: Vec<Arc<ClassInfo>> = interfaces.iter().rev().cloned().collect();
    while let Some(interface) = to_visit.pop() {
        if closure.iter().any(|seen| seen.id == interface.id) {
            continue;
        }
        if let Some(linked) = interface.linked() {
            to_visit.extend(linked.interfaces.iter().rev().cloned());
        }
        closure.push(interface);
    }
    closure
}

/// Abstract interface methods that neither the class nor any superclass implements, each with
/// the default method that stands in for it (if some interface provides one)
///
/// Only interfaces the class itself declares (and their superinterfaces) are considered: the
/// interfaces of superclasses got their miranda methods when the superclasses were linked.
fn unimplemented_interface_methods<'s>(
    scratch: &'s Bump,
    class: &Arc<ClassInfo>,
    ancestors: &Ancestors,
) -> BumpVec<'s, (Arc<MethodInfo>, Option<Arc<MethodInfo>>)> {
    let closure = interface_closure(&ancestors.interfaces);
    let mut missing: BumpVec<(Arc<MethodInfo>, Option<Arc<MethodInfo>>)> =
        BumpVec::new_in(scratch);

    for interface in &closure {
        for interface_method in interface.methods() {
            if !interface_method.is_abstract() || interface_method.is_static() {
                continue;
            }
            let name = &interface_method.name;
            let descriptor = interface_method.descriptor_string.as_str();
            let implemented = std::iter::once(class.clone())
                .chain(superclasses(ancestors.superclass.clone()))
                .any(|ancestor| ancestor.find_method(name, descriptor).is_some());
            let duplicate = missing
                .iter()
                .any(|(other, _)| other.matches(name, descriptor));
            if !implemented && !duplicate {
                let default = find_default(&closure, name, descriptor);
                missing.push((interface_method, default));
            }
        }
    }
    missing
}

/// Default method with this signature in any of the interfaces
fn find_default(
    interfaces: &[Arc<ClassInfo>],
    name: &UnqualifiedName,
    descriptor: &str,
) -> Option<Arc<MethodInfo>> {
    interfaces
        .iter()
        .filter_map(|interface| interface.find_method(name, descriptor))
        .find(|method| !method.is_abstract() && !method.is_static() && !method.is_private())
}

/// Method of some superclass that `method` overrides
///
/// Private methods are never overridden, and package-private methods only from within their
/// runtime package (a more distant accessible ancestor method can still be overridden).
fn find_overridden(
    class: &ClassInfo,
    superclass: Option<Arc<ClassInfo>>,
    method: &MethodInfo,
) -> Option<Arc<MethodInfo>> {
    superclasses(superclass).find_map(|ancestor| {
        let candidate = ancestor.find_method(&method.name, &method.descriptor_string)?;
        if !candidate.is_virtual() || candidate.is_private() {
            return None;
        }
        let package_private = candidate.access_flags.visibility() == Visibility::Package;
        if package_private && !class.same_runtime_package(&ancestor) {
            return None;
        }
        Some(candidate)
    })
}
