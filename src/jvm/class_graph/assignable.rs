use super::{ClassGraph, ClassHierarchy};
use crate::jvm::linker::{ArrayDescriptor, ArrayKind, VTable};
use crate::jvm::{ClassName, Error, LoaderId, Object, Result};

/// Type checks built on the subtype numbering
///
/// Every check takes the hierarchy lock for reading, so it never observes a half renumbered
/// hierarchy.
impl ClassGraph {
    /// Is a value of the first class assignable to the second?
    pub fn is_assignable(&self, sub_type: &VTable, super_type: &VTable) -> bool {
        let hierarchy = self.hierarchy();
        is_assignable(&hierarchy, sub_type, super_type)
    }

    /// `instanceof`: null is never an instance of anything
    pub fn instance_of(&self, object: Option<&Object>, target: &VTable) -> bool {
        match object {
            None => false,
            Some(object) => self.is_assignable(object.vtable(), target),
        }
    }

    /// `checkcast`: like `instanceof`, except null passes
    pub fn check_cast(&self, object: Option<&Object>, target: &VTable) -> bool {
        match object {
            None => true,
            Some(object) => self.is_assignable(object.vtable(), target),
        }
    }

    /// Can `value` be stored into `array`? Null can always be stored.
    pub fn array_store_check(&self, array: &Object, value: Option<&Object>) -> Result<()> {
        let value = match value {
            None => return Ok(()),
            Some(value) => value,
        };
        let desc = array.vtable().array_descriptor().ok_or_else(|| {
            Error::ArrayStore(format!("{} is not an array", array.vtable().name))
        })?;

        let hierarchy = self.hierarchy();
        let allowed = match &desc.component {
            // Primitive arrays never hold references
            None => false,

            // One dimension: plain subtype test against the component class
            Some(component) if desc.dimension == 1 => {
                is_assignable(&hierarchy, value.vtable(), component)
            }

            // Deeper: the value must itself be a compatible array
            Some(component) => {
                let value_desc = value.vtable().array_descriptor();
                match (value_desc, component.array_descriptor()) {
                    (Some(value_desc), Some(component_desc)) => {
                        descriptors_compatible(&hierarchy, value_desc, component_desc)
                    }
                    _ => false,
                }
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::ArrayStore(format!(
                "{} cannot be stored in {}",
                value.vtable().name,
                array.vtable().name
            )))
        }
    }

    /// Are arrays with the first shape assignable to arrays with the second?
    pub fn descriptors_compatible(&self, desc: &ArrayDescriptor, target: &ArrayDescriptor) -> bool {
        let hierarchy = self.hierarchy();
        descriptors_compatible(&hierarchy, desc, target)
    }
}

/// Subtype test, for callers already holding the hierarchy lock
pub(crate) fn is_assignable(hierarchy: &ClassHierarchy, sub: &VTable, sup: &VTable) -> bool {
    if sub.class == sup.class {
        return true;
    }

    if let Some(index) = sup.interface_index() {
        return sub.implements_interface(index);
    }

    if let Some(target) = sup.array_descriptor() {
        return match sub.array_descriptor() {
            Some(desc) => descriptors_compatible(hierarchy, desc, target),
            None => false,
        };
    }

    // Interfaces are only assignable to `java/lang/Object` among classes
    if sub.is_interface() {
        return is_object(sup);
    }

    (sub.baseval().wrapping_sub(sup.baseval()) as u32) <= (sup.diffval() as u32)
}

/// Array covariance
///
/// Same dimension arrays compare element classes, higher dimension arrays are only assignable
/// to arrays of the classes every array is assignable to.
fn descriptors_compatible(
    hierarchy: &ClassHierarchy,
    desc: &ArrayDescriptor,
    target: &ArrayDescriptor,
) -> bool {
    if desc.array_type != target.array_type {
        return false;
    }
    if desc.array_type != ArrayKind::Object {
        // Same primitive component type, hence the same array class
        return true;
    }

    if desc.dimension == target.dimension {
        match (&desc.element, &target.element) {
            (Some(element), Some(target_element)) => {
                is_assignable(hierarchy, element, target_element)
            }
            (None, None) => desc.element_type == target.element_type,
            _ => false,
        }
    } else if desc.dimension > target.dimension {
        match &target.element {
            Some(target_element) => is_array_type_assignable(target_element),
            None => false,
        }
    } else {
        false
    }
}

fn is_object(vtable: &VTable) -> bool {
    vtable.loader == LoaderId::BOOTSTRAP && vtable.name == ClassName::OBJECT
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &VTable) -> bool {
    super_type.loader == LoaderId::BOOTSTRAP
        && (super_type.name == ClassName::OBJECT
            || super_type.name == ClassName::CLONEABLE
            || super_type.name == ClassName::SERIALIZABLE)
}
