use super::{ResolveMode, ResolveResult, SubtypeConstraintSet};
use crate::jvm::class_graph::{ClassInfo, ClassRefOrInfo};
use crate::jvm::{Error, Name};
use crate::Vm;
use std::sync::Arc;

/// Error to raise when a subtype constraint does not hold
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SubtypeError {
    /// Ordinary type constraint (argument and value types)
    Linkage,

    /// Protected member access: the instance must be of the accessing class
    IllegalAccess,
}

impl Vm {
    /// Check that every type in `set` is assignable to `supertype`
    ///
    /// If some type cannot be resolved without loading it (in lazy mode), the whole check is
    /// deferred. A type that fails to resolve altogether can never have instances, so it
    /// satisfies every constraint.
    pub fn check_subtype_set(
        &self,
        referer: &ClassInfo,
        set: &SubtypeConstraintSet,
        supertype: &ClassRefOrInfo,
        mode: ResolveMode,
        error: SubtypeError,
    ) -> ResolveResult<()> {
        if set.is_empty() {
            return ResolveResult::Succeeded(());
        }
        let supertype =
            try_resolve!(self.resolve_classref_or_classinfo(supertype, mode, false, true));

        let mut deferred = false;
        for subtype in &set.types {
            match self.resolve_subtype_check(referer, subtype, &supertype, mode, error) {
                ResolveResult::Succeeded(()) => (),
                ResolveResult::Deferred => deferred = true,
                ResolveResult::Failed(err) => return ResolveResult::Failed(err),
            }
        }
        if deferred {
            log::trace!(
                "Deferring subtype check against {} in {}",
                supertype.name.as_str(),
                referer.name.as_str()
            );
            ResolveResult::Deferred
        } else {
            ResolveResult::Succeeded(())
        }
    }

    fn resolve_subtype_check(
        &self,
        referer: &ClassInfo,
        subtype: &ClassRefOrInfo,
        supertype: &Arc<ClassInfo>,
        mode: ResolveMode,
        error: SubtypeError,
    ) -> ResolveResult<()> {
        // Arrays inherit nothing protected except `clone`, which they redeclare as public
        if error == SubtypeError::IllegalAccess && subtype.name().is_array() {
            return ResolveResult::Succeeded(());
        }

        // The verifier treats interface types like `java/lang/Object`
        if error == SubtypeError::Linkage && supertype.is_interface() {
            return ResolveResult::Succeeded(());
        }

        let subclass = match self.resolve_classref_or_classinfo(subtype, mode, false, true) {
            ResolveResult::Succeeded(subclass) => subclass,
            ResolveResult::Deferred => return ResolveResult::Deferred,
            ResolveResult::Failed(err) => {
                log::debug!(
                    "Subtype {} of {} does not resolve ({}), so it can have no instances",
                    subtype.name().as_str(),
                    supertype.name.as_str(),
                    err
                );
                return ResolveResult::Succeeded(());
            }
        };

        let assignable = match (subclass.vtable(), supertype.vtable()) {
            (Some(sub_vtable), Some(super_vtable)) => {
                self.graph().is_assignable(sub_vtable, super_vtable)
            }
            _ => false,
        };
        if assignable {
            return ResolveResult::Succeeded(());
        }

        let msg = format!(
            "subtype constraint violated ({} is not a subclass of {}) in {}",
            subclass.name.as_str(),
            supertype.name.as_str(),
            referer.name.as_str()
        );
        ResolveResult::Failed(match error {
            SubtypeError::Linkage => Error::Linkage(msg),
            SubtypeError::IllegalAccess => Error::IllegalAccess(msg),
        })
    }
}
