use crate::jvm::class_graph::{ClassGraph, ClassInfo};
use crate::jvm::Visibility;

/// Can code in `referer` name the class `target`?
///
/// Array classes carry the accessibility of their element class, so they need no special case.
pub(crate) fn is_class_accessible(referer: &ClassInfo, target: &ClassInfo) -> bool {
    target.is_public() || referer.same_runtime_package(target)
}

/// Can code in `referer` access a member with the given visibility, declared in `declaring`?
pub(crate) fn is_member_accessible(
    graph: &ClassGraph,
    referer: &ClassInfo,
    declaring: &ClassInfo,
    visibility: Visibility,
) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Private => referer.id == declaring.id,
        Visibility::Package => referer.same_runtime_package(declaring),
        Visibility::Protected => {
            referer.same_runtime_package(declaring) || graph.is_subclass_of(referer, declaring)
        }
    }
}
