use crate::jvm::class_graph::FieldInfo;
use crate::settings::DataLayout;
use crate::util::align_up;
use std::sync::Arc;

/// Instance layout of a class
#[derive(Debug, PartialEq, Eq)]
pub struct InstanceLayout {
    /// Offset of every field (`None` for static fields), indexed like the class's fields
    pub field_offsets: Vec<Option<usize>>,

    pub instance_size: usize,
    pub has_references: bool,
}

impl InstanceLayout {
    /// Lay out the instance fields of a class after those of its superclass
    ///
    /// Fields are placed in declaration order, each aligned to its own alignment. `inherited` is
    /// the instance size and reference flag of the superclass (or `None` for the root class,
    /// whose instances are just a header).
    pub fn compute(
        layout: &DataLayout,
        inherited: Option<(usize, bool)>,
        fields: &[Arc<FieldInfo>],
    ) -> InstanceLayout {
        let (mut instance_size, mut has_references) =
            inherited.unwrap_or((layout.header_size, false));

        let field_offsets = fields
            .iter()
            .map(|field| {
                if field.is_static() {
                    return None;
                }
                let (size, align) = layout.size_and_align(&field.descriptor);
                let offset = align_up(instance_size, align);
                instance_size = offset + size;
                has_references |= field.descriptor.is_reference();
                Some(offset)
            })
            .collect();

        InstanceLayout {
            field_offsets,
            instance_size,
            has_references,
        }
    }
}
