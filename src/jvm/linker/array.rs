use super::VTable;
use crate::jvm::{BaseType, FieldType};
use crate::settings::DataLayout;
use crate::util::align_up;
use std::fmt;
use std::sync::Arc;

/// Kind of value stored in an array
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ArrayKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,

    /// References (including references to arrays)
    Object,
}

impl ArrayKind {
    pub fn of<C>(field_type: &FieldType<C>) -> ArrayKind {
        match field_type {
            FieldType::Base(BaseType::Boolean) => ArrayKind::Boolean,
            FieldType::Base(BaseType::Byte) => ArrayKind::Byte,
            FieldType::Base(BaseType::Char) => ArrayKind::Char,
            FieldType::Base(BaseType::Short) => ArrayKind::Short,
            FieldType::Base(BaseType::Int) => ArrayKind::Int,
            FieldType::Base(BaseType::Long) => ArrayKind::Long,
            FieldType::Base(BaseType::Float) => ArrayKind::Float,
            FieldType::Base(BaseType::Double) => ArrayKind::Double,
            FieldType::Ref(_) => ArrayKind::Object,
        }
    }
}

/// Shape of an array class
///
/// Multi-dimensional arrays form a chain through `component`: the component of `[[I` is `[I`,
/// whose own descriptor has dimension 1 and no component class.
pub struct ArrayDescriptor {
    /// Kind of the components (`Object` for any array of references or of arrays)
    pub array_type: ArrayKind,

    /// Number of dimensions
    pub dimension: usize,

    /// Kind of the innermost elements
    pub element_type: ArrayKind,

    /// Class of the components (missing for primitive components)
    pub component: Option<Arc<VTable>>,

    /// Class of the innermost elements (missing for primitive elements)
    pub element: Option<Arc<VTable>>,

    /// Size in bytes of one component
    pub component_size: usize,

    /// Offset of the first component from the start of the array object
    pub data_offset: usize,
}

impl ArrayDescriptor {
    /// Descriptor for an array whose components have the given type
    ///
    /// For reference components, `component` is the linked component class.
    pub fn new(
        layout: &DataLayout,
        component_type: &FieldType<impl Sized>,
        component: Option<Arc<VTable>>,
    ) -> ArrayDescriptor {
        let array_type = ArrayKind::of(component_type);
        let (component_size, _) = layout.size_and_align(component_type);

        // The data follows the `length` field, aligned for the component type
        let length_end = layout.array_length_offset() + 4;
        let data_offset = align_up(length_end, component_size);

        let (dimension, element_type, element) =
            match component.as_ref().and_then(|comp| comp.array_descriptor()) {
                Some(inner) => (
                    inner.dimension + 1,
                    inner.element_type,
                    inner.element.clone(),
                ),
                None => (1, array_type, component.clone()),
            };

        ArrayDescriptor {
            array_type,
            dimension,
            element_type,
            component,
            element,
            component_size,
            data_offset,
        }
    }
}

impl fmt::Debug for ArrayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayDescriptor")
            .field("array_type", &self.array_type)
            .field("dimension", &self.dimension)
            .field("element_type", &self.element_type)
            .field("component", &self.component.as_ref().map(|c| &c.name))
            .field("element", &self.element.as_ref().map(|e| &e.name))
            .field("component_size", &self.component_size)
            .field("data_offset", &self.data_offset)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::BinaryName;

    #[test]
    fn primitive_arrays() {
        let layout = DataLayout::LP64;
        let ints = ArrayDescriptor::new(&layout, &FieldType::<BinaryName>::int(), None);
        assert_eq!(ints.array_type, ArrayKind::Int);
        assert_eq!(ints.element_type, ArrayKind::Int);
        assert_eq!(ints.dimension, 1);
        assert_eq!(ints.component_size, 4);
        assert_eq!(ints.data_offset, 20);

        let longs = ArrayDescriptor::new(&layout, &FieldType::<BinaryName>::long(), None);
        assert_eq!(longs.component_size, 8);
        assert_eq!(longs.data_offset, 24);

        let byte = FieldType::<BinaryName>::byte();
        let bytes = ArrayDescriptor::new(&DataLayout::ILP32, &byte, None);
        assert_eq!(bytes.component_size, 1);
        assert_eq!(bytes.data_offset, 12);
    }
}
