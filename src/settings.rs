use crate::jvm::{BaseType, FieldType};

#[derive(Clone, Debug)]
pub struct Settings {
    /// Sizes and alignments used when laying out instances and arrays
    pub layout: DataLayout,

    /// Run the checks the bytecode verifier relies on
    ///
    /// This covers loading constraints (for overriding methods and for resolved fields and
    /// methods) as well as the subtype constraint sets attached to resolution requests. Turning
    /// it off is only sound for fully trusted classes.
    pub verify: bool,

    /// Refuse to link a concrete class that leaves an interface method unimplemented
    ///
    /// When this is off, the interface table slot holds the `AbstractMethodError` trampoline and
    /// the error only surfaces if the method is actually invoked (which is what most JVMs do).
    pub require_concrete_implementations: bool,
}

impl Settings {
    /// Default settings for the host platform
    pub fn new() -> Settings {
        Settings {
            layout: DataLayout::host(),
            verify: true,
            require_concrete_implementations: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}

/// Target data layout for instances and arrays
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    /// Size (and alignment) of a reference
    pub pointer_size: usize,

    /// Alignment of `long` and `double` fields
    ///
    /// Some 32-bit ABIs only align these to 4 bytes.
    pub long_align: usize,

    /// Size of the object header (vtable pointer plus lock word)
    pub header_size: usize,
}

impl DataLayout {
    /// 64-bit pointers, 8-byte aligned longs
    pub const LP64: DataLayout = DataLayout {
        pointer_size: 8,
        long_align: 8,
        header_size: 16,
    };

    /// 32-bit pointers, 4-byte aligned longs
    pub const ILP32: DataLayout = DataLayout {
        pointer_size: 4,
        long_align: 4,
        header_size: 8,
    };

    /// Layout matching the pointer width of the host
    pub const fn host() -> DataLayout {
        if cfg!(target_pointer_width = "64") {
            DataLayout::LP64
        } else {
            DataLayout::ILP32
        }
    }

    /// Size in bytes of a value of a primitive type
    pub const fn base_size(&self, base_type: BaseType) -> usize {
        match base_type {
            BaseType::Byte | BaseType::Boolean => 1,
            BaseType::Char | BaseType::Short => 2,
            BaseType::Int | BaseType::Float => 4,
            BaseType::Long | BaseType::Double => 8,
        }
    }

    /// Size and alignment in bytes of a field of the given type
    pub fn size_and_align<C>(&self, field_type: &FieldType<C>) -> (usize, usize) {
        match field_type {
            FieldType::Base(base @ (BaseType::Long | BaseType::Double)) => {
                (self.base_size(*base), self.long_align)
            }
            FieldType::Base(base) => (self.base_size(*base), self.base_size(*base)),
            FieldType::Ref(_) => (self.pointer_size, self.pointer_size),
        }
    }

    /// Offset of the `length` field in an array object
    pub const fn array_length_offset(&self) -> usize {
        self.header_size
    }
}
