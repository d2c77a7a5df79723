use super::class_graph::{ClassId, ClassRefTable, LoaderId};
use super::{
    BinaryName, ClassName, Error, FieldType, MethodAccessFlags, MethodDescriptor, Name,
    ParseDescriptor, RefType, Result,
};
use crate::util::Width;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Maximum number of argument slots a method may take (including `this`)
pub const MAX_PARAMETER_SLOTS: usize = 255;

/// Index into the class reference table of the class that owns a descriptor
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassRefIndex(pub u16);

/// Parsed field type whose classes point into a class reference table
///
/// For object arrays, the index is that of the element class.
pub type TypeDesc = FieldType<ClassRefIndex>;

/// What occupies slot 0 of a method's arguments
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ThisParam {
    /// Static methods have no receiver
    Static,

    /// Instance methods receive `this`, typed as the given class
    Instance(ClassRefIndex),
}

/// Parsed method descriptor
///
/// Descriptors of declared methods are shared between every method of the class with the same
/// signature and staticness. Descriptors parsed without knowing whether the method is static (as
/// happens for call sites) reserve the receiver slot and get finalized once resolution has found
/// the target method.
#[derive(Debug)]
pub struct MethodDesc {
    pub descriptor: MethodDescriptor<ClassRefIndex>,
    declared_slots: usize,
    this: OnceLock<ThisParam>,
}

impl MethodDesc {
    /// Receiver of the method, unless it has not been finalized yet
    pub fn this_param(&self) -> Option<ThisParam> {
        self.this.get().copied()
    }

    pub fn is_finalized(&self) -> bool {
        self.this.get().is_some()
    }

    /// Number of argument slots, counting `this` unless the method is known to be static
    pub fn param_slots(&self) -> usize {
        match self.this.get() {
            Some(ThisParam::Static) => self.declared_slots,
            _ => self.declared_slots + 1,
        }
    }

    /// Fill in the reserved receiver slot
    ///
    /// Returns `false` if the descriptor was already finalized with a different receiver.
    pub fn finalize(&self, access_flags: MethodAccessFlags, this: ClassRefIndex) -> bool {
        let param = if access_flags.contains(MethodAccessFlags::STATIC) {
            ThisParam::Static
        } else {
            ThisParam::Instance(this)
        };
        *self.this.get_or_init(|| param) == param
    }
}

/// Per-class interning and parsing of descriptors
///
/// All class names mentioned by the descriptors of a class are registered exactly once, producing
/// the class reference table. Parsed descriptors are cached so that identical strings share one
/// parsed representation.
pub struct DescriptorPool {
    class_names: Vec<ClassName>,
    class_indices: HashMap<String, ClassRefIndex>,
    field_types: HashMap<String, TypeDesc>,
    method_types: HashMap<String, (MethodDescriptor<ClassRefIndex>, usize)>,
    methods: HashMap<(String, ThisParam), Arc<MethodDesc>>,
}

impl DescriptorPool {
    /// Pool for a class, whose own name is registered first
    pub fn new(this_class: &ClassName) -> DescriptorPool {
        let mut pool = DescriptorPool {
            class_names: vec![],
            class_indices: HashMap::new(),
            field_types: HashMap::new(),
            method_types: HashMap::new(),
            methods: HashMap::new(),
        };
        pool.intern_class(this_class.clone());
        pool
    }

    /// Reference to the class owning the pool
    pub const fn this_class(&self) -> ClassRefIndex {
        ClassRefIndex(0)
    }

    /// Register a class name (binary name or array descriptor)
    ///
    /// Re-adding a name returns the existing index.
    pub fn add_class(&mut self, name: &str) -> Result<ClassRefIndex> {
        if let Some(index) = self.lookup_class(name) {
            return Ok(index);
        }
        let class_name = ClassName::from_string(name.to_owned())
            .map_err(|msg| Error::ClassFormat(format!("Invalid class name '{}': {}", name, msg)))?;
        if self.class_names.len() > u16::MAX as usize {
            return Err(Error::ClassFormat(format!(
                "Too many class references (adding '{}')",
                name
            )));
        }
        Ok(self.intern_class(class_name))
    }

    fn lookup_class(&self, name: &str) -> Option<ClassRefIndex> {
        self.class_indices.get(name).copied()
    }

    fn intern_class(&mut self, name: ClassName) -> ClassRefIndex {
        let index = ClassRefIndex(self.class_names.len() as u16);
        self.class_indices.insert(name.as_str().to_owned(), index);
        self.class_names.push(name);
        index
    }

    fn intern_binary_name(&mut self, name: &BinaryName) -> Result<ClassRefIndex> {
        self.add_class(name.as_str())
    }

    fn intern_field_type(&mut self, field_type: &FieldType<BinaryName>) -> Result<TypeDesc> {
        Ok(match field_type {
            FieldType::Base(base) => FieldType::Base(*base),
            FieldType::Ref(RefType::PrimitiveArray(arr)) => {
                FieldType::Ref(RefType::PrimitiveArray(*arr))
            }
            FieldType::Ref(RefType::Object(name)) => {
                FieldType::object(self.intern_binary_name(name)?)
            }
            FieldType::Ref(RefType::ObjectArray(arr)) => {
                let element = self.intern_binary_name(&arr.element_type)?;
                FieldType::Ref(RefType::ObjectArray(arr.map(|_| element)))
            }
        })
    }

    /// Validate a descriptor and register the classes it mentions
    ///
    /// Returns the number of argument slots for method descriptors (not counting `this`) and the
    /// width of the type for field descriptors.
    pub fn add_descriptor(&mut self, desc: &str) -> Result<usize> {
        if desc.starts_with('(') {
            self.add_method_descriptor(desc)
        } else {
            self.parse_field_descriptor(desc).map(|typ| typ.width())
        }
    }

    fn add_method_descriptor(&mut self, desc: &str) -> Result<usize> {
        if let Some((_, slots)) = self.method_types.get(desc) {
            return Ok(*slots);
        }
        let parsed =
            MethodDescriptor::<BinaryName>::parse(desc).map_err(|msg| malformed(desc, msg))?;
        let slots = parsed.parameter_length(false);
        if slots > MAX_PARAMETER_SLOTS {
            return Err(too_many_slots(desc, slots));
        }

        let mut parameters = Vec::with_capacity(parsed.parameters.len());
        for parameter in &parsed.parameters {
            parameters.push(self.intern_field_type(parameter)?);
        }
        let return_type = match &parsed.return_type {
            None => None,
            Some(return_type) => Some(self.intern_field_type(return_type)?),
        };
        let descriptor = MethodDescriptor {
            parameters,
            return_type,
        };
        self.method_types.insert(desc.to_owned(), (descriptor, slots));
        Ok(slots)
    }

    /// Parse a field descriptor, registering the class it mentions
    pub fn parse_field_descriptor(&mut self, desc: &str) -> Result<TypeDesc> {
        if let Some(typ) = self.field_types.get(desc) {
            return Ok(*typ);
        }
        let parsed = FieldType::<BinaryName>::parse(desc).map_err(|msg| malformed(desc, msg))?;
        let typ = self.intern_field_type(&parsed)?;
        self.field_types.insert(desc.to_owned(), typ);
        Ok(typ)
    }

    /// Parse a method descriptor
    ///
    /// When `access_flags` is `None`, the staticness of the method is not yet known: slot 0 is
    /// reserved for a receiver but left for [`MethodDesc::finalize`] to fill in.
    pub fn parse_method_descriptor(
        &mut self,
        desc: &str,
        access_flags: Option<MethodAccessFlags>,
        this_class: ClassRefIndex,
    ) -> Result<Arc<MethodDesc>> {
        let declared_slots = self.add_method_descriptor(desc)?;
        let this = access_flags.map(|flags| {
            if flags.contains(MethodAccessFlags::STATIC) {
                ThisParam::Static
            } else {
                ThisParam::Instance(this_class)
            }
        });
        if this != Some(ThisParam::Static) && declared_slots + 1 > MAX_PARAMETER_SLOTS {
            return Err(too_many_slots(desc, declared_slots + 1));
        }

        if let Some(this) = this {
            if let Some(method_desc) = self.methods.get(&(desc.to_owned(), this)) {
                return Ok(method_desc.clone());
            }
        }

        let descriptor = match self.method_types.get(desc) {
            Some((descriptor, _)) => descriptor.clone(),
            None => return Err(malformed(desc, "descriptor was not registered".to_owned())),
        };
        let method_desc = Arc::new(MethodDesc {
            descriptor,
            declared_slots,
            this: match this {
                Some(this) => OnceLock::from(this),
                None => OnceLock::new(),
            },
        });
        if let Some(this) = this {
            self.methods.insert((desc.to_owned(), this), method_desc.clone());
        }
        Ok(method_desc)
    }

    /// Registered class names, in index order
    pub fn class_names(&self) -> &[ClassName] {
        &self.class_names
    }

    /// Freeze the class references into the table of the class with the given id
    pub fn finish(self, owner: ClassId, loader: LoaderId) -> ClassRefTable {
        ClassRefTable::new(owner, loader, self.class_names)
    }
}

fn malformed(desc: &str, msg: String) -> Error {
    Error::ClassFormat(format!("Invalid descriptor '{}': {}", desc, msg))
}

fn too_many_slots(desc: &str, slots: usize) -> Error {
    Error::ClassFormat(format!(
        "Too many arguments in signature '{}' ({} slots, at most {} allowed)",
        desc, slots, MAX_PARAMETER_SLOTS
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::BaseType;

    fn pool() -> DescriptorPool {
        let name = ClassName::from_string("me/alec/Foo".to_owned()).unwrap();
        DescriptorPool::new(&name)
    }

    #[test]
    fn classes_are_interned_once() {
        let mut pool = pool();
        let string = pool.add_class("java/lang/String").unwrap();
        assert_eq!(pool.add_class("java/lang/String").unwrap(), string);
        assert_eq!(pool.add_class("me/alec/Foo").unwrap(), pool.this_class());

        let array = pool.add_class("[Ljava/lang/String;").unwrap();
        assert_ne!(array, string);
        assert_eq!(pool.class_names().len(), 3);

        assert!(matches!(
            pool.add_class("java.lang.String"),
            Err(Error::ClassFormat(_))
        ));
        assert!(matches!(pool.add_class("[Q"), Err(Error::ClassFormat(_))));
    }

    #[test]
    fn descriptors_register_classes() {
        let mut pool = pool();
        assert_eq!(pool.add_descriptor("J").unwrap(), 2);
        assert_eq!(pool.add_descriptor("Ljava/lang/Object;").unwrap(), 1);
        assert_eq!(
            pool.add_descriptor("(I[Ljava/lang/String;DLjava/lang/Object;)V")
                .unwrap(),
            5
        );
        let names: Vec<&str> = pool.class_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["me/alec/Foo", "java/lang/Object", "java/lang/String"]);

        let typ = pool.parse_field_descriptor("[[Ljava/lang/String;").unwrap();
        assert_eq!(
            typ,
            FieldType::array(FieldType::array(FieldType::object(ClassRefIndex(2))))
        );
        assert_eq!(
            pool.parse_field_descriptor("Z").unwrap(),
            FieldType::Base(BaseType::Boolean)
        );
    }

    #[test]
    fn malformed_descriptors_name_the_descriptor() {
        let mut pool = pool();
        match pool.add_descriptor("(Ljava/lang/Object)V") {
            Err(Error::ClassFormat(msg)) => assert!(msg.contains("(Ljava/lang/Object)V")),
            other => panic!("expected a class format error, got {:?}", other),
        }
    }

    #[test]
    fn slot_limit() {
        let mut pool = pool();
        let longs = format!("({})V", "J".repeat(127));
        assert_eq!(pool.add_descriptor(&longs).unwrap(), 254);
        let this = pool.this_class();

        // 254 + `this` still fits
        let method = pool
            .parse_method_descriptor(&longs, Some(MethodAccessFlags::PUBLIC), this)
            .unwrap();
        assert_eq!(method.param_slots(), 255);

        let too_many = format!("({}I)V", "J".repeat(127));
        assert!(pool
            .parse_method_descriptor(&too_many, Some(MethodAccessFlags::STATIC), this)
            .is_ok());
        assert!(matches!(
            pool.parse_method_descriptor(&too_many, Some(MethodAccessFlags::PUBLIC), this),
            Err(Error::ClassFormat(_))
        ));
        assert!(matches!(
            pool.parse_method_descriptor(&too_many, None, this),
            Err(Error::ClassFormat(_))
        ));
        let way_too_many = format!("({})V", "D".repeat(128));
        assert!(matches!(
            pool.add_descriptor(&way_too_many),
            Err(Error::ClassFormat(_))
        ));
    }

    #[test]
    fn method_descriptors_are_shared() {
        let mut pool = pool();
        let this = pool.this_class();
        let a = pool
            .parse_method_descriptor("(I)V", Some(MethodAccessFlags::PUBLIC), this)
            .unwrap();
        let b = pool
            .parse_method_descriptor("(I)V", Some(MethodAccessFlags::PRIVATE), this)
            .unwrap();
        let c = pool
            .parse_method_descriptor("(I)V", Some(MethodAccessFlags::STATIC), this)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.param_slots(), 2);
        assert_eq!(c.param_slots(), 1);
    }

    #[test]
    fn deferred_receiver() {
        let mut pool = pool();
        let other = pool.add_class("java/lang/String").unwrap();
        let method = pool.parse_method_descriptor("(J)V", None, other).unwrap();
        assert!(!method.is_finalized());
        assert_eq!(method.param_slots(), 3);

        assert!(method.finalize(MethodAccessFlags::PUBLIC, other));
        assert_eq!(method.this_param(), Some(ThisParam::Instance(other)));
        assert_eq!(method.param_slots(), 3);

        // Already finalized as an instance method
        assert!(!method.finalize(MethodAccessFlags::STATIC, other));
        assert!(method.finalize(MethodAccessFlags::PUBLIC, other));

        // A static target gives the reserved slot back
        let call = pool.parse_method_descriptor("(I)V", None, other).unwrap();
        assert_eq!(call.param_slots(), 2);
        assert!(call.finalize(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, other));
        assert_eq!(call.this_param(), Some(ThisParam::Static));
        assert_eq!(call.param_slots(), 1);
    }
}
