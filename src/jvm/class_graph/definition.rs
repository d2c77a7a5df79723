use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, MethodAccessFlags, Name,
    Result, UnqualifiedName,
};
use std::collections::HashSet;

/// Class as handed over by a class loader: names and descriptors, nothing resolved
///
/// This is the parsed shape of a class file as far as linking is concerned. Definitions are
/// assembled with the builder methods, then validated when the VM defines them.
#[derive(Clone, Debug)]
pub struct ClassDefinition {
    pub name: String,
    pub access_flags: ClassAccessFlags,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDefinition>,
    pub methods: Vec<MethodDefinition>,

    /// Classes the constant pool refers to
    pub class_refs: Vec<String>,

    /// Field references of the constant pool
    pub field_refs: Vec<MemberRefDefinition>,

    /// Method references of the constant pool (interface method references included)
    pub method_refs: Vec<MemberRefDefinition>,
}

#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub name: String,
    pub descriptor: String,
    pub access_flags: FieldAccessFlags,
}

#[derive(Clone, Debug)]
pub struct MethodDefinition {
    pub name: String,
    pub descriptor: String,
    pub access_flags: MethodAccessFlags,
}

/// Symbolic reference to a member of some class
#[derive(Clone, Debug)]
pub struct MemberRefDefinition {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl ClassDefinition {
    fn new(name: &str, access_flags: ClassAccessFlags) -> ClassDefinition {
        let superclass = if name == BinaryName::OBJECT.as_str() {
            None
        } else {
            Some(BinaryName::OBJECT.as_str().to_owned())
        };
        ClassDefinition {
            name: name.to_owned(),
            access_flags,
            superclass,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            class_refs: vec![],
            field_refs: vec![],
            method_refs: vec![],
        }
    }

    /// Public class extending `java/lang/Object`
    pub fn class(name: &str) -> ClassDefinition {
        ClassDefinition::new(name, ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER)
    }

    /// Public interface
    pub fn interface(name: &str) -> ClassDefinition {
        ClassDefinition::new(
            name,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        )
    }

    pub fn extends(mut self, superclass: &str) -> ClassDefinition {
        self.superclass = Some(superclass.to_owned());
        self
    }

    pub fn no_superclass(mut self) -> ClassDefinition {
        self.superclass = None;
        self
    }

    pub fn implements(mut self, interface: &str) -> ClassDefinition {
        self.interfaces.push(interface.to_owned());
        self
    }

    /// Replace the access flags
    pub fn flags(mut self, access_flags: ClassAccessFlags) -> ClassDefinition {
        self.access_flags = access_flags;
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str, access_flags: FieldAccessFlags) -> Self {
        self.fields.push(FieldDefinition {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            access_flags,
        });
        self
    }

    pub fn method(mut self, name: &str, descriptor: &str, access_flags: MethodAccessFlags) -> Self {
        self.methods.push(MethodDefinition {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            access_flags,
        });
        self
    }

    pub fn reference_class(mut self, name: &str) -> ClassDefinition {
        self.class_refs.push(name.to_owned());
        self
    }

    pub fn reference_field(mut self, class: &str, name: &str, descriptor: &str) -> Self {
        self.field_refs.push(MemberRefDefinition {
            class: class.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        });
        self
    }

    pub fn reference_method(mut self, class: &str, name: &str, descriptor: &str) -> Self {
        self.method_refs.push(MemberRefDefinition {
            class: class.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        });
        self
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Structural checks a class file must pass before it can be defined
    ///
    /// Descriptors are checked separately, when they get parsed into the descriptor pool.
    pub fn validate(&self) -> Result<()> {
        let class_name = &self.name;
        BinaryName::check_valid(class_name).map_err(class_format)?;

        let flags = self.access_flags;
        if self.is_interface() {
            if !flags.contains(ClassAccessFlags::ABSTRACT)
                || flags.contains(ClassAccessFlags::FINAL)
            {
                return Err(Error::ClassFormat(format!(
                    "Illegal class modifiers in interface {}: {:?}",
                    class_name, flags
                )));
            }
        } else if flags.contains(ClassAccessFlags::ABSTRACT | ClassAccessFlags::FINAL) {
            return Err(Error::ClassFormat(format!(
                "Illegal class modifiers in class {}: {:?}",
                class_name, flags
            )));
        }

        match &self.superclass {
            Some(superclass)
                if self.is_interface() && superclass != BinaryName::OBJECT.as_str() =>
            {
                return Err(Error::ClassFormat(format!(
                    "Interface {} must have java/lang/Object as its superclass",
                    class_name
                )));
            }
            Some(superclass) => {
                if superclass == class_name {
                    return Err(Error::ClassCircularity(class_name.clone()));
                }
                BinaryName::check_valid(superclass).map_err(class_format)?;
            }
            None if class_name == BinaryName::OBJECT.as_str() => (),
            None => {
                return Err(Error::ClassFormat(format!(
                    "Class {} has no superclass",
                    class_name
                )))
            }
        }
        for interface in &self.interfaces {
            BinaryName::check_valid(interface).map_err(class_format)?;
        }

        let mut seen_fields = HashSet::new();
        for field in &self.fields {
            UnqualifiedName::check_valid(&field.name).map_err(class_format)?;
            let visibility = field.access_flags
                & (FieldAccessFlags::PUBLIC
                    | FieldAccessFlags::PROTECTED
                    | FieldAccessFlags::PRIVATE);
            if visibility.bits().count_ones() > 1 {
                return Err(Error::ClassFormat(format!(
                    "Illegal field modifiers in class {}: {:?}",
                    class_name, field.access_flags
                )));
            }
            if !seen_fields.insert((&field.name, &field.descriptor)) {
                return Err(Error::ClassFormat(format!(
                    "Duplicate field name \"{}\" with signature \"{}\" in class {}",
                    field.name, field.descriptor, class_name
                )));
            }
        }

        let mut seen_methods = HashSet::new();
        for method in &self.methods {
            UnqualifiedName::check_valid_method(&method.name).map_err(class_format)?;
            check_method_flags(class_name, self.is_interface(), method)?;
            if !seen_methods.insert((&method.name, &method.descriptor)) {
                return Err(Error::ClassFormat(format!(
                    "Duplicate method name \"{}\" with signature \"{}\" in class {}",
                    method.name, method.descriptor, class_name
                )));
            }
        }

        Ok(())
    }
}

fn check_method_flags(
    class_name: &str,
    is_interface: bool,
    method: &MethodDefinition,
) -> Result<()> {
    let flags = method.access_flags;
    let visibility = flags
        & (MethodAccessFlags::PUBLIC | MethodAccessFlags::PROTECTED | MethodAccessFlags::PRIVATE);
    let mut legal = visibility.bits().count_ones() <= 1;

    if flags.contains(MethodAccessFlags::ABSTRACT) {
        legal &= !flags.intersects(
            MethodAccessFlags::PRIVATE
                | MethodAccessFlags::STATIC
                | MethodAccessFlags::FINAL
                | MethodAccessFlags::NATIVE
                | MethodAccessFlags::SYNCHRONIZED
                | MethodAccessFlags::STRICT,
        );
    }
    if method.name == UnqualifiedName::INIT.as_str() {
        legal &= !is_interface
            && !flags.intersects(
                MethodAccessFlags::STATIC
                    | MethodAccessFlags::FINAL
                    | MethodAccessFlags::SYNCHRONIZED
                    | MethodAccessFlags::NATIVE
                    | MethodAccessFlags::ABSTRACT,
            );
    }
    if is_interface && method.name != UnqualifiedName::CLINIT.as_str() {
        legal &= !flags.contains(MethodAccessFlags::PROTECTED);
    }

    if legal {
        Ok(())
    } else {
        Err(Error::ClassFormat(format!(
            "Method {} in class {} has illegal modifiers: {:?}",
            method.name, class_name, flags
        )))
    }
}

fn class_format(msg: String) -> Error {
    Error::ClassFormat(msg)
}
