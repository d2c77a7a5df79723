use super::{ArrayType, BaseType, FieldType, ParseDescriptor, RefType, RenderDescriptor};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Names of anything that can be loaded as a class: either a binary name (`java/lang/String`)
/// or an array descriptor (`[Ljava/lang/String;`, `[[I`)
///
/// This is what a `CONSTANT_Class` entry in a constant pool holds.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct ClassName(Cow<'static, str>);

/// Arrays may have at most this many dimensions
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for ClassName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.starts_with('[') {
            let dimensions = name.chars().take_while(|c| *c == '[').count();
            if dimensions > MAX_ARRAY_DIMENSIONS {
                return Err(format!(
                    "Array class '{}' has more than {} dimensions",
                    name, MAX_ARRAY_DIMENSIONS
                ));
            }
            RefType::<BinaryName>::parse(name).map(|_| ())
        } else {
            BinaryName::check_valid(name)
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(ClassName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for ClassName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

/// Java-style dotted rendering (`java.lang.String`, `[Ljava.lang.String;`)
impl Display for ClassName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(&self.0.replace('/', "."))
    }
}

impl From<UnqualifiedName> for BinaryName {
    fn from(name: UnqualifiedName) -> BinaryName {
        BinaryName(name.0)
    }
}

impl From<BinaryName> for ClassName {
    fn from(name: BinaryName) -> ClassName {
        ClassName(name.0)
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Method names have extra restrictions: angle brackets are reserved for the special
    /// initialization methods
    pub fn check_valid_method(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        Self::check_valid(name)?;
        let special = name == Self::INIT.as_str() || name == Self::CLINIT.as_str();
        if !special && name.contains(&['<', '>'][..]) {
            Err(format!("Method name '{}' contains an illegal character", name))
        } else {
            Ok(())
        }
    }

    /// Is this one of the special initialization method names?
    pub fn is_initializer(&self) -> bool {
        self == &Self::INIT || self == &Self::CLINIT
    }

    // JDK names
    pub const CLONE: Self = Self::name("clone");
    pub const FINALIZE: Self = Self::name("finalize");

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");
}

impl BinaryName {
    /// Join segments from the other name onto the end of this binary name
    pub fn join(&self, other: impl Name) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}/{}", self.as_str(), other.as_str())))
    }

    /// Package prefix of the name (`java/lang` for `java/lang/String`, empty for the default
    /// package)
    pub fn package(&self) -> &str {
        match self.as_str().rfind('/') {
            Some(idx) => &self.as_str()[..idx],
            None => "",
        }
    }

    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const STRING: Self = Self::name("java/lang/String");
}

impl ClassName {
    const fn name(value: &'static str) -> ClassName {
        ClassName(Cow::Borrowed(value))
    }

    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");

    /// Name of the class representing a reference type
    pub fn of_ref_type(ref_type: &RefType<BinaryName>) -> ClassName {
        match ref_type {
            RefType::Object(name) => ClassName::from(name.clone()),
            _ => ClassName(Cow::Owned(ref_type.render())),
        }
    }

    /// Name of the array class whose components have the given type
    pub fn array_of(component: &FieldType<BinaryName>) -> ClassName {
        ClassName::of_ref_type(&RefType::array(component.clone()))
    }

    pub fn is_array(&self) -> bool {
        self.0.starts_with('[')
    }

    /// Number of array dimensions (0 for non-array classes)
    pub fn dimensions(&self) -> usize {
        self.0.chars().take_while(|c| *c == '[').count()
    }

    /// View the class name as a reference type
    ///
    /// Names are validated on construction, so this only fails for names that were smuggled in
    /// through the internal constructors.
    pub fn to_ref_type(&self) -> Result<RefType<BinaryName>, String> {
        if self.is_array() {
            RefType::parse(self.as_str())
        } else {
            Ok(RefType::Object(BinaryName(self.0.clone())))
        }
    }

    /// Type of the components of an array class (`[I` for `[[I`, `java/lang/String` for
    /// `[Ljava/lang/String;`)
    pub fn component_type(&self) -> Option<FieldType<BinaryName>> {
        let component = match self.to_ref_type().ok()? {
            RefType::Object(_) => return None,
            RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }) => FieldType::Base(element_type),
            RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }) => FieldType::object(element_type),
            RefType::PrimitiveArray(arr) => FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: arr.additional_dimensions - 1,
                element_type: arr.element_type,
            })),
            RefType::ObjectArray(arr) => FieldType::Ref(RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions - 1,
                element_type: arr.element_type,
            })),
        };
        Some(component)
    }

    /// Innermost element type of an array class
    pub fn element_type(&self) -> Option<Result<BaseType, BinaryName>> {
        match self.to_ref_type().ok()? {
            RefType::Object(_) => None,
            RefType::PrimitiveArray(arr) => Some(Ok(arr.element_type)),
            RefType::ObjectArray(arr) => Some(Err(arr.element_type)),
        }
    }

    /// Non-array class that this name mentions, if any
    ///
    /// This is the name that loading constraints and access checks care about.
    pub fn referenced_class(&self) -> Option<BinaryName> {
        if self.is_array() {
            self.element_type()?.err()
        } else {
            Some(BinaryName(self.0.clone()))
        }
    }

    /// Runtime package of the class (arrays belong to the package of their element type)
    pub fn package(&self) -> String {
        match self.referenced_class() {
            Some(name) => name.package().to_owned(),
            None => String::new(),
        }
    }
}
