use std::fmt;

/// Linkage errors
///
/// Every variant corresponds to a Java throwable that the linking and resolution machinery can
/// leave pending for its caller. The payload is the detail message of that throwable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Malformed descriptor, name, or inconsistent access flags
    ClassFormat(String),

    /// A class is its own (transitive) superclass or superinterface
    ClassCircularity(String),

    /// A class was used where an interface was expected (or vice versa), or a member was
    /// accessed with the wrong static/instance shape
    IncompatibleClassChange(String),

    /// Illegal override of a final method, or a violated subtype constraint
    Verify(String),

    /// Access control violation
    IllegalAccess(String),

    /// A method without an implementation was selected
    AbstractMethod(String),

    /// Loading constraint violation, duplicate definition, or failed subtype constraint
    Linkage(String),

    /// A class could not be found
    NoClassDefFound(String),

    NoSuchField(String),
    NoSuchMethod(String),

    /// Runtime covariant array store violation
    ArrayStore(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Binary name of the Java throwable this error represents
    pub fn exception_class(&self) -> &'static str {
        match self {
            Error::ClassFormat(_) => "java/lang/ClassFormatError",
            Error::ClassCircularity(_) => "java/lang/ClassCircularityError",
            Error::IncompatibleClassChange(_) => "java/lang/IncompatibleClassChangeError",
            Error::Verify(_) => "java/lang/VerifyError",
            Error::IllegalAccess(_) => "java/lang/IllegalAccessError",
            Error::AbstractMethod(_) => "java/lang/AbstractMethodError",
            Error::Linkage(_) => "java/lang/LinkageError",
            Error::NoClassDefFound(_) => "java/lang/NoClassDefFoundError",
            Error::NoSuchField(_) => "java/lang/NoSuchFieldError",
            Error::NoSuchMethod(_) => "java/lang/NoSuchMethodError",
            Error::ArrayStore(_) => "java/lang/ArrayStoreException",
        }
    }

    /// Detail message
    pub fn message(&self) -> &str {
        match self {
            Error::ClassFormat(msg)
            | Error::ClassCircularity(msg)
            | Error::IncompatibleClassChange(msg)
            | Error::Verify(msg)
            | Error::IllegalAccess(msg)
            | Error::AbstractMethod(msg)
            | Error::Linkage(msg)
            | Error::NoClassDefFound(msg)
            | Error::NoSuchField(msg)
            | Error::NoSuchMethod(msg)
            | Error::ArrayStore(msg) => msg,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.exception_class().replace('/', "."),
            self.message()
        )
    }
}

impl std::error::Error for Error {}
