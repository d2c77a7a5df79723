use super::ClassDefinition;
use crate::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

const PUBLIC: MethodAccessFlags = MethodAccessFlags::PUBLIC;
const PUBLIC_ABSTRACT: MethodAccessFlags = MethodAccessFlags::from_bits_truncate(
    MethodAccessFlags::PUBLIC.bits() | MethodAccessFlags::ABSTRACT.bits(),
);
const PUBLIC_STATIC: MethodAccessFlags = MethodAccessFlags::from_bits_truncate(
    MethodAccessFlags::PUBLIC.bits() | MethodAccessFlags::STATIC.bits(),
);
const PRIVATE_FINAL: FieldAccessFlags = FieldAccessFlags::from_bits_truncate(
    FieldAccessFlags::PRIVATE.bits() | FieldAccessFlags::FINAL.bits(),
);

/// Core classes of the standard library, as far as linking cares
///
/// Only members that matter for dispatch and layout are present: the virtual methods of
/// `java/lang/Object` that every class inherits, the interface methods the value classes
/// implement, and their instance fields.
pub fn java_library() -> Vec<ClassDefinition> {
    let final_class = ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SUPER;
    let abstract_class =
        ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT | ClassAccessFlags::SUPER;

    vec![
        ClassDefinition::class("java/lang/Object")
            .method("<init>", "()V", PUBLIC)
            .method("equals", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("hashCode", "()I", PUBLIC | MethodAccessFlags::NATIVE)
            .method("toString", "()Ljava/lang/String;", PUBLIC)
            .method(
                "clone",
                "()Ljava/lang/Object;",
                MethodAccessFlags::PROTECTED | MethodAccessFlags::NATIVE,
            )
            .method("finalize", "()V", MethodAccessFlags::PROTECTED),
        ClassDefinition::interface("java/lang/Cloneable"),
        ClassDefinition::interface("java/io/Serializable"),
        ClassDefinition::interface("java/lang/CharSequence")
            .method("length", "()I", PUBLIC_ABSTRACT)
            .method("charAt", "(I)C", PUBLIC_ABSTRACT)
            .method("toString", "()Ljava/lang/String;", PUBLIC_ABSTRACT),
        ClassDefinition::interface("java/lang/Comparable").method(
            "compareTo",
            "(Ljava/lang/Object;)I",
            PUBLIC_ABSTRACT,
        ),
        ClassDefinition::class("java/lang/String")
            .flags(final_class)
            .implements("java/io/Serializable")
            .implements("java/lang/Comparable")
            .implements("java/lang/CharSequence")
            .field("value", "[C", PRIVATE_FINAL)
            .field("hash", "I", FieldAccessFlags::PRIVATE)
            .method("<init>", "()V", PUBLIC)
            .method("length", "()I", PUBLIC)
            .method("charAt", "(I)C", PUBLIC)
            .method("equals", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("hashCode", "()I", PUBLIC)
            .method("toString", "()Ljava/lang/String;", PUBLIC)
            .method("compareTo", "(Ljava/lang/String;)I", PUBLIC)
            .method(
                "compareTo",
                "(Ljava/lang/Object;)I",
                PUBLIC | MethodAccessFlags::BRIDGE | MethodAccessFlags::SYNTHETIC,
            )
            .method("valueOf", "(I)Ljava/lang/String;", PUBLIC_STATIC),
        ClassDefinition::class("java/lang/Number")
            .flags(abstract_class)
            .implements("java/io/Serializable")
            .method("<init>", "()V", PUBLIC)
            .method("intValue", "()I", PUBLIC_ABSTRACT)
            .method("longValue", "()J", PUBLIC_ABSTRACT),
        boxed_class("java/lang/Integer", "I"),
        boxed_class("java/lang/Long", "J"),
        ClassDefinition::class("java/lang/Throwable")
            .implements("java/io/Serializable")
            .field("detailMessage", "Ljava/lang/String;", FieldAccessFlags::PRIVATE)
            .field("cause", "Ljava/lang/Throwable;", FieldAccessFlags::PRIVATE)
            .method("<init>", "()V", PUBLIC)
            .method("<init>", "(Ljava/lang/String;)V", PUBLIC)
            .method("getMessage", "()Ljava/lang/String;", PUBLIC)
            .method("getCause", "()Ljava/lang/Throwable;", PUBLIC),
        throwable_class("java/lang/Exception", "java/lang/Throwable"),
        throwable_class("java/lang/RuntimeException", "java/lang/Exception"),
        throwable_class("java/lang/Error", "java/lang/Throwable"),
    ]
}

/// `java/lang/Integer` and friends: a final `Number` wrapping one primitive value
fn boxed_class(name: &str, primitive: &str) -> ClassDefinition {
    ClassDefinition::class(name)
        .flags(ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SUPER)
        .extends("java/lang/Number")
        .implements("java/lang/Comparable")
        .field("value", primitive, PRIVATE_FINAL)
        .method("<init>", &format!("({})V", primitive), PUBLIC)
        .method("intValue", "()I", PUBLIC)
        .method("longValue", "()J", PUBLIC)
        .method("hashCode", "()I", PUBLIC)
        .method("equals", "(Ljava/lang/Object;)Z", PUBLIC)
        .method("compareTo", &format!("(L{};)I", name), PUBLIC)
        .method(
            "compareTo",
            "(Ljava/lang/Object;)I",
            PUBLIC | MethodAccessFlags::BRIDGE | MethodAccessFlags::SYNTHETIC,
        )
        .method("valueOf", &format!("({})L{};", primitive, name), PUBLIC_STATIC)
}

fn throwable_class(name: &str, superclass: &str) -> ClassDefinition {
    ClassDefinition::class(name)
        .extends(superclass)
        .method("<init>", "()V", PUBLIC)
        .method("<init>", "(Ljava/lang/String;)V", PUBLIC)
}
