mod common;

use common::*;
use jvmlink::jvm::linker::ArrayKind;
use jvmlink::jvm::*;
use jvmlink::{DataLayout, Settings};
use std::sync::Arc;

#[test]
fn empty_classes_add_no_slots() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/A"),
        ClassDefinition::class("demo/B").extends("demo/A"),
    ]);

    let object = harness.linked("java/lang/Object");
    let a = harness.linked("demo/A");
    let b = harness.linked("demo/B");
    assert_eq!(a.len(), object.len());
    assert_eq!(b.len(), a.len());

    let header = harness.vm.settings().layout.header_size;
    assert_eq!(harness.load("demo/A").instance_size(), Some(header));
    assert_eq!(harness.load("demo/B").instance_size(), Some(header));
    assert_eq!(harness.load("demo/B").state(), ClassState::Linked);
}

#[test]
fn constructors_and_statics_take_no_slots() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/Statics")
        .method("<init>", "()V", public())
        .method("<clinit>", "()V", MethodAccessFlags::STATIC)
        .method("helper", "()V", public() | MethodAccessFlags::STATIC)]);

    let object = harness.linked("java/lang/Object");
    let vtable = harness.linked("demo/Statics");
    assert_eq!(vtable.len(), object.len());
    assert_eq!(
        harness.method("demo/Statics", "<init>", "()V").vtable_index(),
        None
    );
}

#[test]
fn linking_is_idempotent() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/Point")
        .field("x", "I", FieldAccessFlags::PUBLIC)
        .method("norm", "()I", public())]);

    let first = harness.linked("demo/Point");
    let (baseval, diffval) = (first.baseval(), first.diffval());
    let second = harness.linked("demo/Point");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.baseval(), baseval);
    assert_eq!(second.diffval(), diffval);
}

#[test]
fn overriding_reuses_the_slot() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Base")
            .method("m", "()V", public())
            .method("n", "()V", public()),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .method("m", "()V", public())
            .method("extra", "()V", public()),
    ]);

    let base = harness.linked("demo/Base");
    let sub = harness.linked("demo/Sub");
    let base_m = harness.method("demo/Base", "m", "()V");
    let sub_m = harness.method("demo/Sub", "m", "()V");

    let slot = base_m.vtable_index().unwrap();
    assert_eq!(sub_m.vtable_index(), Some(slot));
    assert_eq!(base.dispatch(slot).unwrap().id, base_m.id);
    assert_eq!(sub.dispatch(slot).unwrap().id, sub_m.id);

    // Inherited, not overridden
    let base_n = harness.method("demo/Base", "n", "()V");
    let n_slot = base_n.vtable_index().unwrap();
    assert_eq!(sub.dispatch(n_slot).unwrap().id, base_n.id);

    assert_eq!(sub.len(), base.len() + 1);
    assert!(base_m.is_overridden());
    assert!(!base_n.is_overridden());
}

#[test]
fn private_methods_are_not_overridden() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Base").method("p", "()V", MethodAccessFlags::PRIVATE),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .method("p", "()V", public()),
    ]);

    harness.linked("demo/Sub");
    let base_p = harness.method("demo/Base", "p", "()V");
    let sub_p = harness.method("demo/Sub", "p", "()V");
    assert_ne!(base_p.vtable_index(), sub_p.vtable_index());
    assert!(!base_p.is_overridden());
}

#[test]
fn package_private_methods_stay_in_their_package() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("a/Base").method("m", "()V", MethodAccessFlags::empty()),
        ClassDefinition::class("b/Sub")
            .extends("a/Base")
            .method("m", "()V", public()),
        ClassDefinition::class("a/Near")
            .extends("a/Base")
            .method("m", "()V", public()),
    ]);

    harness.linked("b/Sub");
    harness.linked("a/Near");
    let base_m = harness.method("a/Base", "m", "()V");
    assert_ne!(
        harness.method("b/Sub", "m", "()V").vtable_index(),
        base_m.vtable_index()
    );
    assert_eq!(
        harness.method("a/Near", "m", "()V").vtable_index(),
        base_m.vtable_index()
    );
}

#[test]
fn final_methods_cannot_be_overridden() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Base").method("m", "()V", public() | MethodAccessFlags::FINAL),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .method("m", "()V", public()),
    ]);

    assert!(matches!(harness.link("demo/Sub"), Err(Error::Verify(_))));
    assert!(harness.link("demo/Base").is_ok());
}

#[test]
fn final_classes_cannot_be_extended() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/MyString")
        .extends("java/lang/String")]);
    assert!(matches!(harness.link("demo/MyString"), Err(Error::Verify(_))));
}

#[test]
fn supertypes_must_have_the_right_kind() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I"),
        ClassDefinition::class("demo/ExtendsInterface").extends("demo/I"),
        ClassDefinition::class("demo/ImplementsClass").implements("java/lang/Number"),
    ]);

    assert!(matches!(
        harness.link("demo/ExtendsInterface"),
        Err(Error::IncompatibleClassChange(_))
    ));
    assert!(matches!(
        harness.link("demo/ImplementsClass"),
        Err(Error::IncompatibleClassChange(_))
    ));
}

#[test]
fn missing_superclass() {
    let harness =
        TestHarness::new(vec![ClassDefinition::class("demo/Orphan").extends("demo/Gone")]);
    match harness.link("demo/Orphan") {
        Err(Error::NoClassDefFound(msg)) => assert_eq!(msg, "demo/Gone"),
        other => panic!("expected NoClassDefFoundError, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn inaccessible_superclass() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("a/Hidden").flags(ClassAccessFlags::SUPER),
        ClassDefinition::class("b/Sub").extends("a/Hidden"),
        ClassDefinition::class("a/Sibling").extends("a/Hidden"),
    ]);

    assert!(matches!(harness.link("b/Sub"), Err(Error::IllegalAccess(_))));
    assert!(harness.link("a/Sibling").is_ok());
}

#[test]
fn circularity_is_an_error_not_a_deadlock() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/X").extends("demo/Y"),
        ClassDefinition::class("demo/Y").extends("demo/X"),
    ]);

    assert!(matches!(
        harness.link("demo/X"),
        Err(Error::ClassCircularity(_))
    ));
    assert!(matches!(
        harness.load("demo/Y").state(),
        ClassState::Erroneous(Error::ClassCircularity(_))
    ));
}

#[test]
fn failure_is_sticky() {
    let harness =
        TestHarness::new(vec![ClassDefinition::class("demo/Orphan").extends("demo/Gone")]);

    let first = harness.link("demo/Orphan").map(|_| ());
    assert!(first.is_err());
    let orphan = harness.load("demo/Orphan");
    assert_eq!(orphan.state(), ClassState::Erroneous(first.clone().unwrap_err()));

    // Even once the superclass shows up, the class stays erroneous
    harness
        .vm
        .define_class(LoaderId::BOOTSTRAP, &ClassDefinition::class("demo/Gone"))
        .unwrap();
    assert_eq!(harness.link("demo/Orphan").map(|_| ()), first);
    assert_eq!(harness.vm.dump().outstanding(), 0);
}

#[test]
fn abstract_class_gets_miranda_methods() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I").method("f", "()V", public_abstract()),
        ClassDefinition::class("demo/C")
            .flags(abstract_class())
            .implements("demo/I"),
        ClassDefinition::class("demo/D")
            .extends("demo/C")
            .method("f", "()V", public()),
    ]);

    let c_vtable = harness.linked("demo/C");
    let c = harness.load("demo/C");
    let named_f: Vec<_> = c
        .methods()
        .into_iter()
        .filter(|method| method.name.as_str() == "f")
        .collect();
    assert_eq!(named_f.len(), 1);
    let miranda = &named_f[0];
    assert!(miranda.is_miranda());
    assert_eq!(
        miranda.miranda_of,
        Some(harness.method("demo/I", "f", "()V").id)
    );
    assert!(c.declared_methods().is_empty());

    // Calling the miranda through the class lands on the trampoline
    let slot = miranda.vtable_index().unwrap();
    assert!(matches!(
        c_vtable.dispatch(slot),
        Err(Error::AbstractMethod(_))
    ));

    // A concrete subclass fills the slot
    let d_vtable = harness.linked("demo/D");
    let d_f = harness.method("demo/D", "f", "()V");
    assert_eq!(d_f.vtable_index(), Some(slot));
    assert_eq!(d_vtable.dispatch(slot).unwrap().id, d_f.id);

    let i_index = harness.linked("demo/I").interface_index().unwrap();
    assert_eq!(d_vtable.dispatch_interface(i_index, 0).unwrap().id, d_f.id);
}

#[test]
fn mirandas_take_inherited_default_methods() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I").method("f", "()V", public_abstract()),
        ClassDefinition::interface("demo/J")
            .implements("demo/I")
            .method("f", "()V", public()),
        ClassDefinition::class("demo/A")
            .flags(abstract_class())
            .implements("demo/J"),
        ClassDefinition::class("demo/B").extends("demo/A"),
    ]);

    let b_vtable = harness.linked("demo/B");
    let a_vtable = harness.linked("demo/A");
    let j_f = harness.method("demo/J", "f", "()V");

    let a = harness.load("demo/A");
    let named_f: Vec<_> = a
        .methods()
        .into_iter()
        .filter(|method| method.name.as_str() == "f")
        .collect();
    assert_eq!(named_f.len(), 1);
    assert!(named_f[0].is_miranda());

    // The slot holds the default, not the trampoline
    let slot = named_f[0].vtable_index().unwrap();
    assert_eq!(a_vtable.dispatch(slot).unwrap().id, j_f.id);
    assert_eq!(b_vtable.dispatch(slot).unwrap().id, j_f.id);

    // Interface calls agree with virtual calls
    let i_index = harness.linked("demo/I").interface_index().unwrap();
    let j_index = harness.linked("demo/J").interface_index().unwrap();
    assert_eq!(b_vtable.dispatch_interface(i_index, 0).unwrap().id, j_f.id);
    assert_eq!(b_vtable.dispatch_interface(j_index, 0).unwrap().id, j_f.id);
}

#[test]
fn concrete_class_must_implement_interface_methods() {
    let classes = || {
        vec![
            ClassDefinition::interface("demo/I").method("f", "()V", public_abstract()),
            ClassDefinition::class("demo/C").implements("demo/I"),
        ]
    };

    let strict = TestHarness::new(classes());
    assert!(matches!(strict.link("demo/C"), Err(Error::Verify(_))));

    let mut settings = Settings::new();
    settings.require_concrete_implementations = false;
    let lenient = TestHarness::with_settings(classes(), settings);
    let c = lenient.linked("demo/C");
    let i_index = lenient.linked("demo/I").interface_index().unwrap();
    assert!(matches!(
        c.dispatch_interface(i_index, 0),
        Err(Error::AbstractMethod(_))
    ));
}

#[test]
fn concrete_subclass_of_abstract_class_must_implement_mirandas() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I").method("f", "()V", public_abstract()),
        ClassDefinition::class("demo/C")
            .flags(abstract_class())
            .implements("demo/I"),
        ClassDefinition::class("demo/Lazy").extends("demo/C"),
    ]);

    assert!(harness.link("demo/C").is_ok());
    assert!(matches!(harness.link("demo/Lazy"), Err(Error::Verify(_))));
}

#[test]
fn interface_tables_cover_superinterfaces() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I").method("f", "()V", public_abstract()),
        ClassDefinition::interface("demo/J")
            .implements("demo/I")
            .method("g", "()V", public_abstract()),
        ClassDefinition::class("demo/K")
            .implements("demo/J")
            .method("f", "()V", public())
            .method("g", "()V", public()),
    ]);

    let k = harness.linked("demo/K");
    let i = harness.linked("demo/I");
    let j = harness.linked("demo/J");
    let i_index = i.interface_index().unwrap();
    let j_index = j.interface_index().unwrap();
    assert_ne!(i_index, j_index);

    assert!(k.implements_interface(i_index));
    assert!(k.implements_interface(j_index));
    assert_eq!(
        k.dispatch_interface(i_index, 0).unwrap().id,
        harness.method("demo/K", "f", "()V").id
    );
    assert_eq!(
        k.dispatch_interface(j_index, 0).unwrap().id,
        harness.method("demo/K", "g", "()V").id
    );

    // Interfaces implement themselves and their superinterfaces
    assert!(j.implements_interface(j_index));
    assert!(j.implements_interface(i_index));
    assert!(!i.implements_interface(j_index));
    assert!(harness.is_assignable("demo/J", "demo/I"));
    assert!(harness.is_assignable("demo/K", "demo/I"));
    assert!(!harness.is_assignable("demo/I", "demo/J"));
}

#[test]
fn default_methods_implement_interfaces() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/Greeter").method("greet", "()V", public()),
        ClassDefinition::class("demo/Quiet").implements("demo/Greeter"),
    ]);

    let quiet = harness.linked("demo/Quiet");
    let index = harness.linked("demo/Greeter").interface_index().unwrap();
    assert_eq!(
        quiet.dispatch_interface(index, 0).unwrap().id,
        harness.method("demo/Greeter", "greet", "()V").id
    );
}

#[test]
fn instance_layout_follows_the_superclass() {
    let mut settings = Settings::new();
    settings.layout = DataLayout::LP64;
    let harness = TestHarness::with_settings(
        vec![
            ClassDefinition::class("demo/Base").field("flag", "Z", FieldAccessFlags::PUBLIC),
            ClassDefinition::class("demo/Sub")
                .extends("demo/Base")
                .field("count", "J", FieldAccessFlags::PUBLIC)
                .field("total", "J", FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC)
                .field("next", "Ldemo/Sub;", FieldAccessFlags::PUBLIC),
        ],
        settings,
    );

    harness.linked("demo/Sub");
    let base = harness.load("demo/Base");
    let sub = harness.load("demo/Sub");
    assert_eq!(base.field_offset(&base.fields[0]), Some(16));
    assert_eq!(base.instance_size(), Some(17));
    assert_eq!(sub.field_offset(&sub.fields[0]), Some(24));
    assert_eq!(sub.field_offset(&sub.fields[1]), None);
    assert_eq!(sub.field_offset(&sub.fields[2]), Some(32));
    assert_eq!(sub.instance_size(), Some(40));
    assert!(sub.linked().unwrap().has_references);
    assert!(!base.linked().unwrap().has_references);
}

#[test]
fn finalizers() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Plain"),
        ClassDefinition::class("demo/Resource").method(
            "finalize",
            "()V",
            MethodAccessFlags::PROTECTED,
        ),
        ClassDefinition::class("demo/SubResource").extends("demo/Resource"),
    ]);

    harness.linked("demo/Plain");
    harness.linked("demo/SubResource");
    assert!(!harness.load("demo/Plain").has_finalizer());
    assert!(harness.load("demo/Resource").has_finalizer());
    assert!(harness.load("demo/SubResource").has_finalizer());
}

#[test]
fn overriding_invalidates_monomorphic_callers() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Base")
            .method("m", "()V", public())
            .method("caller", "()V", public()),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .method("m", "()V", public()),
    ]);

    harness.linked("demo/Base");
    let base_m = harness.method("demo/Base", "m", "()V");
    let caller = harness.method("demo/Base", "caller", "()V");
    assert!(harness.vm.assume_monomorphic(&base_m, caller.id));
    assert!(harness.vm.take_invalidations().is_empty());

    harness.linked("demo/Sub");
    let invalidations = harness.vm.take_invalidations();
    assert_eq!(invalidations.len(), 1);
    assert_eq!(invalidations[0].caller, caller.id);
    assert_eq!(invalidations[0].callee, base_m.id);
    assert_eq!(
        invalidations[0].overrider,
        harness.method("demo/Sub", "m", "()V").id
    );

    // The assumption can no longer be made
    assert!(!harness.vm.assume_monomorphic(&base_m, caller.id));
    assert!(harness.vm.take_invalidations().is_empty());
}

#[test]
fn array_classes() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("a/Hidden").flags(ClassAccessFlags::SUPER),
    ]);

    let strings = harness.load("[Ljava/lang/String;");
    assert!(strings.is_public() && strings.is_final() && strings.is_abstract());
    assert_eq!(strings.loader, LoaderId::BOOTSTRAP);
    assert_eq!(
        strings.superclass_name().map(|name| name.as_str()),
        Some("java/lang/Object")
    );
    assert!(strings.find_method(&unqualified("clone"), "()Ljava/lang/Object;").is_some());

    let vtable = harness.linked("[Ljava/lang/String;");
    let desc = vtable.array_descriptor().unwrap();
    assert_eq!(desc.dimension, 1);
    assert_eq!(desc.array_type, ArrayKind::Object);
    assert_eq!(
        desc.element.as_ref().map(|element| element.name.as_str()),
        Some("java/lang/String")
    );

    let matrix = harness.linked("[[I");
    let desc = matrix.array_descriptor().unwrap();
    assert_eq!(desc.dimension, 2);
    assert_eq!(desc.element_type, ArrayKind::Int);
    assert!(desc.element.is_none());

    // Arrays of non-public classes are not public either
    assert!(!harness.load("[La/Hidden;").is_public());

    // The same name always gives the same class
    assert!(Arc::ptr_eq(
        &harness.load("[Ljava/lang/String;"),
        &strings
    ));
}

#[test]
fn duplicate_definitions() {
    let harness = TestHarness::new(vec![]);
    let definition = ClassDefinition::class("demo/Once");
    harness
        .vm
        .define_class(LoaderId::BOOTSTRAP, &definition)
        .unwrap();
    assert!(matches!(
        harness.vm.define_class(LoaderId::BOOTSTRAP, &definition),
        Err(Error::Linkage(_))
    ));
}

#[test]
fn malformed_definitions() {
    let harness = TestHarness::new(vec![]);
    let bad = [
        ClassDefinition::class("demo/Both")
            .flags(ClassAccessFlags::FINAL | ClassAccessFlags::ABSTRACT),
        ClassDefinition::class("demo/BadField").field("x", "Q", FieldAccessFlags::PUBLIC),
        ClassDefinition::class("demo/BadMethod").method("m", "(I", public()),
        ClassDefinition::class("demo/BadName").method("<m>", "()V", public()),
    ];
    for definition in &bad {
        assert!(
            matches!(
                harness.vm.define_class(LoaderId::BOOTSTRAP, definition),
                Err(Error::ClassFormat(_))
            ),
            "{} should be rejected",
            definition.name
        );
    }
}

#[test]
fn objects() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Concrete"),
        ClassDefinition::class("demo/Abstract").flags(abstract_class()),
    ]);

    let concrete = harness.load("demo/Concrete");
    let object = harness.vm.new_object(&concrete).unwrap();
    assert!(Arc::ptr_eq(object.vtable(), concrete.vtable().unwrap()));
    assert_eq!(object.array_length(), None);

    let shape = harness.load("demo/Abstract");
    assert!(matches!(
        harness.vm.new_object(&shape),
        Err(Error::IncompatibleClassChange(_))
    ));
    let serializable = harness.load("java/io/Serializable");
    assert!(matches!(
        harness.vm.new_object(&serializable),
        Err(Error::IncompatibleClassChange(_))
    ));

    let ints = harness.load("[I");
    let array = harness.vm.new_array_object(&ints, 3).unwrap();
    assert_eq!(array.array_length(), Some(3));
    assert!(harness.vm.new_array_object(&concrete, 3).is_err());
}
