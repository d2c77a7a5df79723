mod common;

use common::*;
use jvmlink::jvm::class_graph::{ClassLoader, ClassPath, ClassRefOrInfo, SymbolicClassRef};
use jvmlink::jvm::resolver::*;
use jvmlink::jvm::*;
use jvmlink::{Settings, Vm};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Class path that counts how often the VM asks it for a class
struct CountingLoader {
    inner: ClassPath,
    requests: AtomicUsize,
}

impl ClassLoader for CountingLoader {
    fn find_class(
        &self,
        loader: LoaderId,
        name: &BinaryName,
    ) -> Option<(LoaderId, ClassDefinition)> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.find_class(loader, name)
    }
}

fn method_request(class: &ClassInfo, index: usize, kind: InvokeKind) -> UnresolvedMethod {
    UnresolvedMethod::new(class.method_refs[index].clone(), kind)
}

fn field_request(class: &ClassInfo, index: usize, access: FieldAccess) -> UnresolvedField {
    UnresolvedField::new(class.field_refs[index].clone(), access)
}

fn class_request(referer: &ClassInfo, name: &str) -> UnresolvedClass {
    UnresolvedClass::new(SymbolicClassRef {
        referer: referer.id,
        name: class_name(name),
    })
}

fn types(referer: &ClassInfo, names: &[&str]) -> SubtypeConstraintSet {
    let mut set = SubtypeConstraintSet::new();
    for name in names {
        set.push(symbolic(referer, &class_name(name)));
    }
    set
}

#[test]
fn lazy_resolution_defers_instead_of_loading() {
    init_logging();
    let class_path = ClassPath::with_java_library();
    class_path.define(
        LoaderId::BOOTSTRAP,
        ClassDefinition::class("demo/Caller").reference_method("demo/Callee", "run", "()V"),
    );
    class_path.define(
        LoaderId::BOOTSTRAP,
        ClassDefinition::class("demo/Callee").method("run", "()V", public()),
    );
    let loader = Arc::new(CountingLoader {
        inner: class_path,
        requests: AtomicUsize::new(0),
    });
    let vm = Vm::new(Settings::new(), loader.clone());

    let caller = vm.load_class_named(LoaderId::BOOTSTRAP, "demo/Caller").unwrap();
    vm.link_class(&caller).unwrap();
    let request = method_request(&caller, 0, InvokeKind::Virtual);

    let before = loader.requests.load(Ordering::SeqCst);
    assert!(vm.resolve_method(&request, ResolveMode::Lazy).is_deferred());
    assert_eq!(loader.requests.load(Ordering::SeqCst), before);
    assert!(vm
        .graph()
        .lookup(LoaderId::BOOTSTRAP, &class_name("demo/Callee"))
        .is_none());

    let method = vm
        .resolve_method(&request, ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert!(loader.requests.load(Ordering::SeqCst) > before);
    assert_eq!(method.class_name.as_str(), "demo/Callee");
    assert!(request.method_ref.descriptor.is_finalized());

    // Everything is loaded now, so lazy resolution goes through
    let again = vm.resolve_method(&request, ResolveMode::Lazy).succeeded().unwrap();
    assert!(Arc::ptr_eq(&method, &again));
}

#[test]
fn eager_resolution_never_defers() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/Caller")
        .reference_method("demo/Nowhere", "run", "()V")
        .reference_method("java/lang/Object", "hashCode", "()I")]);
    let caller = harness.load("demo/Caller");

    match harness
        .vm
        .resolve_method(&method_request(&caller, 0, InvokeKind::Virtual), ResolveMode::Eager)
    {
        ResolveResult::Failed(Error::NoClassDefFound(_)) => (),
        other => panic!("expected NoClassDefFoundError, got {:?}", other.map(|_| ())),
    }
    assert!(harness
        .vm
        .resolve_method(&method_request(&caller, 1, InvokeKind::Virtual), ResolveMode::Eager)
        .is_succeeded());
}

#[test]
fn lazy_resolution_creates_arrays_of_loaded_classes() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/User")]);
    let user = harness.load("demo/User");
    harness.load("java/lang/String");

    let strings = harness
        .vm
        .resolve_class(&class_request(&user, "[[Ljava/lang/String;"), ResolveMode::Lazy)
        .succeeded()
        .unwrap();
    assert_eq!(strings.name.as_str(), "[[Ljava/lang/String;");
    assert!(harness
        .vm
        .resolve_class(&class_request(&user, "[Ljava/lang/Long;"), ResolveMode::Lazy)
        .is_deferred());
    assert!(harness
        .vm
        .resolve_class(&class_request(&user, "[J"), ResolveMode::Lazy)
        .is_succeeded());
}

#[test]
fn class_access() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("a/Hidden").flags(ClassAccessFlags::SUPER),
        ClassDefinition::class("a/Friend"),
        ClassDefinition::class("b/Stranger"),
    ]);
    let friend = harness.load("a/Friend");
    let stranger = harness.load("b/Stranger");

    assert!(harness
        .vm
        .resolve_class(&class_request(&friend, "a/Hidden"), ResolveMode::Eager)
        .is_succeeded());
    assert!(matches!(
        harness
            .vm
            .resolve_class(&class_request(&stranger, "a/Hidden"), ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));
    assert!(matches!(
        harness
            .vm
            .resolve_class(&class_request(&stranger, "[La/Hidden;"), ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));
}

#[test]
fn class_subtype_constraints() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/User")]);
    let user = harness.load("demo/User");

    let request = class_request(&user, "java/lang/Number")
        .with_subtype_constraints(types(&user, &["java/lang/Integer", "java/lang/Long"]));
    assert!(harness.vm.resolve_class(&request, ResolveMode::Eager).is_succeeded());

    let request = class_request(&user, "java/lang/Number")
        .with_subtype_constraints(types(&user, &["java/lang/Integer", "java/lang/String"]));
    assert!(matches!(
        harness.vm.resolve_class(&request, ResolveMode::Eager),
        ResolveResult::Failed(Error::Linkage(_))
    ));

    // Interfaces accept anything, like they do in the verifier
    let request = class_request(&user, "java/lang/CharSequence")
        .with_subtype_constraints(types(&user, &["java/lang/Integer"]));
    assert!(harness.vm.resolve_class(&request, ResolveMode::Eager).is_succeeded());
}

#[test]
fn unloadable_subtypes_satisfy_constraints() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/User")]);
    let user = harness.load("demo/User");

    // `demo/Ghost` does not exist, so no instance of it can ever reach this point
    let request = class_request(&user, "java/lang/Number")
        .with_subtype_constraints(types(&user, &["demo/Ghost"]));
    assert!(harness.vm.resolve_class(&request, ResolveMode::Eager).is_succeeded());
    assert!(harness
        .vm
        .graph()
        .lookup(LoaderId::BOOTSTRAP, &class_name("demo/Ghost"))
        .is_none());
}

#[test]
fn unloaded_subtypes_defer_lazy_checks() {
    let harness = TestHarness::new(vec![ClassDefinition::class("demo/User")]);
    let user = harness.load("demo/User");
    harness.linked("java/lang/Number");

    let request = class_request(&user, "java/lang/Number")
        .with_subtype_constraints(types(&user, &["java/lang/Integer"]));
    assert!(harness.vm.resolve_class(&request, ResolveMode::Lazy).is_deferred());
    assert!(harness.vm.resolve_class(&request, ResolveMode::Eager).is_succeeded());
    assert!(harness.vm.resolve_class(&request, ResolveMode::Lazy).is_succeeded());
}

#[test]
fn fields() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/Consts").field(
            "LIMIT",
            "I",
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        ),
        ClassDefinition::class("demo/Base").field("count", "I", FieldAccessFlags::PUBLIC),
        ClassDefinition::class("demo/Holder")
            .extends("demo/Base")
            .implements("demo/Consts")
            .field("total", "J", FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC),
        ClassDefinition::class("demo/User")
            .reference_field("demo/Holder", "count", "I")
            .reference_field("demo/Holder", "total", "J")
            .reference_field("demo/Holder", "LIMIT", "I")
            .reference_field("demo/Holder", "missing", "I"),
    ]);
    let user = harness.load("demo/User");
    let resolve = |index, access| {
        harness
            .vm
            .resolve_field(&field_request(&user, index, access), ResolveMode::Eager)
    };

    let count = resolve(0, FieldAccess::GetField).succeeded().unwrap();
    assert_eq!(count.class_name.as_str(), "demo/Base");
    assert!(resolve(0, FieldAccess::PutField).is_succeeded());
    assert!(matches!(
        resolve(0, FieldAccess::GetStatic),
        ResolveResult::Failed(Error::IncompatibleClassChange(_))
    ));

    assert!(resolve(1, FieldAccess::PutStatic).is_succeeded());
    assert!(matches!(
        resolve(1, FieldAccess::GetField),
        ResolveResult::Failed(Error::IncompatibleClassChange(_))
    ));

    // Found through the superinterface, and final
    let limit = resolve(2, FieldAccess::GetStatic).succeeded().unwrap();
    assert_eq!(limit.class_name.as_str(), "demo/Consts");
    assert!(matches!(
        resolve(2, FieldAccess::PutStatic),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));

    assert!(matches!(
        resolve(3, FieldAccess::GetField),
        ResolveResult::Failed(Error::NoSuchField(_))
    ));
}

#[test]
fn private_members_are_private() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Vault")
            .field("secret", "I", FieldAccessFlags::PRIVATE)
            .method("open", "()V", MethodAccessFlags::PRIVATE),
        ClassDefinition::class("demo/Thief")
            .reference_field("demo/Vault", "secret", "I")
            .reference_method("demo/Vault", "open", "()V"),
    ]);
    let thief = harness.load("demo/Thief");

    assert!(matches!(
        harness
            .vm
            .resolve_field(&field_request(&thief, 0, FieldAccess::GetField), ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));
    assert!(matches!(
        harness
            .vm
            .resolve_method(&method_request(&thief, 0, InvokeKind::Special), ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));
}

#[test]
fn method_shapes() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/Shape").method("area", "()D", public_abstract()),
        ClassDefinition::class("demo/Square")
            .implements("demo/Shape")
            .method("area", "()D", public())
            .method("unit", "()Ldemo/Square;", public() | MethodAccessFlags::STATIC),
        ClassDefinition::class("demo/User")
            .reference_method("demo/Square", "area", "()D")
            .reference_method("demo/Shape", "area", "()D")
            .reference_method("demo/Square", "unit", "()Ldemo/Square;")
            .reference_method("demo/Square", "perimeter", "()D")
            .reference_method("demo/Shape", "hashCode", "()I"),
    ]);
    let user = harness.load("demo/User");
    let resolve = |index, kind| {
        harness
            .vm
            .resolve_method(&method_request(&user, index, kind), ResolveMode::Eager)
    };

    assert!(resolve(0, InvokeKind::Virtual).is_succeeded());
    assert!(matches!(
        resolve(0, InvokeKind::Interface),
        ResolveResult::Failed(Error::IncompatibleClassChange(_))
    ));
    assert!(resolve(1, InvokeKind::Interface).is_succeeded());
    assert!(matches!(
        resolve(1, InvokeKind::Virtual),
        ResolveResult::Failed(Error::IncompatibleClassChange(_))
    ));

    assert!(resolve(2, InvokeKind::Static).is_succeeded());
    assert!(matches!(
        resolve(2, InvokeKind::Virtual),
        ResolveResult::Failed(Error::IncompatibleClassChange(_))
    ));

    assert!(matches!(
        resolve(3, InvokeKind::Virtual),
        ResolveResult::Failed(Error::NoSuchMethod(_))
    ));

    // Interfaces see the public methods of `java/lang/Object`
    let hash_code = resolve(4, InvokeKind::Interface).succeeded().unwrap();
    assert_eq!(hash_code.class_name.as_str(), "java/lang/Object");
}

#[test]
fn methods_are_found_in_superclasses_and_superinterfaces() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/Named").method("name", "()Ljava/lang/String;", public()),
        ClassDefinition::class("demo/Base").method("size", "()I", public()),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .implements("demo/Named"),
        ClassDefinition::class("demo/User")
            .reference_method("demo/Sub", "size", "()I")
            .reference_method("demo/Sub", "name", "()Ljava/lang/String;"),
    ]);
    let user = harness.load("demo/User");

    let size = harness
        .vm
        .resolve_method(&method_request(&user, 0, InvokeKind::Virtual), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(size.class_name.as_str(), "demo/Base");
    let name = harness
        .vm
        .resolve_method(&method_request(&user, 1, InvokeKind::Virtual), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(name.class_name.as_str(), "demo/Named");
}

#[test]
fn invokespecial_dispatches_from_the_direct_superclass() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Base")
            .method("<init>", "()V", public())
            .method("greet", "()V", public()),
        ClassDefinition::class("demo/Mid")
            .extends("demo/Base")
            .method("greet", "()V", public()),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Mid")
            .method("greet", "()V", public())
            .reference_method("demo/Base", "greet", "()V")
            .reference_method("demo/Base", "<init>", "()V"),
        ClassDefinition::class("demo/Old")
            .flags(ClassAccessFlags::PUBLIC)
            .extends("demo/Mid")
            .reference_method("demo/Base", "greet", "()V"),
    ]);
    harness.linked("demo/Sub");
    harness.linked("demo/Old");
    let sub = harness.load("demo/Sub");

    let greet = harness
        .vm
        .resolve_method(&method_request(&sub, 0, InvokeKind::Special), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(greet.class_name.as_str(), "demo/Mid");

    // Plain virtual resolution sticks to what the reference names
    let old = harness.load("demo/Old");
    let virtual_greet = harness
        .vm
        .resolve_method(&method_request(&old, 0, InvokeKind::Virtual), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(virtual_greet.class_name.as_str(), "demo/Base");

    // Without ACC_SUPER, invokespecial calls exactly the resolved method
    let old_greet = harness
        .vm
        .resolve_method(&method_request(&old, 0, InvokeKind::Special), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(old_greet.class_name.as_str(), "demo/Base");

    // Constructors are never redirected
    let init = harness
        .vm
        .resolve_method(&method_request(&sub, 1, InvokeKind::Special), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(init.class_name.as_str(), "demo/Base");
}

#[test]
fn invokespecial_finds_inherited_default_methods() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I").method("g", "()V", public()),
        ClassDefinition::class("demo/Base").implements("demo/I"),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .reference_method("demo/Base", "g", "()V"),
    ]);
    harness.linked("demo/Sub");
    let sub = harness.load("demo/Sub");

    let virtual_g = harness
        .vm
        .resolve_method(&method_request(&sub, 0, InvokeKind::Virtual), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(virtual_g.class_name.as_str(), "demo/I");

    let special_g = harness
        .vm
        .resolve_method(&method_request(&sub, 0, InvokeKind::Special), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(special_g.id, virtual_g.id);
}

#[test]
fn invokespecial_without_an_implementation() {
    let harness = TestHarness::new(vec![
        ClassDefinition::interface("demo/I").method("h", "()V", public_abstract()),
        ClassDefinition::class("demo/Base")
            .flags(abstract_class())
            .implements("demo/I")
            .method("k", "()V", public_abstract()),
        ClassDefinition::class("demo/Sub")
            .flags(abstract_class())
            .extends("demo/Base")
            .reference_method("demo/Base", "h", "()V")
            .reference_method("demo/Base", "k", "()V"),
    ]);
    harness.linked("demo/Sub");
    let sub = harness.load("demo/Sub");

    for index in 0..2 {
        // Virtual calls resolve fine and fail only when dispatched
        let virtual_call = method_request(&sub, index, InvokeKind::Virtual);
        assert!(harness
            .vm
            .resolve_method(&virtual_call, ResolveMode::Eager)
            .is_succeeded());

        let special_call = method_request(&sub, index, InvokeKind::Special);
        assert!(matches!(
            harness.vm.resolve_method(&special_call, ResolveMode::Eager),
            ResolveResult::Failed(Error::AbstractMethod(_))
        ));
    }
}

#[test]
fn member_lookups_release_their_scratch_memory() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Base")
            .field("x", "I", FieldAccessFlags::PUBLIC)
            .method("run", "()V", public()),
        ClassDefinition::class("demo/Sub")
            .extends("demo/Base")
            .reference_method("demo/Sub", "run", "()V")
            .reference_field("demo/Sub", "x", "I"),
    ]);
    harness.linked("demo/Sub");
    let sub = harness.load("demo/Sub");
    let before = harness.vm.dump().allocated_bytes();

    let run = harness
        .vm
        .resolve_method(&method_request(&sub, 0, InvokeKind::Virtual), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(run.class_name.as_str(), "demo/Base");
    let x = harness
        .vm
        .resolve_field(&field_request(&sub, 0, FieldAccess::GetField), ResolveMode::Eager)
        .succeeded()
        .unwrap();
    assert_eq!(x.class_name.as_str(), "demo/Base");

    assert_eq!(harness.vm.dump().outstanding(), 0);
    assert!(harness.vm.dump().allocated_bytes() > before);
}

#[test]
fn protected_access_from_another_package() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("a/Base")
            .field("x", "I", FieldAccessFlags::PROTECTED)
            .method("touch", "()V", MethodAccessFlags::PROTECTED),
        ClassDefinition::class("b/Sub")
            .extends("a/Base")
            .reference_field("a/Base", "x", "I")
            .reference_method("a/Base", "touch", "()V"),
        ClassDefinition::class("b/Cousin").extends("a/Base"),
        ClassDefinition::class("b/Other").reference_field("a/Base", "x", "I"),
    ]);
    harness.linked("b/Sub");
    let sub = harness.load("b/Sub");

    let own = field_request(&sub, 0, FieldAccess::GetField)
        .with_instance_types(types(&sub, &["b/Sub"]));
    assert!(harness.vm.resolve_field(&own, ResolveMode::Eager).is_succeeded());

    let foreign = field_request(&sub, 0, FieldAccess::GetField)
        .with_instance_types(types(&sub, &["b/Sub", "b/Cousin"]));
    assert!(matches!(
        harness.vm.resolve_field(&foreign, ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));

    let call = method_request(&sub, 0, InvokeKind::Virtual)
        .with_instance_types(types(&sub, &["a/Base"]));
    assert!(matches!(
        harness.vm.resolve_method(&call, ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));

    // Arrays are exempt (their only protected member, `clone`, is redeclared public)
    let arrays = field_request(&sub, 0, FieldAccess::GetField)
        .with_instance_types(types(&sub, &["[Lb/Sub;"]));
    assert!(harness.vm.resolve_field(&arrays, ResolveMode::Eager).is_succeeded());

    // Not a subclass at all
    let other = harness.load("b/Other");
    assert!(matches!(
        harness
            .vm
            .resolve_field(&field_request(&other, 0, FieldAccess::GetField), ResolveMode::Eager),
        ResolveResult::Failed(Error::IllegalAccess(_))
    ));
}

#[test]
fn argument_and_value_types() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Sink")
            .field(
                "number",
                "Ljava/lang/Number;",
                FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
            )
            .method("take", "(ILjava/lang/Number;)V", public() | MethodAccessFlags::STATIC),
        ClassDefinition::class("demo/User")
            .reference_field("demo/Sink", "number", "Ljava/lang/Number;")
            .reference_method("demo/Sink", "take", "(ILjava/lang/Number;)V"),
    ]);
    let user = harness.load("demo/User");

    let good = method_request(&user, 0, InvokeKind::Static)
        .with_param_types(1, types(&user, &["java/lang/Integer"]));
    assert!(harness.vm.resolve_method(&good, ResolveMode::Eager).is_succeeded());
    let bad = method_request(&user, 0, InvokeKind::Static)
        .with_param_types(1, types(&user, &["java/lang/String"]));
    assert!(matches!(
        harness.vm.resolve_method(&bad, ResolveMode::Eager),
        ResolveResult::Failed(Error::Linkage(_))
    ));

    let put = field_request(&user, 0, FieldAccess::PutStatic)
        .with_value_types(types(&user, &["java/lang/Long"]));
    assert!(harness.vm.resolve_field(&put, ResolveMode::Eager).is_succeeded());
    let bad_put = field_request(&user, 0, FieldAccess::PutStatic)
        .with_value_types(types(&user, &["java/lang/Throwable"]));
    assert!(matches!(
        harness.vm.resolve_field(&bad_put, ResolveMode::Eager),
        ResolveResult::Failed(Error::Linkage(_))
    ));

    // Without verification the sets are not looked at
    let mut settings = Settings::new();
    settings.verify = false;
    let trusting = TestHarness::with_settings(
        vec![
            ClassDefinition::class("demo/Sink")
                .method("take", "(ILjava/lang/Number;)V", public() | MethodAccessFlags::STATIC),
            ClassDefinition::class("demo/User")
                .reference_method("demo/Sink", "take", "(ILjava/lang/Number;)V"),
        ],
        settings,
    );
    let user = trusting.load("demo/User");
    let bad = method_request(&user, 0, InvokeKind::Static)
        .with_param_types(1, types(&user, &["java/lang/String"]));
    assert!(trusting.vm.resolve_method(&bad, ResolveMode::Eager).is_succeeded());
}

#[test]
fn receivers_must_match_the_container() {
    let harness = TestHarness::new(vec![
        ClassDefinition::class("demo/Counter").method("bump", "()V", public()),
        ClassDefinition::class("demo/User").reference_method("demo/Counter", "bump", "()V"),
    ]);
    let user = harness.load("demo/User");

    let good = method_request(&user, 0, InvokeKind::Virtual)
        .with_instance_types(types(&user, &["demo/Counter"]));
    assert!(harness.vm.resolve_method(&good, ResolveMode::Eager).is_succeeded());

    let bad = method_request(&user, 0, InvokeKind::Virtual)
        .with_instance_types(
            SubtypeConstraintSet::new().with(ClassRefOrInfo::Resolved(user.clone())),
        );
    assert!(matches!(
        harness.vm.resolve_method(&bad, ResolveMode::Eager),
        ResolveResult::Failed(Error::Linkage(_))
    ));
}

#[test]
fn resolve_result_conversions() {
    let deferred: ResolveResult<()> = ResolveResult::Deferred;
    assert!(matches!(
        deferred.into_result(Some(&class_name("demo/Later"))),
        Err(Error::NoClassDefFound(msg)) if msg == "demo/Later"
    ));

    let failed: ResolveResult<u8> = Err(Error::Verify("nope".to_owned())).into();
    assert!(failed.is_failed());
    assert_eq!(failed.error(), Some(&Error::Verify("nope".to_owned())));

    let succeeded: ResolveResult<u8> = Ok(3).into();
    assert_eq!(succeeded.map(|n| n * 2).succeeded(), Some(6));
}
