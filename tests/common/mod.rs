#![allow(dead_code)]

use jvmlink::jvm::class_graph::ClassPath;
use jvmlink::jvm::linker::VTable;
use jvmlink::jvm::*;
use jvmlink::{Settings, Vm};
use std::sync::Arc;

pub struct TestHarness {
    pub vm: Vm,
}

impl TestHarness {
    /// Harness whose bootstrap loader has the core library plus the given classes
    pub fn new(classes: Vec<ClassDefinition>) -> TestHarness {
        TestHarness::with_settings(classes, Settings::new())
    }

    pub fn with_settings(classes: Vec<ClassDefinition>, settings: Settings) -> TestHarness {
        let class_path = ClassPath::with_java_library();
        for class in classes {
            class_path.define(LoaderId::BOOTSTRAP, class);
        }
        TestHarness::from_class_path(class_path, settings)
    }

    pub fn from_class_path(class_path: ClassPath, settings: Settings) -> TestHarness {
        init_logging();
        TestHarness {
            vm: Vm::new(settings, Arc::new(class_path)),
        }
    }

    pub fn load(&self, name: &str) -> Arc<ClassInfo> {
        self.vm
            .load_class_named(LoaderId::BOOTSTRAP, name)
            .unwrap_or_else(|err| panic!("failed to load {}: {}", name, err))
    }

    pub fn link(&self, name: &str) -> Result<Arc<VTable>> {
        let class = self.load(name);
        self.vm.link_class(&class)
    }

    pub fn linked(&self, name: &str) -> Arc<VTable> {
        self.link(name)
            .unwrap_or_else(|err| panic!("failed to link {}: {}", name, err))
    }

    /// Method declared (or synthesized) in a class
    pub fn method(&self, class: &str, name: &str, descriptor: &str) -> Arc<MethodInfo> {
        self.load(class)
            .find_method(&unqualified(name), descriptor)
            .unwrap_or_else(|| panic!("{} has no method {}{}", class, name, descriptor))
    }

    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        let sub = self.linked(sub);
        let sup = self.linked(sup);
        self.vm.graph().is_assignable(&sub, &sup)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn unqualified(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(name.to_owned()).unwrap()
}

pub fn class_name(name: &str) -> ClassName {
    ClassName::from_string(name.to_owned()).unwrap()
}

pub fn public() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC
}

pub fn public_abstract() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT
}

pub fn abstract_class() -> ClassAccessFlags {
    ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER | ClassAccessFlags::ABSTRACT
}
