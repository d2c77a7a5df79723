//! Class linking and symbolic reference resolution for a JVM
//!
//! The crate takes classes that have been loaded but not connected to one another and turns them
//! into a linked object model: instance layouts, virtual tables, interface tables, constant-time
//! subtype tests, and cross-loader type-safety guarantees.
//!
//! ### Simple example
//!
//! ```
//! use jvmlink::jvm::class_graph::ClassPath;
//! use jvmlink::jvm::*;
//! use jvmlink::{Settings, Vm};
//! use std::sync::Arc;
//!
//! # fn link() -> Result<()> {
//! let class_path = ClassPath::with_java_library();
//! class_path.define(
//!     LoaderId::BOOTSTRAP,
//!     ClassDefinition::class("me/alec/Point")
//!         .field("x", "I", FieldAccessFlags::PUBLIC)
//!         .field("y", "I", FieldAccessFlags::PUBLIC)
//!         .method("<init>", "(II)V", MethodAccessFlags::PUBLIC),
//! );
//!
//! let vm = Vm::new(Settings::new(), Arc::new(class_path));
//! let point = vm.load_class_named(LoaderId::BOOTSTRAP, "me/alec/Point")?;
//! let vtable = vm.link_class(&point)?;
//!
//! let object = vm.load_class_named(LoaderId::BOOTSTRAP, "java/lang/Object")?;
//! let object_vtable = vm.link_class(&object)?;
//! assert!(vm.graph().is_assignable(&vtable, &object_vtable));
//! # Ok(())
//! # }
//! # link().unwrap();
//! ```

pub mod jvm;
mod settings;
mod util;
mod vm;

pub use settings::*;
pub use vm::Vm;
