mod access_flags;
pub mod class_graph;
mod descriptor_pool;
mod descriptors;
mod dump;
mod errors;
pub mod linker;
mod names;
mod object;
pub mod resolver;

pub use access_flags::*;
pub use class_graph::{
    ClassDefinition, ClassId, ClassInfo, ClassLoader, ClassState, FieldId, FieldInfo, LoaderId,
    MethodId, MethodInfo,
};
pub use descriptor_pool::*;
pub use descriptors::*;
pub use dump::*;
pub use errors::*;
pub use names::*;
pub use object::*;
