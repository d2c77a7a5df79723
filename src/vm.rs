use crate::jvm::class_graph::{
    ClassDefinition, ClassGraph, ClassId, ClassInfo, ClassLoader, FieldId, FieldInfo, LoaderId,
    MethodId, MethodInfo,
};
use crate::jvm::linker::{Invalidation, InvalidationQueue};
use crate::jvm::resolver::{FieldRef, MethodRef};
use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassName, DescriptorPool, DumpArena, Error, FieldType,
    MethodAccessFlags, Name, Object, Result, UnqualifiedName,
};
use crate::Settings;
use std::sync::Arc;

/// Linking and resolution context
///
/// This owns the class graph (and so every class ever loaded), the source of class definitions,
/// and the bookkeeping shared by all linking and resolution calls. All operations take `&self`
/// and may be called from several threads at once.
pub struct Vm {
    settings: Settings,
    graph: ClassGraph,
    class_loader: Arc<dyn ClassLoader>,
    dump: DumpArena,
    invalidations: InvalidationQueue,
}

impl Vm {
    pub fn new(settings: Settings, class_loader: Arc<dyn ClassLoader>) -> Vm {
        Vm {
            settings,
            graph: ClassGraph::new(),
            class_loader,
            dump: DumpArena::new(),
            invalidations: InvalidationQueue::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn graph(&self) -> &ClassGraph {
        &self.graph
    }

    pub fn dump(&self) -> &DumpArena {
        &self.dump
    }

    pub fn class_loader(&self) -> &Arc<dyn ClassLoader> {
        &self.class_loader
    }

    pub(crate) fn invalidations(&self) -> &InvalidationQueue {
        &self.invalidations
    }

    /// Load a class by name on behalf of `loader`
    ///
    /// The class is recorded under both its defining loader and `loader`. Array classes are
    /// created on the spot.
    pub fn load_class(&self, loader: LoaderId, name: &ClassName) -> Result<Arc<ClassInfo>> {
        if let Some(class) = self.graph.lookup(loader, name) {
            return Ok(class);
        }
        if name.is_array() {
            return self.create_array_class(loader, name);
        }

        let binary_name = BinaryName::from_string(name.as_str().to_owned())
            .map_err(|_| Error::NoClassDefFound(name.as_str().to_owned()))?;
        let (definer, definition) = self
            .class_loader
            .find_class(loader, &binary_name)
            .ok_or_else(|| Error::NoClassDefFound(name.as_str().to_owned()))?;
        if definition.name != name.as_str() {
            return Err(Error::NoClassDefFound(format!(
                "{} (wrong name: {})",
                name.as_str(),
                definition.name
            )));
        }

        let class = match self.graph.lookup(definer, name) {
            Some(class) => class,
            None => {
                let class = self.build_class(definer, &definition)?;
                log::debug!(
                    "Defined class {} (loader {})",
                    class.name.as_str(),
                    definer.0
                );
                self.graph.store(definer, &class, false)?
            }
        };
        if definer == loader {
            Ok(class)
        } else {
            self.graph.store(loader, &class, false)
        }
    }

    /// Load a class given its name as a string
    pub fn load_class_named(&self, loader: LoaderId, name: &str) -> Result<Arc<ClassInfo>> {
        let name = ClassName::from_string(name.to_owned())
            .map_err(|msg| Error::NoClassDefFound(format!("{} ({})", name, msg)))?;
        self.load_class(loader, &name)
    }

    /// Define a class with `loader` as its defining loader
    ///
    /// Defining the same name twice with one loader is a `LinkageError`.
    pub fn define_class(
        &self,
        loader: LoaderId,
        definition: &ClassDefinition,
    ) -> Result<Arc<ClassInfo>> {
        let class = self.build_class(loader, definition)?;
        log::debug!(
            "Defined class {} (loader {})",
            class.name.as_str(),
            loader.0
        );
        self.graph.store(loader, &class, true)
    }

    /// Validate a definition and turn it into a (loaded, not yet recorded) class
    fn build_class(
        &self,
        loader: LoaderId,
        definition: &ClassDefinition,
    ) -> Result<Arc<ClassInfo>> {
        definition.validate()?;
        let name = ClassName::from_string(definition.name.clone()).map_err(Error::ClassFormat)?;
        let mut pool = DescriptorPool::new(&name);
        let this = pool.this_class();

        let superclass = match &definition.superclass {
            Some(superclass) => Some(pool.add_class(superclass)?),
            None => None,
        };
        let mut interfaces = Vec::with_capacity(definition.interfaces.len());
        for interface in &definition.interfaces {
            interfaces.push(pool.add_class(interface)?);
        }
        for class in &definition.class_refs {
            pool.add_class(class)?;
        }

        let scope = self.dump.checkpoint();
        let mut field_types = bumpalo::collections::Vec::new_in(&*scope);
        for field in &definition.fields {
            let name = unqualified(&field.name)?;
            field_types.push((name, pool.parse_field_descriptor(&field.descriptor)?));
        }
        let mut method_descs = bumpalo::collections::Vec::new_in(&*scope);
        for method in &definition.methods {
            let name = unqualified(&method.name)?;
            let desc =
                pool.parse_method_descriptor(&method.descriptor, Some(method.access_flags), this)?;
            method_descs.push((name, desc));
        }
        let mut field_refs = bumpalo::collections::Vec::new_in(&*scope);
        for field_ref in &definition.field_refs {
            let class = pool.add_class(&field_ref.class)?;
            let typ = pool.parse_field_descriptor(&field_ref.descriptor)?;
            field_refs.push((class, unqualified(&field_ref.name)?, typ));
        }
        let mut method_refs = bumpalo::collections::Vec::new_in(&*scope);
        for method_ref in &definition.method_refs {
            let class = pool.add_class(&method_ref.class)?;
            let desc = pool.parse_method_descriptor(&method_ref.descriptor, None, class)?;
            method_refs.push((class, unqualified(&method_ref.name)?, desc));
        }

        self.graph.insert_with(|id| {
            let refs = Arc::new(pool.finish(id, loader));
            let fields = definition
                .fields
                .iter()
                .zip(field_types.iter())
                .enumerate()
                .map(|(index, (field, (field_name, descriptor)))| {
                    Arc::new(FieldInfo {
                        id: FieldId {
                            class: id,
                            index: index as u16,
                        },
                        class_name: name.clone(),
                        name: field_name.clone(),
                        descriptor: *descriptor,
                        descriptor_string: field.descriptor.clone(),
                        access_flags: field.access_flags,
                    })
                })
                .collect();
            let methods = definition
                .methods
                .iter()
                .zip(method_descs.iter())
                .enumerate()
                .map(|(index, (method, (method_name, descriptor)))| {
                    Arc::new(MethodInfo::new(
                        MethodId {
                            class: id,
                            index: index as u16,
                        },
                        name.clone(),
                        method_name.clone(),
                        descriptor.clone(),
                        method.descriptor.clone(),
                        refs.clone(),
                        method.access_flags,
                        None,
                    ))
                })
                .collect();
            let field_refs = definition
                .field_refs
                .iter()
                .zip(field_refs.iter())
                .map(|(field_ref, (class, field_name, typ))| {
                    Arc::new(FieldRef::new(
                        refs.clone(),
                        *class,
                        field_name.clone(),
                        *typ,
                        field_ref.descriptor.clone(),
                    ))
                })
                .collect();
            let method_refs = definition
                .method_refs
                .iter()
                .zip(method_refs.iter())
                .map(|(method_ref, (class, method_name, desc))| {
                    Arc::new(MethodRef::new(
                        refs.clone(),
                        *class,
                        method_name.clone(),
                        desc.clone(),
                        method_ref.descriptor.clone(),
                    ))
                })
                .collect();

            Ok(ClassInfo::new(
                id,
                name.clone(),
                loader,
                definition.access_flags,
                superclass,
                interfaces,
                refs,
                fields,
                methods,
                field_refs,
                method_refs,
            ))
        })
    }

    /// Create an array class
    ///
    /// Its defining loader is that of the element class (or the bootstrap loader for arrays of
    /// primitives), and it is public exactly when the element class is.
    fn create_array_class(&self, loader: LoaderId, name: &ClassName) -> Result<Arc<ClassInfo>> {
        let component = name
            .component_type()
            .ok_or_else(|| Error::NoClassDefFound(name.as_str().to_owned()))?;
        let (definer, public) = match &component {
            FieldType::Base(_) => (LoaderId::BOOTSTRAP, true),
            FieldType::Ref(component_type) => {
                let component = self.load_class(loader, &ClassName::of_ref_type(component_type))?;
                (component.loader, component.is_public())
            }
        };

        let class = match self.graph.lookup(definer, name) {
            Some(class) => class,
            None => {
                let mut access_flags = ClassAccessFlags::FINAL | ClassAccessFlags::ABSTRACT;
                if public {
                    access_flags |= ClassAccessFlags::PUBLIC;
                }

                let mut pool = DescriptorPool::new(name);
                let this = pool.this_class();
                let object = pool.add_class(BinaryName::OBJECT.as_str())?;
                let cloneable = pool.add_class(BinaryName::CLONEABLE.as_str())?;
                let serializable = pool.add_class(BinaryName::SERIALIZABLE.as_str())?;
                let clone_flags = MethodAccessFlags::PUBLIC;
                let clone_descriptor = "()Ljava/lang/Object;";
                let clone_desc =
                    pool.parse_method_descriptor(clone_descriptor, Some(clone_flags), this)?;

                let class = self.graph.insert_with(|id| {
                    let refs = Arc::new(pool.finish(id, definer));
                    let clone = Arc::new(MethodInfo::new(
                        MethodId { class: id, index: 0 },
                        name.clone(),
                        UnqualifiedName::CLONE,
                        clone_desc,
                        clone_descriptor.to_owned(),
                        refs.clone(),
                        clone_flags,
                        None,
                    ));
                    Ok(ClassInfo::new(
                        id,
                        name.clone(),
                        definer,
                        access_flags,
                        Some(object),
                        vec![cloneable, serializable],
                        refs,
                        vec![],
                        vec![clone],
                        vec![],
                        vec![],
                    ))
                })?;
                log::debug!(
                    "Created array class {} (loader {})",
                    name.as_str(),
                    definer.0
                );
                self.graph.store(definer, &class, false)?
            }
        };

        if definer == loader {
            Ok(class)
        } else {
            self.graph.store(loader, &class, false)
        }
    }

    /// Record that compiled code in `caller` assumes `callee` is never overridden
    ///
    /// Returns `false` if `callee` is already overridden. Otherwise, the first override of
    /// `callee` queues an [`Invalidation`] for `caller`.
    pub fn assume_monomorphic(&self, callee: &MethodInfo, caller: MethodId) -> bool {
        callee.assume_monomorphic(caller)
    }

    /// Drain the callers whose monomorphism assumptions broke
    pub fn take_invalidations(&self) -> Vec<Invalidation> {
        self.invalidations.take()
    }

    /// Class by id
    pub fn class(&self, id: ClassId) -> Option<Arc<ClassInfo>> {
        self.graph.get(id)
    }

    /// Allocate an instance of a class (linking it first)
    pub fn new_object(&self, class: &Arc<ClassInfo>) -> Result<Object> {
        let vtable = self.link_class(class)?;
        if class.is_array() {
            return Err(Error::IncompatibleClassChange(format!(
                "{} is an array class (use new_array_object)",
                class.name.as_str()
            )));
        }
        if class.is_interface() || class.is_abstract() {
            return Err(Error::IncompatibleClassChange(format!(
                "cannot instantiate {} {}",
                if class.is_interface() { "interface" } else { "abstract class" },
                class.name.as_str()
            )));
        }
        Ok(Object::new(vtable, None))
    }

    /// Allocate an array (linking its class first)
    pub fn new_array_object(&self, class: &Arc<ClassInfo>, length: usize) -> Result<Object> {
        let vtable = self.link_class(class)?;
        if !class.is_array() {
            return Err(Error::IncompatibleClassChange(format!(
                "{} is not an array class",
                class.name.as_str()
            )));
        }
        Ok(Object::new(vtable, Some(length)))
    }
}

fn unqualified(name: &str) -> Result<UnqualifiedName> {
    UnqualifiedName::from_string(name.to_owned()).map_err(Error::ClassFormat)
}
