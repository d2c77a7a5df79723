use crate::jvm::{ClassName, Error, Name, Result};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;

mod assignable;
mod class_info;
mod constraints;
mod definition;
mod hierarchy;
mod java_classes;
mod loader;

pub(crate) use assignable::is_assignable;
pub use class_info::*;
pub use constraints::*;
pub use definition::*;
pub use hierarchy::*;
pub use java_classes::*;
pub use loader::*;

/// Every class the VM knows about, and who has loaded what
///
/// Classes are kept in an arena addressed by `ClassId` and are never removed. The registry maps
/// (initiating loader, class name) pairs to classes and enforces that each pair resolves to a
/// single class, consistent with all loading constraints.
///
/// The class hierarchy lock is the one global exclusivity point: linking a class takes it for
/// writing to renumber every class, while type checks take it for reading.
pub struct ClassGraph {
    classes: RwLock<Vec<Arc<ClassInfo>>>,
    registry: Mutex<Registry>,
    hierarchy: RwLock<ClassHierarchy>,
}

#[derive(Default)]
struct Registry {
    loaded: HashMap<(LoaderId, ClassName), ClassId>,
    constraints: LoadingConstraints,
}

impl ClassGraph {
    /// New empty graph
    pub fn new() -> Self {
        ClassGraph {
            classes: RwLock::new(vec![]),
            registry: Mutex::new(Registry::default()),
            hierarchy: RwLock::new(ClassHierarchy::new()),
        }
    }

    pub fn get(&self, id: ClassId) -> Option<Arc<ClassInfo>> {
        self.classes.read().get(id.index()).cloned()
    }

    /// Number of classes ever created (including ones that lost a definition race)
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classes that some loader has recorded, in creation order
    pub fn loaded_classes(&self) -> Vec<Arc<ClassInfo>> {
        let mut ids: Vec<ClassId> = self.registry.lock().loaded.values().copied().collect();
        ids.sort();
        ids.dedup();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Class recorded for a name by an (initiating or defining) loader
    pub fn lookup(&self, loader: LoaderId, name: &ClassName) -> Option<Arc<ClassInfo>> {
        let id = *self.registry.lock().loaded.get(&(loader, name.clone()))?;
        self.get(id)
    }

    /// Allocate an id and add the class built for it
    ///
    /// The class is not visible through `lookup` until it is stored for some loader.
    pub(crate) fn insert_with(
        &self,
        build: impl FnOnce(ClassId) -> Result<ClassInfo>,
    ) -> Result<Arc<ClassInfo>> {
        let mut classes = self.classes.write();
        let id = ClassId(classes.len() as u32);
        let class = Arc::new(build(id)?);
        classes.push(class.clone());
        Ok(class)
    }

    /// Record that `loader` resolves the class's name to the class
    ///
    /// If the loader already has a class by that name, `unique` decides between failing with a
    /// duplicate definition error and returning the existing class (which happens when several
    /// threads race to load the same class).
    pub fn store(
        &self,
        loader: LoaderId,
        class: &Arc<ClassInfo>,
        unique: bool,
    ) -> Result<Arc<ClassInfo>> {
        let existing = {
            let mut registry = self.registry.lock();
            let key = (loader, class.name.clone());
            match registry.loaded.get(&key) {
                Some(existing) => *existing,
                None => {
                    if !class.is_array() {
                        registry
                            .constraints
                            .check_store(loader, &class.name, class.id)?;
                    }
                    registry.loaded.insert(key, class.id);
                    log::debug!(
                        "Loader {} recorded class {} (defined by loader {})",
                        loader.0,
                        class.name.as_str(),
                        class.loader.0
                    );
                    return Ok(class.clone());
                }
            }
        };

        if existing == class.id {
            Ok(class.clone())
        } else if unique {
            Err(Error::Linkage(format!(
                "loader {} attempted duplicate class definition for {}",
                loader.0,
                class.name.as_str()
            )))
        } else {
            self.get(existing).ok_or_else(|| {
                Error::NoClassDefFound(format!("{} vanished", class.name.as_str()))
            })
        }
    }

    /// Require loaders `a` and `b` to agree on what `name` means
    pub fn add_constraint(&self, a: LoaderId, b: LoaderId, name: &ClassName) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let mut registry = self.registry.lock();
        let loaded_a = registry.loaded.get(&(a, name.clone())).copied();
        let loaded_b = registry.loaded.get(&(b, name.clone())).copied();
        registry
            .constraints
            .add(a, b, name, loaded_a, loaded_b)
    }

    /// Number of loading constraint groups
    pub fn constraint_count(&self) -> usize {
        self.registry.lock().constraints.len()
    }

    /// Shared access to the class hierarchy (keeps the subtype numbering stable)
    pub fn hierarchy(&self) -> RwLockReadGuard<'_, ClassHierarchy> {
        self.hierarchy.read()
    }

    /// Exclusive access to the class hierarchy
    ///
    /// While this is held, no type check can run anywhere.
    pub(crate) fn hierarchy_mut(&self) -> RwLockWriteGuard<'_, ClassHierarchy> {
        self.hierarchy.write()
    }

    /// Superclass of a class, if it has been resolved already
    pub fn superclass_of(&self, class: &ClassInfo) -> Option<Arc<ClassInfo>> {
        if let Some(linked) = class.linked() {
            return linked.superclass.clone();
        }
        let id = class.refs.get(class.superclass?)?.resolved()?;
        self.get(id)
    }

    /// Walk the (resolved) superclass chain looking for `superclass`
    ///
    /// Unlike the numbering-based checks, this also works on classes that are not linked yet.
    pub fn is_subclass_of(&self, class: &ClassInfo, superclass: &ClassInfo) -> bool {
        if class.id == superclass.id {
            return true;
        }
        let mut next = self.superclass_of(class);
        while let Some(current) = next {
            if current.id == superclass.id {
                return true;
            }
            next = self.superclass_of(&current);
        }
        false
    }
}

impl Default for ClassGraph {
    fn default() -> Self {
        ClassGraph::new()
    }
}
