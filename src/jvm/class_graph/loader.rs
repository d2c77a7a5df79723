use super::{java_classes, ClassDefinition, LoaderId};
use crate::jvm::{BinaryName, Name};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of class definitions
///
/// The VM asks for a class by name on behalf of an initiating loader. The answer is the definition
/// along with the loader that actually defines it (which may be a parent the request got delegated
/// to), or `None` if no loader in the chain knows the class.
pub trait ClassLoader: Send + Sync {
    fn find_class(
        &self,
        loader: LoaderId,
        name: &BinaryName,
    ) -> Option<(LoaderId, ClassDefinition)>;
}

/// In-memory class loaders
///
/// Every loader other than the bootstrap loader has a parent. By default loaders delegate to
/// their parent first and only look at their own definitions if the parent finds nothing.
/// Child-first loaders do the opposite (which is how two loaders end up with different classes
/// under the same name).
pub struct ClassPath {
    loaders: RwLock<Vec<LoaderEntry>>,
}

struct LoaderEntry {
    parent: Option<LoaderId>,
    parent_first: bool,
    definitions: HashMap<String, ClassDefinition>,
}

impl ClassPath {
    /// Class path with only an (empty) bootstrap loader
    pub fn new() -> ClassPath {
        ClassPath {
            loaders: RwLock::new(vec![LoaderEntry {
                parent: None,
                parent_first: true,
                definitions: HashMap::new(),
            }]),
        }
    }

    /// Class path whose bootstrap loader has the core `java/lang` classes
    pub fn with_java_library() -> ClassPath {
        let class_path = ClassPath::new();
        for class in java_classes::java_library() {
            class_path.define(LoaderId::BOOTSTRAP, class);
        }
        class_path
    }

    fn add(&self, parent: LoaderId, parent_first: bool) -> LoaderId {
        let mut loaders = self.loaders.write();
        let id = LoaderId(loaders.len() as u32);
        loaders.push(LoaderEntry {
            parent: Some(parent),
            parent_first,
            definitions: HashMap::new(),
        });
        id
    }

    /// New loader delegating to `parent` before looking at its own classes
    pub fn add_loader(&self, parent: LoaderId) -> LoaderId {
        self.add(parent, true)
    }

    /// New loader that looks at its own classes before delegating to `parent`
    pub fn add_child_first_loader(&self, parent: LoaderId) -> LoaderId {
        self.add(parent, false)
    }

    /// Make a class available from a loader (replacing any previous definition by that name)
    ///
    /// Unknown loaders are ignored.
    pub fn define(&self, loader: LoaderId, class: ClassDefinition) {
        let mut loaders = self.loaders.write();
        match loaders.get_mut(loader.0 as usize) {
            Some(entry) => {
                entry.definitions.insert(class.name.clone(), class);
            }
            None => log::warn!(
                "Ignoring definition of {} for unknown loader {}",
                class.name,
                loader.0
            ),
        }
    }

    pub fn loader_count(&self) -> usize {
        self.loaders.read().len()
    }
}

impl Default for ClassPath {
    fn default() -> ClassPath {
        ClassPath::new()
    }
}

impl ClassLoader for ClassPath {
    fn find_class(
        &self,
        loader: LoaderId,
        name: &BinaryName,
    ) -> Option<(LoaderId, ClassDefinition)> {
        let loaders = self.loaders.read();
        let mut current = Some(loader);
        let mut child_first_misses = vec![];

        // Walk up to the root, then back down in delegation order
        let mut chain = vec![];
        while let Some(id) = current {
            let entry = loaders.get(id.0 as usize)?;
            if !entry.parent_first {
                if let Some(class) = entry.definitions.get(name.as_str()) {
                    return Some((id, class.clone()));
                }
                child_first_misses.push(id);
            }
            chain.push(id);
            current = entry.parent;
        }

        for id in chain.into_iter().rev() {
            if child_first_misses.contains(&id) {
                continue;
            }
            if let Some(class) = loaders[id.0 as usize].definitions.get(name.as_str()) {
                return Some((id, class.clone()));
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn name(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    #[test]
    fn parent_first_delegation() {
        let class_path = ClassPath::with_java_library();
        let app = class_path.add_loader(LoaderId::BOOTSTRAP);
        class_path.define(app, ClassDefinition::class("java/lang/Object"));
        class_path.define(app, ClassDefinition::class("me/alec/App"));

        let (definer, _) = class_path.find_class(app, &BinaryName::OBJECT).unwrap();
        assert_eq!(definer, LoaderId::BOOTSTRAP);
        let (definer, _) = class_path.find_class(app, &name("me/alec/App")).unwrap();
        assert_eq!(definer, app);
        assert!(class_path.find_class(LoaderId::BOOTSTRAP, &name("me/alec/App")).is_none());
    }

    #[test]
    fn child_first_delegation() {
        let class_path = ClassPath::with_java_library();
        let plugin = class_path.add_child_first_loader(LoaderId::BOOTSTRAP);
        class_path.define(plugin, ClassDefinition::class("java/lang/String"));

        let (definer, _) = class_path.find_class(plugin, &BinaryName::STRING).unwrap();
        assert_eq!(definer, plugin);
        let (definer, _) = class_path.find_class(plugin, &BinaryName::OBJECT).unwrap();
        assert_eq!(definer, LoaderId::BOOTSTRAP);
        assert!(class_path.find_class(LoaderId(7), &BinaryName::OBJECT).is_none());
    }
}
