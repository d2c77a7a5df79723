use super::{ClassId, LoaderId};
use crate::jvm::{ClassName, Error, Name, Result};
use std::collections::{HashMap, HashSet};

/// Loading constraints
///
/// A constraint says that two loaders must resolve a class name to the same class. Constraints
/// are transitive, so for every name we keep groups of loaders that must agree, along with the
/// class the group is bound to once any of its loaders has loaded the name.
#[derive(Default)]
pub struct LoadingConstraints {
    groups: HashMap<ClassName, Vec<ConstraintGroup>>,
}

#[derive(Debug)]
struct ConstraintGroup {
    loaders: HashSet<LoaderId>,
    class: Option<ClassId>,
}

impl LoadingConstraints {
    pub fn new() -> LoadingConstraints {
        LoadingConstraints::default()
    }

    fn group_of(&self, name: &ClassName, loader: LoaderId) -> Option<&ConstraintGroup> {
        self.groups
            .get(name)?
            .iter()
            .find(|group| group.loaders.contains(&loader))
    }

    /// Check that recording `class` as the meaning of `name` for `loader` violates nothing, and
    /// bind the loader's constraint group to it
    pub fn check_store(
        &mut self,
        loader: LoaderId,
        name: &ClassName,
        class: ClassId,
    ) -> Result<()> {
        let group = match self.groups.get_mut(name).and_then(|groups| {
            groups
                .iter_mut()
                .find(|group| group.loaders.contains(&loader))
        }) {
            None => return Ok(()),
            Some(group) => group,
        };
        match group.class {
            Some(bound) if bound != class => {
                log::warn!(
                    "Loading constraint violated when loader {} loads '{}'",
                    loader.0,
                    name.as_str()
                );
                Err(Error::Linkage(format!(
                    "loading constraint violated: loader {} attempted to load a class named '{}' \
                     that differs from the one other loaders are constrained to",
                    loader.0,
                    name.as_str()
                )))
            }
            _ => {
                group.class = Some(class);
                Ok(())
            }
        }
    }

    /// Add the constraint that `a` and `b` resolve `name` to the same class
    ///
    /// `loaded_a` and `loaded_b` are what the loaders have already recorded for the name.
    pub fn add(
        &mut self,
        a: LoaderId,
        b: LoaderId,
        name: &ClassName,
        loaded_a: Option<ClassId>,
        loaded_b: Option<ClassId>,
    ) -> Result<()> {
        if a == b {
            return Ok(());
        }

        // Every class the merged group would be bound to must be the same one
        let mut bound: Option<ClassId> = None;
        let candidates = [
            loaded_a,
            loaded_b,
            self.group_of(name, a).and_then(|group| group.class),
            self.group_of(name, b).and_then(|group| group.class),
        ];
        for candidate in candidates.into_iter().flatten() {
            match bound {
                Some(existing) if existing != candidate => {
                    log::warn!(
                        "Loading constraint violated between loaders {} and {} for '{}'",
                        a.0,
                        b.0,
                        name.as_str()
                    );
                    return Err(Error::Linkage(format!(
                        "loading constraint violated: loaders {} and {} have different classes \
                         named '{}'",
                        a.0,
                        b.0,
                        name.as_str()
                    )));
                }
                _ => bound = Some(candidate),
            }
        }

        let groups = self.groups.entry(name.clone()).or_default();
        let mut merged = ConstraintGroup {
            loaders: HashSet::from([a, b]),
            class: bound,
        };
        let mut idx = 0;
        while idx < groups.len() {
            if groups[idx].loaders.contains(&a) || groups[idx].loaders.contains(&b) {
                let group = groups.swap_remove(idx);
                merged.loaders.extend(group.loaders);
            } else {
                idx += 1;
            }
        }
        log::trace!(
            "Loading constraint on '{}' now spans {} loaders",
            name.as_str(),
            merged.loaders.len()
        );
        groups.push(merged);
        Ok(())
    }

    /// Number of distinct constraint groups
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
