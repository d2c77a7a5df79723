use super::ClassId;
use crate::jvm::linker::VTable;
use std::sync::Arc;

/// Live subclass tree of every linked class, used to assign subtype numbers
///
/// Nodes live in an arena indexed by class id. Children of a node form an intrusive list through
/// `sub` (first child) and `nextsub` (next sibling). Interfaces are not part of the tree: they get
/// an interface index instead.
///
/// After every insertion the whole tree is renumbered with a depth-first pre-order walk, so that
/// class `A` is a superclass of `B` exactly when
/// `baseval(A) <= baseval(B) <= baseval(A) + diffval(A)`. Callers must hold exclusive access to
/// the hierarchy while inserting (that is the only point where every class's numbering changes).
#[derive(Default)]
pub struct ClassHierarchy {
    nodes: Vec<Option<Node>>,
    roots: Vec<ClassId>,
    interface_count: usize,
    class_count: usize,
}

struct Node {
    vtable: Arc<VTable>,
    sub: Option<ClassId>,
    nextsub: Option<ClassId>,
}

impl ClassHierarchy {
    pub fn new() -> ClassHierarchy {
        ClassHierarchy::default()
    }

    /// Hand out the next interface index
    pub fn assign_interface_index(&mut self) -> usize {
        let index = self.interface_count;
        self.interface_count += 1;
        index
    }

    /// Number of interface indices handed out so far
    pub fn interface_count(&self) -> usize {
        self.interface_count
    }

    /// Number of classes in the tree
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    fn node(&self, id: ClassId) -> Option<&Node> {
        self.nodes.get(id.index())?.as_ref()
    }

    fn node_mut(&mut self, id: ClassId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())?.as_mut()
    }

    pub fn contains(&self, id: ClassId) -> bool {
        self.node(id).is_some()
    }

    /// Add a freshly linked class under its superclass, then renumber the tree
    ///
    /// A class whose superclass is not in the tree becomes a new root.
    pub fn insert_class(&mut self, vtable: Arc<VTable>, superclass: Option<ClassId>) {
        let id = vtable.class;
        if self.contains(id) {
            return;
        }
        if self.nodes.len() <= id.index() {
            self.nodes.resize_with(id.index() + 1, || None);
        }

        let parent = superclass.filter(|parent| self.contains(*parent));
        let nextsub = match parent.and_then(|parent| self.node(parent)) {
            Some(parent_node) => parent_node.sub,
            None => None,
        };
        self.nodes[id.index()] = Some(Node {
            vtable,
            sub: None,
            nextsub,
        });
        match parent.and_then(|parent| self.node_mut(parent)) {
            Some(parent_node) => parent_node.sub = Some(id),
            None => self.roots.push(id),
        }
        self.class_count += 1;
        self.renumber();
    }

    /// Depth-first pre-order walk assigning `baseval` on entry and `diffval` on exit
    fn renumber(&mut self) {
        let mut classvalue: i32 = 0;
        let mut stack: Vec<(ClassId, bool)> = vec![];
        for root in self.roots.iter().rev() {
            stack.push((*root, false));
        }

        while let Some((id, exiting)) = stack.pop() {
            let node = match self.node(id) {
                Some(node) => node,
                None => continue,
            };
            if exiting {
                let baseval = node.vtable.baseval();
                node.vtable.set_numbering(baseval, classvalue - baseval);
            } else {
                classvalue += 1;
                node.vtable.set_numbering(classvalue, 0);
                stack.push((id, true));

                // Push children in reverse so they are visited in list order
                let children: Vec<ClassId> = self.subclasses(id).collect();
                for child in children.into_iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        log::trace!(
            "Renumbered {} classes ({} roots)",
            self.class_count,
            self.roots.len()
        );
    }

    /// Direct subclasses of a class
    pub fn subclasses(&self, id: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        let mut next = self.node(id).and_then(|node| node.sub);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.node(current).and_then(|node| node.nextsub);
            Some(current)
        })
    }

    /// Linked class in the tree
    pub fn vtable(&self, id: ClassId) -> Option<&Arc<VTable>> {
        self.node(id).map(|node| &node.vtable)
    }
}
