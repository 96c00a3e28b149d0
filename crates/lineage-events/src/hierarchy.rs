//! Class hierarchy table
//!
//! Assigns a dense [`ClassId`] to every qualifying class and precomputes each
//! class's ancestor chain, so dispatch never walks names at runtime. Built
//! once from the superclass links produced by discovery.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while building a hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Superclass links form a loop
    #[error("Superclass cycle involving {0}")]
    Cycle(String),

    /// A class whose chain ends at a class that is neither linked nor the root
    #[error("Class {class} does not descend from the root: no link for {missing}")]
    Detached {
        /// Class being resolved
        class: String,
        /// First unresolvable name on its chain
        missing: String,
    },
}

/// Dense handle for a class in a [`ClassHierarchy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    /// Raw index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Immutable class table rooted at one class
#[derive(Debug, Clone)]
pub struct ClassHierarchy {
    names: Vec<String>,
    name_to_id: FxHashMap<String, ClassId>,
    parents: Vec<Option<ClassId>>,
    /// Root-first ancestor chain of each class, ending with the class itself
    ancestors: Vec<Vec<ClassId>>,
}

impl ClassHierarchy {
    /// A hierarchy containing only `root`
    pub fn new(root: &str) -> Self {
        let mut hierarchy = Self {
            names: Vec::new(),
            name_to_id: FxHashMap::default(),
            parents: Vec::new(),
            ancestors: Vec::new(),
        };
        hierarchy.insert(root, None);
        hierarchy
    }

    /// Build from `class -> superclass` links
    ///
    /// Every linked class must reach `root` through the links.
    pub fn from_links<I, K, V>(root: &str, links: I) -> Result<Self, HierarchyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let links: BTreeMap<String, String> = links
            .into_iter()
            .map(|(class, superclass)| (class.into(), superclass.into()))
            .collect();
        let mut hierarchy = Self::new(root);

        for class in links.keys() {
            if hierarchy.name_to_id.contains_key(class) {
                continue;
            }

            // Walk up until a class that already has an id
            let mut path: Vec<&str> = Vec::new();
            let mut current = class.as_str();
            let mut parent = loop {
                if let Some(&id) = hierarchy.name_to_id.get(current) {
                    break id;
                }
                if path.contains(&current) {
                    return Err(HierarchyError::Cycle(current.to_string()));
                }
                path.push(current);
                match links.get(current) {
                    Some(superclass) => current = superclass,
                    None => {
                        return Err(HierarchyError::Detached {
                            class: class.clone(),
                            missing: current.to_string(),
                        })
                    }
                }
            };

            for name in path.into_iter().rev() {
                parent = hierarchy.insert(name, Some(parent));
            }
        }

        tracing::debug!(classes = hierarchy.len(), root, "built class hierarchy");
        Ok(hierarchy)
    }

    fn insert(&mut self, name: &str, parent: Option<ClassId>) -> ClassId {
        let id = ClassId(self.names.len() as u32);
        let mut chain = parent
            .map(|p| self.ancestors[p.index()].clone())
            .unwrap_or_default();
        chain.push(id);

        self.names.push(name.to_string());
        self.name_to_id.insert(name.to_string(), id);
        self.parents.push(parent);
        self.ancestors.push(chain);
        id
    }

    /// The root class
    pub fn root(&self) -> ClassId {
        ClassId(0)
    }

    /// Look up a class by internal name
    pub fn id(&self, name: &str) -> Option<ClassId> {
        self.name_to_id.get(name).copied()
    }

    /// Internal name of a class
    pub fn name(&self, id: ClassId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// Direct superclass
    pub fn parent(&self, id: ClassId) -> Option<ClassId> {
        self.parents.get(id.index()).copied().flatten()
    }

    /// Ancestors of `id`, root first, ending with `id` itself
    ///
    /// Empty for a handle that does not belong to this hierarchy.
    pub fn ancestors(&self, id: ClassId) -> &[ClassId] {
        self.ancestors
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `id` is `ancestor` or descends from it
    pub fn is_subclass_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Number of classes, including the root
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: the root is always present
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over all classes with their ids
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (ClassId(i as u32), name.as_str()))
    }
}
