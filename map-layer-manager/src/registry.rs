//! Id-indexed declaration tables and active-custom bookkeeping.
//!
//! Layers reference sources by string id, and render requests reference
//! layers by string id. [`DeclarationTable`] turns those soft references into
//! explicit lookups: a miss is `None`, which callers treat as "skip".

use std::collections::{HashMap, HashSet};

use crate::declaration::{LayerDeclaration, SourceDeclaration};

/// Something registered under a string id.
pub trait Declared {
    /// The declaration's unique id.
    fn id(&self) -> &str;
}

impl Declared for SourceDeclaration {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Declared for LayerDeclaration {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Declarations in registration order, indexed by id.
///
/// Registering an id that is already present replaces the stored
/// declaration in place, so every id appears at most once.
#[derive(Debug, Clone)]
pub struct DeclarationTable<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Declared> DeclarationTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a declaration, replacing any existing one with the same id.
    ///
    /// Returns the replaced declaration, if any.
    pub fn upsert(&mut self, declaration: T) -> Option<T> {
        match self.index.get(declaration.id()) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position], declaration)),
            None => {
                self.index
                    .insert(declaration.id().to_string(), self.entries.len());
                self.entries.push(declaration);
                None
            }
        }
    }

    /// Remove the declaration with the given id.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let position = self.index.remove(id)?;
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Look up a declaration by id.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    /// Look up a declaration by id for modification.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&position) => Some(&mut self.entries[position]),
            None => None,
        }
    }

    /// Whether a declaration with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Iterate declarations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Declared> Default for DeclarationTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Declared> FromIterator<T> for DeclarationTable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        for declaration in iter {
            table.upsert(declaration);
        }
        table
    }
}

/// Ids of the sources and layers this component has materialized in the map.
#[derive(Debug, Clone, Default)]
pub struct ActiveCustom {
    layers: HashSet<String>,
    sources: HashSet<String>,
}

impl ActiveCustom {
    pub fn mark_layer(&mut self, id: &str) {
        self.layers.insert(id.to_string());
    }

    pub fn unmark_layer(&mut self, id: &str) {
        self.layers.remove(id);
    }

    pub fn mark_source(&mut self, id: &str) {
        self.sources.insert(id.to_string());
    }

    pub fn unmark_source(&mut self, id: &str) {
        self.sources.remove(id);
    }

    pub fn has_layer(&self, id: &str) -> bool {
        self.layers.contains(id)
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains(id)
    }

    /// Snapshot of the active layer ids, in no particular order.
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().cloned().collect()
    }

    /// Snapshot of the active source ids, in no particular order.
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().cloned().collect()
    }
}
