//! The set of scene collections and which one is active.

use super::collection::SceneCollection;
use crate::error::{BuildError, EntityKind, RequestError, RequestResult};
use indexmap::IndexMap;

/// Owns every scene collection. Exactly one is active at a time.
#[derive(Debug)]
pub struct CollectionRegistry {
    collections: IndexMap<String, SceneCollection>,
    active: String,
    initial: String,
}

impl CollectionRegistry {
    /// The first collection becomes the active one.
    pub fn new(collections: Vec<SceneCollection>) -> Result<Self, BuildError> {
        let mut map = IndexMap::new();
        for c in collections {
            let name = c.name().to_string();
            if map.contains_key(&name) {
                return Err(BuildError::DuplicateName(name));
            }
            map.insert(name, c);
        }
        let Some(initial) = map.keys().next().cloned() else {
            return Err(BuildError::Empty("scene collections".to_string()));
        };
        Ok(Self {
            collections: map,
            active: initial.clone(),
            initial,
        })
    }

    pub fn active(&self) -> &SceneCollection {
        // `active` only ever holds a key present in the map.
        &self.collections[self.active.as_str()]
    }

    pub fn active_mut(&mut self) -> &mut SceneCollection {
        let active = self.active.as_str();
        &mut self.collections[active]
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// Make another collection active. Returns false if it already was.
    pub fn set_active(&mut self, name: &str) -> RequestResult<bool> {
        if !self.collections.contains_key(name) {
            return Err(RequestError::not_found(EntityKind::SceneCollection, name));
        }
        if self.active == name {
            return Ok(false);
        }
        self.active = name.to_string();
        Ok(true)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Reset every collection to its baseline and reactivate the first one.
    pub fn reset(&mut self) {
        for c in self.collections.values_mut() {
            c.reset();
        }
        self.active = self.initial.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin::builtin_catalog;
    use crate::model::fixtures::default_collections;

    fn registry() -> CollectionRegistry {
        let catalog = builtin_catalog().unwrap();
        CollectionRegistry::new(default_collections(&catalog).unwrap()).unwrap()
    }

    #[test]
    fn first_collection_is_active() {
        let r = registry();
        assert_eq!(r.active_name(), "Untitled");
        assert_eq!(r.names().collect::<Vec<_>>(), vec!["Untitled", "Podcast"]);
    }

    #[test]
    fn switching_and_reset() {
        let mut r = registry();
        assert!(r.set_active("Podcast").unwrap());
        assert!(!r.set_active("Podcast").unwrap());
        r.active_mut().set_current_scene("Guest").unwrap();

        r.reset();

        assert_eq!(r.active_name(), "Untitled");
        r.set_active("Podcast").unwrap();
        assert_eq!(r.active().current_scene(), "Wide");
    }

    #[test]
    fn unknown_collection_is_not_found() {
        let mut r = registry();
        assert!(matches!(
            r.set_active("Nope"),
            Err(RequestError::NotFound { kind: EntityKind::SceneCollection, .. })
        ));
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(CollectionRegistry::new(Vec::new()).is_err());
    }
}
