//! Registry of known source types.

use super::types::SourceType;
use crate::error::{BuildError, EntityKind, RequestError, RequestResult};
use indexmap::IndexMap;
use serde_json::Value;

/// Central registry of source types.
///
/// Types are kept in registration order so `GetSourceTypesList` is stable.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    types: IndexMap<String, SourceType>,
}

impl SourceCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a type. Fails if the type id is already present.
    pub fn register(&mut self, source_type: SourceType) -> Result<(), BuildError> {
        if self.types.contains_key(&source_type.type_id) {
            return Err(BuildError::DuplicateType(source_type.type_id));
        }
        self.types.insert(source_type.type_id.clone(), source_type);
        Ok(())
    }

    /// Look up a type by id.
    pub fn lookup(&self, type_id: &str) -> RequestResult<&SourceType> {
        self.types
            .get(type_id)
            .ok_or_else(|| RequestError::not_found(EntityKind::SourceType, type_id))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    /// Whether sources of this type carry audio. Unknown types don't.
    pub fn has_audio(&self, type_id: &str) -> bool {
        self.types
            .get(type_id)
            .map(|t| t.caps.has_audio)
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Full catalog in wire form.
    pub fn to_wire(&self) -> Vec<Value> {
        self.iter().map(SourceType::to_wire).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::{Capabilities, TypeKind};

    fn color() -> SourceType {
        SourceType::new("color_source", "Color", TypeKind::Input, Capabilities::video())
    }

    #[test]
    fn register_and_lookup() {
        let mut catalog = SourceCatalog::new();
        catalog.register(color()).unwrap();
        assert_eq!(catalog.lookup("color_source").unwrap().display_name, "Color");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut catalog = SourceCatalog::new();
        catalog.register(color()).unwrap();
        assert_eq!(
            catalog.register(color()),
            Err(BuildError::DuplicateType("color_source".into()))
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn unknown_type_is_not_found() {
        let catalog = SourceCatalog::new();
        assert!(matches!(
            catalog.lookup("nope"),
            Err(RequestError::NotFound { kind: EntityKind::SourceType, .. })
        ));
        assert!(!catalog.has_audio("nope"));
    }
}
