//! Lookup of static route/station metadata by entity id.

use std::collections::HashMap;

use crate::boarding::EntityMetadata;

/// Entity id → metadata, built once from a static dataset.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    entries: HashMap<String, EntityMetadata>,
}

impl MetadataIndex {
    /// Indexes `records` by entity id.
    ///
    /// Duplicate ids resolve to the last record supplied. Well-formed
    /// datasets carry one record per entity.
    pub fn build(records: impl IntoIterator<Item = EntityMetadata>) -> Self {
        let entries = records
            .into_iter()
            .map(|m| (m.entity_id.clone(), m))
            .collect();
        Self { entries }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityMetadata> {
        self.entries.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, name: &str) -> EntityMetadata {
        EntityMetadata {
            entity_id: id.to_string(),
            name: name.to_string(),
            latitude: 41.88,
            longitude: -87.63,
        }
    }

    #[test]
    fn test_build_and_lookup() {
        let index = MetadataIndex::build(vec![meta("1", "Bronzeville/Union Station"), meta("2", "Hyde Park Express")]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("2").unwrap().name, "Hyde Park Express");
        assert!(index.get("3").is_none());
    }

    #[test]
    fn test_duplicate_ids_last_write_wins() {
        let index = MetadataIndex::build(vec![meta("1", "Old Name"), meta("1", "New Name")]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("1").unwrap().name, "New Name");
    }

    #[test]
    fn test_empty_index() {
        let index = MetadataIndex::build(Vec::new());
        assert!(index.is_empty());
    }
}
