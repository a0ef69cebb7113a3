//! Graph-style entity store contract and the in-memory implementation.

use crate::error::StoreError;
use async_trait::async_trait;
use loreweaver_types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// One stored game entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique entity id.
    pub id: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Canonical name.
    pub name: String,
    /// Arbitrary properties.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// A typed relationship between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Source entity id.
    pub from: String,
    /// Target entity id.
    pub to: String,
    /// Relationship label ("knows", "carries", ...).
    pub label: String,
}

/// Parameterised match filter. Every field is a parameter — filters
/// are data, never query-string fragments.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    /// Restrict to one kind.
    pub kind: Option<EntityKind>,
    /// Case-insensitive exact name match.
    pub name: Option<String>,
    /// Property equality constraints.
    pub properties: HashMap<String, serde_json::Value>,
}

/// Graph-style entity storage.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert or replace an entity.
    async fn create_entity(&self, entity: EntityRecord) -> Result<(), StoreError>;

    /// Merge the given properties into an existing entity.
    async fn update_entity(
        &self,
        id: &str,
        properties: HashMap<String, serde_json::Value>,
    ) -> Result<(), StoreError>;

    /// Delete an entity and its relationships.
    async fn delete_entity(&self, id: &str) -> Result<(), StoreError>;

    /// Create a relationship between two existing entities.
    async fn create_relationship(&self, relationship: Relationship) -> Result<(), StoreError>;

    /// Fetch one entity by id.
    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>, StoreError>;

    /// Find entities matching a filter, with pagination.
    async fn find_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EntityRecord>, StoreError>;
}

/// In-memory entity store for development and tests.
#[derive(Default)]
pub struct MemoryEntityStore {
    entities: RwLock<HashMap<String, EntityRecord>>,
    relationships: RwLock<Vec<Relationship>>,
}

impl MemoryEntityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn create_entity(&self, entity: EntityRecord) -> Result<(), StoreError> {
        self.entities
            .write()
            .expect("entities poisoned")
            .insert(entity.id.clone(), entity);
        Ok(())
    }

    async fn update_entity(
        &self,
        id: &str,
        properties: HashMap<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let mut entities = self.entities.write().expect("entities poisoned");
        let entity = entities
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("entity", id))?;
        entity.properties.extend(properties);
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<(), StoreError> {
        let removed = self
            .entities
            .write()
            .expect("entities poisoned")
            .remove(id)
            .is_some();
        if !removed {
            return Err(StoreError::not_found("entity", id));
        }
        self.relationships
            .write()
            .expect("relationships poisoned")
            .retain(|r| r.from != id && r.to != id);
        Ok(())
    }

    async fn create_relationship(&self, relationship: Relationship) -> Result<(), StoreError> {
        let entities = self.entities.read().expect("entities poisoned");
        for endpoint in [&relationship.from, &relationship.to] {
            if !entities.contains_key(endpoint) {
                return Err(StoreError::not_found("entity", endpoint.clone()));
            }
        }
        drop(entities);
        self.relationships
            .write()
            .expect("relationships poisoned")
            .push(relationship);
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self
            .entities
            .read()
            .expect("entities poisoned")
            .get(id)
            .cloned())
    }

    async fn find_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let entities = self.entities.read().expect("entities poisoned");
        let mut matches: Vec<EntityRecord> = entities
            .values()
            .filter(|e| filter.kind.is_none_or(|k| e.kind == k))
            .filter(|e| {
                filter
                    .name
                    .as_ref()
                    .is_none_or(|n| e.name.eq_ignore_ascii_case(n))
            })
            .filter(|e| {
                filter
                    .properties
                    .iter()
                    .all(|(key, value)| e.properties.get(key) == Some(value))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn npc(id: &str, name: &str) -> EntityRecord {
        EntityRecord {
            id: id.into(),
            kind: EntityKind::Npc,
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn find_matches_kind_and_name_case_insensitively() {
        let store = MemoryEntityStore::new();
        store.create_entity(npc("elara", "Elara")).await.unwrap();
        store
            .create_entity(EntityRecord {
                id: "fireball".into(),
                kind: EntityKind::Spell,
                name: "Fireball".into(),
                properties: HashMap::new(),
            })
            .await
            .unwrap();

        let filter = EntityFilter {
            kind: Some(EntityKind::Npc),
            name: Some("elara".into()),
            properties: HashMap::new(),
        };
        let found = store.find_entities(&filter, 10, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "elara");
    }

    #[tokio::test]
    async fn relationships_require_both_endpoints() {
        let store = MemoryEntityStore::new();
        store.create_entity(npc("elara", "Elara")).await.unwrap();

        let err = store
            .create_relationship(Relationship {
                from: "elara".into(),
                to: "ghost".into(),
                label: "knows".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_dangling_relationships() {
        let store = MemoryEntityStore::new();
        store.create_entity(npc("a", "A")).await.unwrap();
        store.create_entity(npc("b", "B")).await.unwrap();
        store
            .create_relationship(Relationship {
                from: "a".into(),
                to: "b".into(),
                label: "knows".into(),
            })
            .await
            .unwrap();

        store.delete_entity("b").await.unwrap();
        assert!(store.relationships.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn property_filters_and_pagination_compose() {
        let store = MemoryEntityStore::new();
        for i in 0..5 {
            let mut properties = HashMap::new();
            properties.insert("hostile".to_string(), json!(i % 2 == 0));
            store
                .create_entity(EntityRecord {
                    id: format!("npc-{i}"),
                    kind: EntityKind::Npc,
                    name: format!("NPC {i}"),
                    properties,
                })
                .await
                .unwrap();
        }

        let mut filter = EntityFilter::default();
        filter.properties.insert("hostile".into(), json!(true));
        let page = store.find_entities(&filter, 2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "npc-2");
    }
}
