//! Card display titles.
//!
//! Titles are never stored. They are derived at read time from the entity a
//! card references, looked up through an injected [`EntityResolver`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::models::{Card, EntityRef};

/// Read-only view of an external entity, as far as title resolution needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolvedEntity {
    /// The entity's type tag, e.g. `App\Models\Task`.
    pub type_name: String,
    pub id: i64,
    /// Attribute values exposed by the entity.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// The entity's own string conversion, if it has one.
    #[serde(default)]
    pub display: Option<String>,
}

impl ResolvedEntity {
    pub fn new(type_name: impl Into<String>, id: i64) -> Self {
        Self {
            type_name: type_name.into(),
            id,
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Looks up the entity behind a card reference.
pub trait EntityResolver: Send + Sync {
    fn resolve(&self, entity: &EntityRef) -> Option<ResolvedEntity>;
}

/// In-memory entity lookup keyed by reference.
#[derive(Default)]
pub struct EntityRegistry {
    entities: RwLock<HashMap<EntityRef, ResolvedEntity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity: ResolvedEntity) {
        let key = EntityRef::new(entity.type_name.clone(), entity.id);
        match self.entities.write() {
            Ok(mut map) => {
                map.insert(key, entity);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key, entity);
            }
        }
    }

    pub fn remove(&self, entity: &EntityRef) -> Option<ResolvedEntity> {
        match self.entities.write() {
            Ok(mut map) => map.remove(entity),
            Err(poisoned) => poisoned.into_inner().remove(entity),
        }
    }
}

impl EntityResolver for EntityRegistry {
    fn resolve(&self, entity: &EntityRef) -> Option<ResolvedEntity> {
        match self.entities.read() {
            Ok(map) => map.get(entity).cloned(),
            Err(poisoned) => poisoned.into_inner().get(entity).cloned(),
        }
    }
}

/// Last path segment of a type tag: `App\Models\Task` and `app::Task` both
/// become `Task`.
pub fn short_type_name(type_name: &str) -> &str {
    type_name
        .rsplit(['\\', ':', '/', '.'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(type_name)
}

/// Compute a card's title.
///
/// The configured attribute wins when it holds a non-empty string; the value
/// is returned as-is, escaping is the entity layer's job. Then the entity's
/// string conversion, then `"<Type> #<id>"`. Without an entity the card's own
/// id is used.
pub fn resolve_title(card_id: i64, entity: Option<&ResolvedEntity>, title_attribute: &str) -> String {
    let Some(entity) = entity else {
        return format!("Card #{}", card_id);
    };

    if let Some(title) = entity
        .fields
        .get(title_attribute)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return title.to_string();
    }

    if let Some(display) = &entity.display {
        return display.clone();
    }

    format!("{} #{}", short_type_name(&entity.type_name), entity.id)
}

/// Resolver plus configured title attribute, shared by everything that
/// renders cards.
#[derive(Clone)]
pub struct TitleResolver {
    entities: Arc<dyn EntityResolver>,
    title_attribute: String,
}

impl TitleResolver {
    pub fn new(entities: Arc<dyn EntityResolver>, title_attribute: impl Into<String>) -> Self {
        Self {
            entities,
            title_attribute: title_attribute.into(),
        }
    }

    pub fn title_attribute(&self) -> &str {
        &self.title_attribute
    }

    pub fn title_for(&self, card: &Card) -> String {
        let entity = self.entities.resolve(&card.entity);
        resolve_title(card.id, entity.as_ref(), &self.title_attribute)
    }
}
