use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};

/// Admin-curated, ordered list of destinations ("Summer in Europe", ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub destination_ids: Vec<Uuid>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDraft {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub destination_ids: Vec<Uuid>,
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

impl Collection {
    pub fn create(draft: CollectionDraft) -> CoreResult<Self> {
        let slug = slugify(&draft.name);
        if slug.is_empty() {
            return Err(CoreError::validation("Collection name is required"));
        }
        let now = Utc::now();
        let mut collection = Self {
            id: Uuid::new_v4(),
            name: draft.name.trim().to_string(),
            slug,
            description: draft.description,
            destination_ids: Vec::new(),
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        collection.set_destinations(draft.destination_ids);
        Ok(collection)
    }

    /// Replace the ordered members, dropping duplicates but keeping first position.
    pub fn set_destinations(&mut self, ids: Vec<Uuid>) {
        let mut seen = std::collections::HashSet::new();
        self.destination_ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        self.updated_at = Utc::now();
    }

    pub fn set_published(&mut self, published: bool) {
        self.is_published = published;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer in Europe!"), "summer-in-europe");
        assert_eq!(slugify("  --Wild  & Free-- "), "wild-free");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_destinations_are_deduplicated_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Collection::create(CollectionDraft {
            name: "Islands".into(),
            description: None,
            destination_ids: vec![a, b, a],
        })
        .unwrap();
        assert_eq!(c.destination_ids, vec![a, b]);
        assert!(!c.is_published);
    }
}
