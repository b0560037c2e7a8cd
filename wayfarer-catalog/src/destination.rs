use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};

/// Indicative nightly price per guest, in minor currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    pub fn new(min: i64, max: i64) -> CoreResult<Self> {
        if min < 0 {
            return Err(CoreError::validation("Price range minimum cannot be negative"));
        }
        if max < min {
            return Err(CoreError::validation("Price range maximum is below minimum"));
        }
        Ok(Self { min, max })
    }

    /// True when the range intersects `[lower, upper]`; open bounds are `None`.
    pub fn overlaps(&self, lower: Option<i64>, upper: Option<i64>) -> bool {
        lower.map_or(true, |l| self.max >= l) && upper.map_or(true, |u| self.min <= u)
    }
}

/// A travel destination in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub city: Option<String>,
    pub category: String,
    pub tags: BTreeSet<String>,
    pub price_range: PriceRange,
    pub currency: String,
    pub rating: f64,
    pub review_count: u32,
    pub images: Vec<String>,
    pub description: Option<String>,
    pub featured: bool,
    pub pinned: bool,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin input for a new destination
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationDraft {
    pub name: String,
    pub country: String,
    pub city: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price_min: i64,
    pub price_max: i64,
    pub currency: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub display_order: i32,
}

/// Partial admin edit; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationUpdate {
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub images: Option<Vec<String>>,
    pub description: Option<String>,
    pub featured: Option<bool>,
    pub pinned: Option<bool>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

fn normalize_tags<I: IntoIterator<Item = String>>(tags: I) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn required(field: &str, value: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl Destination {
    pub fn create(draft: DestinationDraft) -> CoreResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: required("name", &draft.name)?,
            country: required("country", &draft.country)?,
            city: draft.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            category: required("category", &draft.category)?.to_uppercase(),
            tags: normalize_tags(draft.tags),
            price_range: PriceRange::new(draft.price_min, draft.price_max)?,
            currency: draft.currency.unwrap_or_else(|| "EUR".to_string()).to_uppercase(),
            rating: 0.0,
            review_count: 0,
            images: draft.images,
            description: draft.description,
            featured: draft.featured,
            pinned: draft.pinned,
            display_order: draft.display_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, update: DestinationUpdate) -> CoreResult<()> {
        if let Some(name) = update.name {
            self.name = required("name", &name)?;
        }
        if let Some(country) = update.country {
            self.country = required("country", &country)?;
        }
        if let Some(city) = update.city {
            self.city = Some(city.trim().to_string()).filter(|c| !c.is_empty());
        }
        if let Some(category) = update.category {
            self.category = required("category", &category)?.to_uppercase();
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if update.price_min.is_some() || update.price_max.is_some() {
            self.price_range = PriceRange::new(
                update.price_min.unwrap_or(self.price_range.min),
                update.price_max.unwrap_or(self.price_range.max),
            )?;
        }
        if let Some(images) = update.images {
            self.images = images;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(featured) = update.featured {
            self.featured = featured;
        }
        if let Some(pinned) = update.pinned {
            self.pinned = pinned;
        }
        if let Some(order) = update.display_order {
            self.display_order = order;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag.trim().to_lowercase())
    }

    /// Store the aggregate of all reviews for this destination.
    pub fn set_rating_summary(&mut self, average: f64, count: u32) {
        self.rating = if count == 0 { 0.0 } else { (average * 100.0).round() / 100.0 };
        self.review_count = count;
        self.updated_at = Utc::now();
    }
}
