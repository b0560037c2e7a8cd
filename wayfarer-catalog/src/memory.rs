use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::collection::Collection;
use crate::destination::Destination;
use crate::repository::{CollectionRepository, DestinationRepository, ReviewRepository, WishlistRepository};
use crate::review::DestinationReview;
use crate::search::DestinationQuery;
use crate::wishlist::WishlistItem;

#[derive(Default)]
struct CatalogTables {
    destinations: HashMap<Uuid, Destination>,
    collections: HashMap<Uuid, Collection>,
    reviews: HashMap<Uuid, DestinationReview>,
    wishlist: HashMap<Uuid, WishlistItem>,
}

/// In-memory catalog store. Every write takes the single write lock, so the
/// (user, destination) uniqueness checks are atomic with the insert.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    tables: RwLock<CatalogTables>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DestinationRepository for InMemoryCatalogStore {
    async fn insert(&self, destination: &Destination) -> CoreResult<()> {
        self.tables.write().await.destinations.insert(destination.id, destination.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Destination>> {
        Ok(self.tables.read().await.destinations.get(&id).cloned())
    }

    async fn update(&self, destination: &Destination) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.destinations.get_mut(&destination.id) {
            Some(existing) => {
                *existing = destination.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("Destination", destination.id)),
        }
    }

    async fn search(&self, query: &DestinationQuery, page: PageRequest) -> CoreResult<Page<Destination>> {
        let tables = self.tables.read().await;
        Ok(page.apply(query.run(tables.destinations.values())))
    }

    async fn get_many(&self, ids: &[Uuid]) -> CoreResult<Vec<Destination>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.destinations.get(id).cloned()).collect())
    }
}

#[async_trait]
impl CollectionRepository for InMemoryCatalogStore {
    async fn insert(&self, collection: &Collection) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.collections.values().any(|c| c.slug == collection.slug) {
            return Err(CoreError::conflict(format!("Collection slug '{}' already exists", collection.slug)));
        }
        tables.collections.insert(collection.id, collection.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Collection>> {
        Ok(self.tables.read().await.collections.get(&id).cloned())
    }

    async fn update(&self, collection: &Collection) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.collections.get_mut(&collection.id) {
            Some(existing) => {
                *existing = collection.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("Collection", collection.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.tables.write().await.collections.remove(&id).is_some())
    }

    async fn list(&self, published_only: bool) -> CoreResult<Vec<Collection>> {
        let tables = self.tables.read().await;
        let mut collections: Vec<Collection> = tables
            .collections
            .values()
            .filter(|c| !published_only || c.is_published)
            .cloned()
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }
}

#[async_trait]
impl ReviewRepository for InMemoryCatalogStore {
    async fn insert(&self, review: &DestinationReview) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.destination_id == review.destination_id);
        if duplicate {
            return Err(CoreError::conflict("You have already reviewed this destination"));
        }
        tables.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<DestinationReview>> {
        Ok(self.tables.read().await.reviews.get(&id).cloned())
    }

    async fn update(&self, review: &DestinationReview) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.reviews.get_mut(&review.id) {
            Some(existing) => {
                *existing = review.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("Review", review.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.tables.write().await.reviews.remove(&id).is_some())
    }

    async fn list_for_destination(
        &self,
        destination_id: Uuid,
        page: PageRequest,
    ) -> CoreResult<Page<DestinationReview>> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<DestinationReview> = tables
            .reviews
            .values()
            .filter(|r| r.destination_id == destination_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.apply(reviews))
    }

    async fn summary(&self, destination_id: Uuid) -> CoreResult<(f64, u32)> {
        let tables = self.tables.read().await;
        let ratings: Vec<f64> = tables
            .reviews
            .values()
            .filter(|r| r.destination_id == destination_id)
            .map(|r| r.rating.value() as f64)
            .collect();
        if ratings.is_empty() {
            return Ok((0.0, 0));
        }
        Ok((ratings.iter().sum::<f64>() / ratings.len() as f64, ratings.len() as u32))
    }
}

#[async_trait]
impl WishlistRepository for InMemoryCatalogStore {
    async fn insert(&self, item: &WishlistItem) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .wishlist
            .values()
            .any(|w| w.user_id == item.user_id && w.destination_id == item.destination_id);
        if duplicate {
            return Err(CoreError::conflict("Destination is already in your wishlist"));
        }
        tables.wishlist.insert(item.id, item.clone());
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, destination_id: Uuid) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        let key = tables
            .wishlist
            .values()
            .find(|w| w.user_id == user_id && w.destination_id == destination_id)
            .map(|w| w.id);
        Ok(match key {
            Some(id) => tables.wishlist.remove(&id).is_some(),
            None => false,
        })
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<WishlistItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<WishlistItem> = tables
            .wishlist
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}
