use async_trait::async_trait;
use uuid::Uuid;
use wayfarer_core::CoreResult;
use wayfarer_shared::{Page, PageRequest};

use crate::collection::Collection;
use crate::destination::Destination;
use crate::review::DestinationReview;
use crate::search::DestinationQuery;
use crate::wishlist::WishlistItem;

/// Repository trait for destination data access
#[async_trait]
pub trait DestinationRepository: Send + Sync {
    async fn insert(&self, destination: &Destination) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Destination>>;

    async fn update(&self, destination: &Destination) -> CoreResult<()>;

    async fn search(&self, query: &DestinationQuery, page: PageRequest) -> CoreResult<Page<Destination>>;

    async fn get_many(&self, ids: &[Uuid]) -> CoreResult<Vec<Destination>>;
}

/// Repository trait for curated collections
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Fails with `Conflict` when the slug is taken.
    async fn insert(&self, collection: &Collection) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Collection>>;

    async fn update(&self, collection: &Collection) -> CoreResult<()>;

    async fn delete(&self, id: Uuid) -> CoreResult<bool>;

    async fn list(&self, published_only: bool) -> CoreResult<Vec<Collection>>;
}

/// Repository trait for destination reviews
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fails with `Conflict` when the user already reviewed the destination.
    async fn insert(&self, review: &DestinationReview) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<DestinationReview>>;

    async fn update(&self, review: &DestinationReview) -> CoreResult<()>;

    async fn delete(&self, id: Uuid) -> CoreResult<bool>;

    /// Newest first.
    async fn list_for_destination(
        &self,
        destination_id: Uuid,
        page: PageRequest,
    ) -> CoreResult<Page<DestinationReview>>;

    /// Mean rating and review count.
    async fn summary(&self, destination_id: Uuid) -> CoreResult<(f64, u32)>;
}

/// Repository trait for wishlists
#[async_trait]
pub trait WishlistRepository: Send + Sync {
    /// Fails with `Conflict` when the destination is already saved.
    async fn insert(&self, item: &WishlistItem) -> CoreResult<()>;

    async fn remove(&self, user_id: Uuid, destination_id: Uuid) -> CoreResult<bool>;

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<WishlistItem>>;
}
