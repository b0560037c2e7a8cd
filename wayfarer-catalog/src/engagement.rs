use std::sync::Arc;

use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::destination::Destination;
use crate::repository::{DestinationRepository, ReviewRepository, WishlistRepository};
use crate::review::DestinationReview;
use crate::wishlist::WishlistItem;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReviewInput {
    pub rating: i64,
    pub title: Option<String>,
    pub comment: Option<String>,
}

/// Reviews keep the destination's aggregate rating in step.
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    destinations: Arc<dyn DestinationRepository>,
}

impl ReviewService {
    pub fn new(reviews: Arc<dyn ReviewRepository>, destinations: Arc<dyn DestinationRepository>) -> Self {
        Self { reviews, destinations }
    }

    pub async fn list(&self, destination_id: Uuid, page: PageRequest) -> CoreResult<Page<DestinationReview>> {
        self.reviews.list_for_destination(destination_id, page).await
    }

    pub async fn create(&self, user_id: Uuid, destination_id: Uuid, input: ReviewInput) -> CoreResult<DestinationReview> {
        self.active_destination(destination_id).await?;
        let review = DestinationReview::new(user_id, destination_id, input.rating, input.title, input.comment)?;
        self.reviews.insert(&review).await?;
        self.refresh_rating(destination_id).await?;
        tracing::info!(review_id = %review.id, %destination_id, "Review created");
        Ok(review)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        destination_id: Uuid,
        review_id: Uuid,
        input: ReviewInput,
    ) -> CoreResult<DestinationReview> {
        let mut review = self.owned(user_id, destination_id, review_id).await?;
        review.set_rating(input.rating)?;
        review.edit(input.title, input.comment);
        self.reviews.update(&review).await?;
        self.refresh_rating(destination_id).await?;
        Ok(review)
    }

    /// Owners delete their own review; admins pass `as_admin` to moderate.
    pub async fn delete(&self, user_id: Uuid, destination_id: Uuid, review_id: Uuid, as_admin: bool) -> CoreResult<()> {
        let review = self
            .reviews
            .get(review_id)
            .await?
            .filter(|r| r.destination_id == destination_id)
            .ok_or_else(|| CoreError::not_found("Review", review_id))?;
        if review.user_id != user_id && !as_admin {
            return Err(CoreError::forbidden("Only the author can delete this review"));
        }
        self.reviews.delete(review_id).await?;
        self.refresh_rating(destination_id).await
    }

    async fn owned(&self, user_id: Uuid, destination_id: Uuid, review_id: Uuid) -> CoreResult<DestinationReview> {
        let review = self
            .reviews
            .get(review_id)
            .await?
            .filter(|r| r.destination_id == destination_id)
            .ok_or_else(|| CoreError::not_found("Review", review_id))?;
        if review.user_id != user_id {
            return Err(CoreError::forbidden("Only the author can edit this review"));
        }
        Ok(review)
    }

    async fn active_destination(&self, id: Uuid) -> CoreResult<Destination> {
        match self.destinations.get(id).await? {
            Some(d) if d.is_active => Ok(d),
            _ => Err(CoreError::not_found("Destination", id)),
        }
    }

    async fn refresh_rating(&self, destination_id: Uuid) -> CoreResult<()> {
        let (average, count) = self.reviews.summary(destination_id).await?;
        if let Some(mut destination) = self.destinations.get(destination_id).await? {
            destination.set_rating_summary(average, count);
            self.destinations.update(&destination).await?;
        }
        Ok(())
    }
}

pub struct WishlistService {
    wishlist: Arc<dyn WishlistRepository>,
    destinations: Arc<dyn DestinationRepository>,
}

impl WishlistService {
    pub fn new(wishlist: Arc<dyn WishlistRepository>, destinations: Arc<dyn DestinationRepository>) -> Self {
        Self { wishlist, destinations }
    }

    /// The user's saved destinations, most recently added first.
    pub async fn get(&self, user_id: Uuid) -> CoreResult<Vec<(WishlistItem, Destination)>> {
        let items = self.wishlist.list_for_user(user_id).await?;
        let ids: Vec<Uuid> = items.iter().map(|i| i.destination_id).collect();
        let destinations = self.destinations.get_many(&ids).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                destinations
                    .iter()
                    .find(|d| d.id == item.destination_id)
                    .cloned()
                    .map(|d| (item, d))
            })
            .collect())
    }

    pub async fn add(&self, user_id: Uuid, destination_id: Uuid) -> CoreResult<WishlistItem> {
        match self.destinations.get(destination_id).await? {
            Some(d) if d.is_active => {}
            _ => return Err(CoreError::not_found("Destination", destination_id)),
        }
        let item = WishlistItem::new(user_id, destination_id);
        self.wishlist.insert(&item).await?;
        Ok(item)
    }

    pub async fn remove(&self, user_id: Uuid, destination_id: Uuid) -> CoreResult<()> {
        if !self.wishlist.remove(user_id, destination_id).await? {
            return Err(CoreError::not_found("WishlistItem", destination_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::draft;
    use crate::memory::InMemoryCatalogStore;

    async fn seeded() -> (Arc<InMemoryCatalogStore>, Destination) {
        let store = Arc::new(InMemoryCatalogStore::new());
        let destination = Destination::create(draft("Madeira")).unwrap();
        DestinationRepository::insert(store.as_ref(), &destination).await.unwrap();
        (store, destination)
    }

    fn input(rating: i64) -> ReviewInput {
        ReviewInput { rating, title: None, comment: Some("Lovely".into()) }
    }

    #[tokio::test]
    async fn test_review_updates_destination_rating() {
        let (store, d) = seeded().await;
        let reviews = ReviewService::new(store.clone(), store.clone());

        reviews.create(Uuid::new_v4(), d.id, input(5)).await.unwrap();
        let second = reviews.create(Uuid::new_v4(), d.id, input(2)).await.unwrap();

        let stored = DestinationRepository::get(store.as_ref(), d.id).await.unwrap().unwrap();
        assert_eq!(stored.review_count, 2);
        assert!((stored.rating - 3.5).abs() < f64::EPSILON);

        reviews.delete(second.user_id, d.id, second.id, false).await.unwrap();
        let stored = DestinationRepository::get(store.as_ref(), d.id).await.unwrap().unwrap();
        assert_eq!(stored.review_count, 1);
        assert!((stored.rating - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_second_review_conflicts() {
        let (store, d) = seeded().await;
        let reviews = ReviewService::new(store.clone(), store.clone());
        let user = Uuid::new_v4();

        reviews.create(user, d.id, input(4)).await.unwrap();
        let err = reviews.create(user, d.id, input(3)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_rating_is_not_persisted() {
        let (store, d) = seeded().await;
        let reviews = ReviewService::new(store.clone(), store.clone());
        let err = reviews.create(Uuid::new_v4(), d.id, input(0)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(reviews.list(d.id, PageRequest::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_concurrent_reviews_exactly_one_wins() {
        let (store, d) = seeded().await;
        let reviews = Arc::new(ReviewService::new(store.clone(), store.clone()));
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for rating in 1..=5 {
            let reviews = reviews.clone();
            let destination_id = d.id;
            handles.push(tokio::spawn(async move {
                reviews.create(user, destination_id, input(rating)).await
            }));
        }

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CoreError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 4);
    }

    #[tokio::test]
    async fn test_only_author_edits_review() {
        let (store, d) = seeded().await;
        let reviews = ReviewService::new(store.clone(), store.clone());
        let review = reviews.create(Uuid::new_v4(), d.id, input(4)).await.unwrap();

        let err = reviews.update(Uuid::new_v4(), d.id, review.id, input(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        reviews.delete(Uuid::new_v4(), d.id, review.id, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_wishlist_add_remove() {
        let (store, d) = seeded().await;
        let wishlist = WishlistService::new(store.clone(), store.clone());
        let user = Uuid::new_v4();

        wishlist.add(user, d.id).await.unwrap();
        assert!(matches!(wishlist.add(user, d.id).await, Err(CoreError::Conflict(_))));
        assert!(wishlist.add(Uuid::new_v4(), d.id).await.is_ok());

        let items = wishlist.get(user).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].1.name, "Madeira");

        wishlist.remove(user, d.id).await.unwrap();
        assert!(matches!(wishlist.remove(user, d.id).await, Err(CoreError::NotFound { .. })));
        assert!(matches!(wishlist.add(user, Uuid::new_v4()).await, Err(CoreError::NotFound { .. })));
    }
}
