use std::sync::Arc;

use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::collection::{Collection, CollectionDraft};
use crate::destination::{Destination, DestinationDraft, DestinationUpdate};
use crate::repository::{CollectionRepository, DestinationRepository};
use crate::search::DestinationQuery;

/// Read-mostly destination catalog plus the admin edits on it.
pub struct CatalogService {
    destinations: Arc<dyn DestinationRepository>,
    collections: Arc<dyn CollectionRepository>,
}

impl CatalogService {
    pub fn new(
        destinations: Arc<dyn DestinationRepository>,
        collections: Arc<dyn CollectionRepository>,
    ) -> Self {
        Self { destinations, collections }
    }

    pub async fn search(&self, query: &DestinationQuery, page: PageRequest) -> CoreResult<Page<Destination>> {
        self.destinations.search(query, page).await
    }

    /// Public lookup; deactivated destinations are reported as missing.
    pub async fn get_public(&self, id: Uuid) -> CoreResult<Destination> {
        match self.destinations.get(id).await? {
            Some(d) if d.is_active => Ok(d),
            _ => Err(CoreError::not_found("Destination", id)),
        }
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Destination> {
        self.destinations
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Destination", id))
    }

    pub async fn create(&self, draft: DestinationDraft) -> CoreResult<Destination> {
        let destination = Destination::create(draft)?;
        self.destinations.insert(&destination).await?;
        tracing::info!(destination_id = %destination.id, name = %destination.name, "Destination created");
        Ok(destination)
    }

    pub async fn update(&self, id: Uuid, update: DestinationUpdate) -> CoreResult<Destination> {
        let mut destination = self.get(id).await?;
        destination.apply(update)?;
        self.destinations.update(&destination).await?;
        Ok(destination)
    }

    /// Destinations are never hard-deleted; they drop out of public search.
    pub async fn deactivate(&self, id: Uuid) -> CoreResult<Destination> {
        self.update(id, DestinationUpdate { is_active: Some(false), ..Default::default() }).await
    }

    pub async fn list_collections(&self, published_only: bool) -> CoreResult<Vec<Collection>> {
        self.collections.list(published_only).await
    }

    pub async fn get_collection(&self, id: Uuid) -> CoreResult<(Collection, Vec<Destination>)> {
        let collection = self
            .collections
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Collection", id))?;
        let members = self.destinations.get_many(&collection.destination_ids).await?;
        Ok((collection, members))
    }

    pub async fn create_collection(&self, draft: CollectionDraft) -> CoreResult<Collection> {
        self.ensure_destinations_exist(&draft.destination_ids).await?;
        let collection = Collection::create(draft)?;
        self.collections.insert(&collection).await?;
        Ok(collection)
    }

    pub async fn update_collection(
        &self,
        id: Uuid,
        destination_ids: Option<Vec<Uuid>>,
        published: Option<bool>,
        description: Option<String>,
    ) -> CoreResult<Collection> {
        let mut collection = self
            .collections
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Collection", id))?;
        if let Some(ids) = destination_ids {
            self.ensure_destinations_exist(&ids).await?;
            collection.set_destinations(ids);
        }
        if let Some(published) = published {
            collection.set_published(published);
        }
        if description.is_some() {
            collection.description = description;
        }
        self.collections.update(&collection).await?;
        Ok(collection)
    }

    pub async fn delete_collection(&self, id: Uuid) -> CoreResult<()> {
        if !self.collections.delete(id).await? {
            return Err(CoreError::not_found("Collection", id));
        }
        Ok(())
    }

    async fn ensure_destinations_exist(&self, ids: &[Uuid]) -> CoreResult<()> {
        let found = self.destinations.get_many(ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|d| d.id == **id)) {
            return Err(CoreError::not_found("Destination", missing));
        }
        Ok(())
    }
}
