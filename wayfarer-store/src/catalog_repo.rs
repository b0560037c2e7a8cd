use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use wayfarer_catalog::{
    Collection, CollectionRepository, Destination, DestinationQuery, DestinationRepository, DestinationReview,
    PriceRange, Rating, ReviewRepository, SortOrder, WishlistItem, WishlistRepository,
};
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::database::{map_err, storage, window};

/// Postgres-backed catalog: destinations, collections, reviews and wishlists.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DestinationRow {
    id: Uuid,
    name: String,
    country: String,
    city: Option<String>,
    category: String,
    tags: Vec<String>,
    price_min: i64,
    price_max: i64,
    currency: String,
    rating: f64,
    review_count: i32,
    images: Vec<String>,
    description: Option<String>,
    featured: bool,
    pinned: bool,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Destination {
            id: row.id,
            name: row.name,
            country: row.country,
            city: row.city,
            category: row.category,
            tags: row.tags.into_iter().collect(),
            price_range: PriceRange { min: row.price_min, max: row.price_max },
            currency: row.currency,
            rating: row.rating,
            review_count: row.review_count.max(0) as u32,
            images: row.images,
            description: row.description,
            featured: row.featured,
            pinned: row.pinned,
            display_order: row.display_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const DESTINATION_COLUMNS: &str = "id, name, country, city, category, tags, price_min, price_max, currency, rating, \
     review_count, images, description, featured, pinned, display_order, is_active, created_at, updated_at";

fn order_by(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Featured => "pinned DESC, featured DESC, display_order ASC, rating DESC, name ASC",
        SortOrder::PriceAsc => "price_min ASC, name ASC",
        SortOrder::PriceDesc => "price_min DESC, name ASC",
        SortOrder::Rating => "rating DESC, review_count DESC, name ASC",
        SortOrder::Name => "name ASC",
        SortOrder::Newest => "created_at DESC",
    }
}

/// `SELECT <select> FROM destinations WHERE <filters>`, binds included.
fn filtered(select: &str, query: &DestinationQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM destinations WHERE TRUE", select));
    if !query.include_inactive {
        qb.push(" AND is_active");
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q.to_lowercase());
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR country ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR city ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t LIKE ")
            .push_bind(pattern)
            .push("))");
    }
    if let Some(country) = &query.country {
        qb.push(" AND lower(country) = ").push_bind(country.trim().to_lowercase());
    }
    if let Some(category) = &query.category {
        qb.push(" AND category = ").push_bind(category.trim().to_uppercase());
    }
    if let Some(tag) = &query.tag {
        qb.push(" AND ").push_bind(tag.trim().to_lowercase()).push(" = ANY(tags)");
    }
    if let Some(min) = query.min_price {
        qb.push(" AND price_max >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        qb.push(" AND price_min <= ").push_bind(max);
    }
    if let Some(rating) = query.min_rating {
        qb.push(" AND rating >= ").push_bind(rating);
    }
    if let Some(featured) = query.featured {
        qb.push(" AND featured = ").push_bind(featured);
    }
    qb
}

#[async_trait]
impl DestinationRepository for PgCatalogStore {
    async fn insert(&self, d: &Destination) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO destinations ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
            DESTINATION_COLUMNS
        ))
        .bind(d.id)
        .bind(&d.name)
        .bind(&d.country)
        .bind(&d.city)
        .bind(&d.category)
        .bind(d.tags.iter().cloned().collect::<Vec<_>>())
        .bind(d.price_range.min)
        .bind(d.price_range.max)
        .bind(&d.currency)
        .bind(d.rating)
        .bind(d.review_count as i32)
        .bind(&d.images)
        .bind(&d.description)
        .bind(d.featured)
        .bind(d.pinned)
        .bind(d.display_order)
        .bind(d.is_active)
        .bind(d.created_at)
        .bind(d.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Destination>> {
        let row = sqlx::query_as::<_, DestinationRow>(&format!(
            "SELECT {} FROM destinations WHERE id = $1",
            DESTINATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Destination::from))
    }

    async fn update(&self, d: &Destination) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE destinations
            SET name = $2, country = $3, city = $4, category = $5, tags = $6, price_min = $7, price_max = $8,
                currency = $9, rating = $10, review_count = $11, images = $12, description = $13,
                featured = $14, pinned = $15, display_order = $16, is_active = $17, updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(d.id)
        .bind(&d.name)
        .bind(&d.country)
        .bind(&d.city)
        .bind(&d.category)
        .bind(d.tags.iter().cloned().collect::<Vec<_>>())
        .bind(d.price_range.min)
        .bind(d.price_range.max)
        .bind(&d.currency)
        .bind(d.rating)
        .bind(d.review_count as i32)
        .bind(&d.images)
        .bind(&d.description)
        .bind(d.featured)
        .bind(d.pinned)
        .bind(d.display_order)
        .bind(d.is_active)
        .bind(d.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Destination", d.id));
        }
        Ok(())
    }

    async fn search(&self, query: &DestinationQuery, page: PageRequest) -> CoreResult<Page<Destination>> {
        let (limit, offset) = window(page);

        let mut select = filtered(DESTINATION_COLUMNS, query);
        select
            .push(" ORDER BY ")
            .push(order_by(query.sort))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select
            .build_query_as::<DestinationRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let mut count = filtered("COUNT(*)", query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await.map_err(storage)?;

        Ok(Page::new(rows.into_iter().map(Destination::from).collect(), total as u64, page))
    }

    async fn get_many(&self, ids: &[Uuid]) -> CoreResult<Vec<Destination>> {
        let rows = sqlx::query_as::<_, DestinationRow>(&format!(
            "SELECT {} FROM destinations WHERE id = ANY($1)",
            DESTINATION_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        // Keep the caller's order.
        let mut by_id: HashMap<Uuid, Destination> =
            rows.into_iter().map(|r| (r.id, Destination::from(r))).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    destination_ids: Vec<Uuid>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Collection {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            destination_ids: row.destination_ids,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLLECTION_COLUMNS: &str = "id, name, slug, description, destination_ids, is_published, created_at, updated_at";

#[async_trait]
impl CollectionRepository for PgCatalogStore {
    async fn insert(&self, c: &Collection) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO collections ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            COLLECTION_COLUMNS
        ))
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.slug)
        .bind(&c.description)
        .bind(&c.destination_ids)
        .bind(c.is_published)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err("Collection slug already exists"))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Collection>> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {} FROM collections WHERE id = $1",
            COLLECTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Collection::from))
    }

    async fn update(&self, c: &Collection) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE collections
            SET name = $2, description = $3, destination_ids = $4, is_published = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.description)
        .bind(&c.destination_ids)
        .bind(c.is_published)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Collection", c.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, published_only: bool) -> CoreResult<Vec<Collection>> {
        let rows = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {} FROM collections WHERE (NOT $1 OR is_published) ORDER BY name",
            COLLECTION_COLUMNS
        ))
        .bind(published_only)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    destination_id: Uuid,
    rating: i16,
    title: Option<String>,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for DestinationReview {
    type Error = CoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(DestinationReview {
            id: row.id,
            user_id: row.user_id,
            destination_id: row.destination_id,
            rating: Rating::new(i64::from(row.rating))
                .map_err(|e| CoreError::Storage(format!("Corrupt review {}: {}", row.id, e)))?,
            title: row.title,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const REVIEW_COLUMNS: &str = "id, user_id, destination_id, rating, title, comment, created_at, updated_at";

#[async_trait]
impl ReviewRepository for PgCatalogStore {
    async fn insert(&self, r: &DestinationReview) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO destination_reviews ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            REVIEW_COLUMNS
        ))
        .bind(r.id)
        .bind(r.user_id)
        .bind(r.destination_id)
        .bind(i16::from(r.rating.value()))
        .bind(&r.title)
        .bind(&r.comment)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err("You have already reviewed this destination"))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<DestinationReview>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM destination_reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(DestinationReview::try_from).transpose()
    }

    async fn update(&self, r: &DestinationReview) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE destination_reviews SET rating = $2, title = $3, comment = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(r.id)
        .bind(i16::from(r.rating.value()))
        .bind(&r.title)
        .bind(&r.comment)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Review", r.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM destination_reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_destination(
        &self,
        destination_id: Uuid,
        page: PageRequest,
    ) -> CoreResult<Page<DestinationReview>> {
        let (limit, offset) = window(page);
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM destination_reviews WHERE destination_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            REVIEW_COLUMNS
        ))
        .bind(destination_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM destination_reviews WHERE destination_id = $1")
            .bind(destination_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let reviews = rows
            .into_iter()
            .map(DestinationReview::try_from)
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Page::new(reviews, total as u64, page))
    }

    async fn summary(&self, destination_id: Uuid) -> CoreResult<(f64, u32)> {
        let (average, count): (f64, i64) = sqlx::query_as(
            "SELECT COALESCE(AVG(rating)::float8, 0), COUNT(*) FROM destination_reviews WHERE destination_id = $1",
        )
        .bind(destination_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok((average, count as u32))
    }
}

#[async_trait]
impl WishlistRepository for PgCatalogStore {
    async fn insert(&self, item: &WishlistItem) -> CoreResult<()> {
        sqlx::query("INSERT INTO wishlist_items (id, user_id, destination_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(item.id)
            .bind(item.user_id)
            .bind(item.destination_id)
            .bind(item.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_err("Destination is already in the wishlist"))?;
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, destination_id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND destination_id = $2")
            .bind(user_id)
            .bind(destination_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<WishlistItem>> {
        let rows: Vec<(Uuid, Uuid, Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, destination_id, created_at FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, destination_id, created_at)| WishlistItem { id, user_id, destination_id, created_at })
            .collect())
    }
}
