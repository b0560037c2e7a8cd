use serde::Deserialize;

use crate::destination::Destination;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Pinned first, then featured, then editorial display order.
    #[default]
    Featured,
    PriceAsc,
    PriceDesc,
    Rating,
    Name,
    Newest,
}

/// Filters accepted by the public destination search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationQuery {
    pub q: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rating: Option<f64>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: SortOrder,
    /// Admin listings also see deactivated destinations.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl DestinationQuery {
    pub fn matches(&self, d: &Destination) -> bool {
        if !self.include_inactive && !d.is_active {
            return false;
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            let hit = d.name.to_lowercase().contains(&q)
                || d.country.to_lowercase().contains(&q)
                || d.city.as_deref().map_or(false, |c| c.to_lowercase().contains(&q))
                || d.tags.iter().any(|t| t.contains(&q));
            if !hit {
                return false;
            }
        }
        if let Some(country) = &self.country {
            if !d.country.eq_ignore_ascii_case(country.trim()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !d.category.eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !d.has_tag(tag) {
                return false;
            }
        }
        if !d.price_range.overlaps(self.min_price, self.max_price) {
            return false;
        }
        if let Some(min_rating) = self.min_rating {
            if d.rating < min_rating {
                return false;
            }
        }
        if let Some(featured) = self.featured {
            if d.featured != featured {
                return false;
            }
        }
        true
    }

    pub fn sort(&self, destinations: &mut [Destination]) {
        match self.sort {
            SortOrder::Featured => destinations.sort_by(|a, b| {
                b.pinned
                    .cmp(&a.pinned)
                    .then(b.featured.cmp(&a.featured))
                    .then(a.display_order.cmp(&b.display_order))
                    .then(b.rating.total_cmp(&a.rating))
                    .then(a.name.cmp(&b.name))
            }),
            SortOrder::PriceAsc => destinations.sort_by(|a, b| {
                a.price_range.min.cmp(&b.price_range.min).then(a.name.cmp(&b.name))
            }),
            SortOrder::PriceDesc => destinations.sort_by(|a, b| {
                b.price_range.min.cmp(&a.price_range.min).then(a.name.cmp(&b.name))
            }),
            SortOrder::Rating => destinations.sort_by(|a, b| {
                b.rating
                    .total_cmp(&a.rating)
                    .then(b.review_count.cmp(&a.review_count))
                    .then(a.name.cmp(&b.name))
            }),
            SortOrder::Name => destinations.sort_by(|a, b| a.name.cmp(&b.name)),
            SortOrder::Newest => destinations.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }

    /// Filter then sort an in-memory result set.
    pub fn run<'a, I>(&self, destinations: I) -> Vec<Destination>
    where
        I: IntoIterator<Item = &'a Destination>,
    {
        let mut hits: Vec<Destination> = destinations
            .into_iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect();
        self.sort(&mut hits);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::draft;

    fn catalog() -> Vec<Destination> {
        let mut lisbon = Destination::create(draft("Lisbon")).unwrap();
        lisbon.rating = 4.5;

        let mut kyoto_draft = draft("Kyoto");
        kyoto_draft.country = "Japan".into();
        kyoto_draft.city = Some("Kyoto".into());
        kyoto_draft.category = "culture".into();
        kyoto_draft.tags = vec!["temples".into()];
        kyoto_draft.price_min = 20_000;
        kyoto_draft.price_max = 60_000;
        let mut kyoto = Destination::create(kyoto_draft).unwrap();
        kyoto.rating = 4.9;
        kyoto.featured = true;

        let mut closed = Destination::create(draft("Closed Resort")).unwrap();
        closed.is_active = false;
        closed.pinned = true;

        vec![lisbon, kyoto, closed]
    }

    #[test]
    fn test_inactive_hidden_unless_requested() {
        let all = catalog();
        let public = DestinationQuery::default().run(&all);
        assert_eq!(public.len(), 2);

        let admin = DestinationQuery { include_inactive: true, ..Default::default() }.run(&all);
        assert_eq!(admin.len(), 3);
        assert_eq!(admin[0].name, "Closed Resort");
    }

    #[test]
    fn test_text_and_facet_filters() {
        let all = catalog();
        let q = DestinationQuery { q: Some("TEMP".into()), ..Default::default() };
        let hits = q.run(&all);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Kyoto");

        let q = DestinationQuery { country: Some("portugal".into()), tag: Some("beach".into()), ..Default::default() };
        assert_eq!(q.run(&all).len(), 1);

        let q = DestinationQuery { max_price: Some(10_000), ..Default::default() };
        let hits = q.run(&all);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Lisbon");
    }

    #[test]
    fn test_sort_orders() {
        let all = catalog();
        let featured = DestinationQuery::default().run(&all);
        assert_eq!(featured[0].name, "Kyoto");

        let by_price = DestinationQuery { sort: SortOrder::PriceAsc, ..Default::default() }.run(&all);
        assert_eq!(by_price[0].name, "Lisbon");

        let by_rating = DestinationQuery { sort: SortOrder::Rating, min_rating: Some(4.6), ..Default::default() }.run(&all);
        assert_eq!(by_rating.len(), 1);
        assert_eq!(by_rating[0].name, "Kyoto");
    }

    #[test]
    fn test_sort_parses_from_query_string() {
        let q: DestinationQuery = serde_json::from_str(r#"{"sort":"price_desc","tag":"food"}"#).unwrap();
        assert_eq!(q.sort, SortOrder::PriceDesc);
        assert!(!q.include_inactive);
    }
}
