use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};

/// Star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 5;

    pub fn new(value: i64) -> CoreResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(CoreError::validation(format!(
                "Rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(r: Rating) -> Self {
        r.0 as i64
    }
}

/// One review per (user, destination)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationReview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub destination_id: Uuid,
    pub rating: Rating,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DestinationReview {
    pub fn new(
        user_id: Uuid,
        destination_id: Uuid,
        rating: i64,
        title: Option<String>,
        comment: Option<String>,
    ) -> CoreResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            destination_id,
            rating: Rating::new(rating)?,
            title,
            comment,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_rating(&mut self, rating: i64) -> CoreResult<()> {
        self.rating = Rating::new(rating)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn edit(&mut self, title: Option<String>, comment: Option<String>) {
        if title.is_some() {
            self.title = title;
        }
        if comment.is_some() {
            self.comment = comment;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        for r in -2..=8 {
            let ok = Rating::new(r).is_ok();
            assert_eq!(ok, (1..=5).contains(&r), "rating {}", r);
        }
    }

    #[test]
    fn test_set_rating_keeps_old_value_on_error() {
        let mut review = DestinationReview::new(Uuid::new_v4(), Uuid::new_v4(), 4, None, None).unwrap();
        let err = review.set_rating(6).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(review.rating.value(), 4);
        review.set_rating(1).unwrap();
        assert_eq!(review.rating.value(), 1);
    }

    #[test]
    fn test_rating_deserialization_is_validated() {
        assert!(serde_json::from_str::<Rating>("3").is_ok());
        assert!(serde_json::from_str::<Rating>("0").is_err());
        assert_eq!(serde_json::to_string(&Rating::new(5).unwrap()).unwrap(), "5");
    }
}
