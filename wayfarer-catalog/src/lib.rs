pub mod collection;
pub mod destination;
pub mod engagement;
pub mod memory;
pub mod repository;
pub mod review;
pub mod search;
pub mod service;
pub mod wishlist;

pub use collection::{Collection, CollectionDraft};
pub use destination::{Destination, DestinationDraft, DestinationUpdate, PriceRange};
pub use engagement::{ReviewInput, ReviewService, WishlistService};
pub use memory::InMemoryCatalogStore;
pub use repository::{CollectionRepository, DestinationRepository, ReviewRepository, WishlistRepository};
pub use review::{DestinationReview, Rating};
pub use search::{DestinationQuery, SortOrder};
pub use service::CatalogService;
pub use wishlist::WishlistItem;
