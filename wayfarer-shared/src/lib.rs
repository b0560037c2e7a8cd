pub mod pii;
pub mod page;

pub use page::{Page, PageRequest};
pub use pii::Masked;
