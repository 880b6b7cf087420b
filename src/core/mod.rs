pub mod error;
pub mod listing;

pub use error::{CacheError, Result};
pub use listing::{KNOWN_CATEGORIES, Listing, ListingDraft};
