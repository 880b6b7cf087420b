use serde::{Deserialize, Serialize};

/// The category chips the marketplace UI offers. The `category` field itself
/// stays free text so foreign records decode unchanged.
pub const KNOWN_CATEGORIES: [&str; 5] = ["Sedan", "SUV", "Truck", "Luxury", "Other"];

/// A single for-sale record as mirrored from the remote collection.
///
/// Every field is a defaulted string: snapshot records with missing fields
/// decode to empty strings rather than being dropped. `id` is assigned by the
/// remote collection at creation time and is empty only in the transient
/// pre-commit state; a record with an empty `id` is never inserted into the
/// mirror.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub price: String,
    pub details: String,
    pub category: String,
    pub seller_name: String,
    pub seller_phone: String,
    pub image_url: String,
    pub owner_id: String,
}

/// Caller-supplied field set for create/update.
///
/// The mutation pipeline resolves `id`, `image_url` and `owner_id` itself, so
/// they are not part of the draft.
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    pub name: String,
    pub price: String,
    pub details: String,
    pub category: String,
    pub seller_name: String,
    pub seller_phone: String,
}

impl ListingDraft {
    pub(crate) fn into_listing(self, id: String, image_url: String, owner_id: String) -> Listing {
        Listing {
            id,
            name: self.name,
            price: self.price,
            details: self.details,
            category: self.category,
            seller_name: self.seller_name,
            seller_phone: self.seller_phone,
            image_url,
            owner_id,
        }
    }
}
