use chrono::Utc;
use tracing::{debug, warn};

use super::SyncCache;
use super::state::CacheHandles;
use super::sync::decode_record;
use crate::core::{CacheError, Listing, ListingDraft, Result};

/// Filename sent with every image part; the host keys uploads by preset, not
/// by name.
const UPLOAD_FILENAME: &str = "image.jpg";

/// Mutation pipeline. All three commands share one discipline: validate,
/// resolve id, image step, commit, local apply, signal. A failed commit
/// leaves the mirror exactly as it was.
impl SyncCache {
    /// Create a listing. The remote allocates the id (with a local
    /// time-based fallback); `owner_id` comes from the current identity.
    ///
    /// A failed image upload is non-fatal: the listing is committed with an
    /// empty `image_url` and `last_error` records the upload failure.
    pub async fn create(&self, draft: ListingDraft, image: Option<Vec<u8>>) -> Result<Listing> {
        self.handles.clear_error();
        if let Err(err) = validate_draft(&draft, true) {
            return Err(self.handles.reject(err));
        }
        let _guard = CacheHandles::begin(&self.handles);

        let id = match self.remote.new_id().await {
            Some(id) => id,
            None => fallback_id(),
        };
        let image_url = self.resolve_image(image, String::new()).await;
        let owner_id = self.identity.current_id().unwrap_or_default();
        let listing = draft.into_listing(id.clone(), image_url, owner_id);

        if let Err(err) = self.remote.put(&id, &listing).await {
            return Err(self.handles.reject(err));
        }
        debug!(id = %listing.id, "listing created");
        self.handles.apply_upsert(listing.clone());
        Ok(listing)
    }

    /// Replace an existing listing wholesale. Fails with `NotFound` when the
    /// id is absent remotely; an update is never silently turned into a
    /// create.
    ///
    /// A failed image upload falls back to the record's previous
    /// `image_url`; an existing image is never silently dropped.
    pub async fn update(
        &self,
        id: &str,
        draft: ListingDraft,
        image: Option<Vec<u8>>,
    ) -> Result<Listing> {
        self.handles.clear_error();
        if let Err(err) = validate_draft(&draft, false) {
            return Err(self.handles.reject(err));
        }
        let _guard = CacheHandles::begin(&self.handles);

        let existing = match self.remote.get_one(id).await {
            Ok(Some(raw)) => decode_record(id, raw).unwrap_or_default(),
            Ok(None) => return Err(self.handles.reject(CacheError::NotFound(id.to_string()))),
            Err(err) => return Err(self.handles.reject(err)),
        };

        let image_url = self.resolve_image(image, existing.image_url).await;
        let owner_id = self.identity.current_id().unwrap_or_default();
        let listing = draft.into_listing(id.to_string(), image_url, owner_id);

        if let Err(err) = self.remote.put(id, &listing).await {
            return Err(self.handles.reject(err));
        }
        debug!(id, "listing updated");
        self.handles.apply_upsert(listing.clone());
        Ok(listing)
    }

    /// Delete a listing. The id must exist remotely; after success the
    /// record is gone from the mirror (and every derived view) immediately,
    /// without waiting for the next snapshot.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.handles.clear_error();
        let _guard = CacheHandles::begin(&self.handles);

        match self.remote.get_one(id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(self.handles.reject(CacheError::NotFound(id.to_string()))),
            Err(err) => return Err(self.handles.reject(err)),
        }

        if let Err(err) = self.remote.delete(id).await {
            return Err(self.handles.reject(err));
        }
        debug!(id, "listing deleted");
        self.handles.apply_remove(id);
        Ok(())
    }

    /// Image step: upload if bytes were supplied, otherwise keep `fallback`.
    /// Upload failure records `last_error` but does not abort the mutation.
    async fn resolve_image(&self, image: Option<Vec<u8>>, fallback: String) -> String {
        let Some(bytes) = image else {
            return fallback;
        };
        let outcome = match &self.uploader {
            Some(uploader) => uploader.upload(bytes, UPLOAD_FILENAME).await,
            None => Err(CacheError::Upload("no uploader configured".to_string())),
        };
        match outcome {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "image upload failed, using fallback URL");
                self.handles.record_error(err);
                fallback
            }
        }
    }
}

/// Required fields must be non-blank; `category` only for create. Checked
/// before any remote call is made.
fn validate_draft(draft: &ListingDraft, require_category: bool) -> Result<()> {
    let mut required = vec![
        ("name", draft.name.as_str()),
        ("price", draft.price.as_str()),
        ("seller_name", draft.seller_name.as_str()),
    ];
    if require_category {
        required.push(("category", draft.category.as_str()));
    }
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(CacheError::Validation(field.to_string()));
        }
    }
    Ok(())
}

/// Local id token for when the remote allocator is unavailable. Zero-padded
/// so the lexical recency ordering of the mirror still holds.
fn fallback_id() -> String {
    format!("{:020}", Utc::now().timestamp_millis().max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_draft() -> ListingDraft {
        ListingDraft {
            name: "Civic".into(),
            price: "10000".into(),
            category: "Sedan".into(),
            seller_name: "Bo".into(),
            ..Default::default()
        }
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let mut draft = full_draft();
        draft.name = "  ".into();
        assert_eq!(
            validate_draft(&draft, true),
            Err(CacheError::Validation("name".into()))
        );
    }

    #[test]
    fn category_required_only_for_create() {
        let mut draft = full_draft();
        draft.category = String::new();
        assert!(validate_draft(&draft, false).is_ok());
        assert_eq!(
            validate_draft(&draft, true),
            Err(CacheError::Validation("category".into()))
        );
    }

    #[test]
    fn optional_fields_may_be_blank() {
        let draft = full_draft();
        assert!(draft.details.is_empty());
        assert!(draft.seller_phone.is_empty());
        assert!(validate_draft(&draft, true).is_ok());
    }

    #[test]
    fn fallback_ids_sort_with_time() {
        let a = fallback_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = fallback_id();
        assert!(a < b);
        assert_eq!(a.len(), 20);
    }
}
