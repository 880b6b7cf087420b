// ============================================================================
// LotSync Library
// ============================================================================
//
// A reactive client-side cache for a remote realtime listing collection:
// live mirror ingestion, derived views, and an optimistic mutation pipeline
// (create/update/delete with remote commit and no partial apply on failure).
// The remote store, the image host and the identity provider are trait
// collaborators; `MemoryCollection` ships as the local backend.

pub mod cache;
pub mod core;
pub mod identity;
pub mod remote;
pub mod upload;

// Re-export main types for convenience
pub use cache::SyncCache;
pub use self::core::{CacheError, KNOWN_CATEGORIES, Listing, ListingDraft, Result};
pub use identity::{FixedIdentity, Identity};
pub use remote::{MemoryCollection, RemoteCollection, Snapshot, SnapshotStream};
pub use upload::{CloudinaryUploader, ImageUpload, UploadConfig};
