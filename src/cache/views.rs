use super::SyncCache;
use crate::core::Listing;

/// Derived views: pure, synchronous reads over the current mirror. Each view
/// borrows the mirror exactly once, so a single result never mixes two
/// snapshots. None of these trigger I/O.
impl SyncCache {
    /// Listings whose category equals `category`, case-insensitively.
    pub fn by_category(&self, category: &str) -> Vec<Listing> {
        self.handles.with_mirror(|mirror| {
            mirror
                .iter()
                .filter(|l| l.category.eq_ignore_ascii_case(category))
                .cloned()
                .collect()
        })
    }

    /// Listings created by `owner_id` (exact match).
    pub fn by_owner(&self, owner_id: &str) -> Vec<Listing> {
        self.handles.with_mirror(|mirror| {
            mirror
                .iter()
                .filter(|l| l.owner_id == owner_id)
                .cloned()
                .collect()
        })
    }

    /// Single lookup. `None` means not in the mirror, which is distinct from
    /// "still loading" (see [`SyncCache::loading`]).
    pub fn by_id(&self, id: &str) -> Option<Listing> {
        self.handles
            .with_mirror(|mirror| mirror.iter().find(|l| l.id == id).cloned())
    }

    /// Case-insensitive substring search over name, category, details,
    /// seller name and price. A blank query returns the full mirror.
    pub fn search(&self, query: &str) -> Vec<Listing> {
        self.handles.with_mirror(|mirror| {
            if query.trim().is_empty() {
                return mirror.to_vec();
            }
            let needle = query.to_lowercase();
            mirror
                .iter()
                .filter(|l| {
                    [&l.name, &l.category, &l.details, &l.seller_name, &l.price]
                        .into_iter()
                        .any(|field| field.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect()
        })
    }

    /// First `n` listings in recency order; fewer if the mirror is smaller.
    pub fn featured(&self, n: usize) -> Vec<Listing> {
        self.handles
            .with_mirror(|mirror| mirror.iter().take(n).cloned().collect())
    }
}
