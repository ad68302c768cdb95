//! Generic paginated-collection diffing shared by every comparison.
//!
//! Both the Letterboxd scraper and the Trakt client funnel through the same
//! three operations: drain a paginated source into a collection, subtract one
//! collection from another by an identity key, and optionally re-order the
//! result by a secondary key.

use std::collections::HashSet;
use std::hash::Hash;

use color_eyre::{eyre::eyre, Result};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    /// An item the fetch layer produced is missing the fields its identity
    /// key is derived from. Aborts the whole run rather than silently
    /// skipping the item.
    #[error("malformed item: {0}")]
    MalformedItem(String),
}

/// Drains a paginated source into a single collection.
///
/// `fetch_page` is called with page numbers starting at 1 until it returns an
/// empty page; non-empty results are concatenated in page order. An empty
/// page means "no more items" whether the source is exhausted or the fetch
/// failed upstream - the two are deliberately not distinguished here.
///
/// Sources that keep returning non-empty pages past `max_pages` are cut off
/// with an error: a silently truncated collection would make the diff report
/// items as missing that merely live on an unfetched page. A collection
/// occupying exactly `max_pages` pages is fine - the loop looks one page
/// past the ceiling and only fails if that page still has items.
pub fn paginate<T, F>(mut fetch_page: F, max_pages: u32) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Result<Vec<T>>,
{
    let mut items = Vec::new();
    let mut page = 1u32;
    loop {
        let page_items = fetch_page(page)?;
        if page_items.is_empty() {
            debug!("page {page} is empty, collection complete ({} items)", items.len());
            return Ok(items);
        }
        if page > max_pages {
            return Err(eyre!(
                "source still returning items after {max_pages} pages; refusing to diff a truncated collection (raise MAX_PAGES if the source really is that long)"
            ));
        }
        items.extend(page_items);
        page += 1;
    }
}

/// Items of `target` whose identity key does not occur in `reference`.
///
/// The reference side is reduced to a key set (repeated keys are absorbed).
/// The target side is walked in order and deduplicated by key as it goes:
/// the first occurrence wins, later duplicates are dropped. Pages can
/// re-rank between requests, so the same item showing up twice across a
/// paginated fetch is expected, not an error.
///
/// `key` must be pure and deterministic; if it fails for any item on either
/// side the whole diff fails.
pub fn missing_from<T, K, F>(reference: &[T], target: &[T], key: F) -> Result<Vec<T>, DiffError>
where
    T: Clone,
    K: Hash + Eq,
    F: Fn(&T) -> Result<K, DiffError>,
{
    let mut reference_keys = HashSet::new();
    for item in reference {
        reference_keys.insert(key(item)?);
    }

    let mut emitted = HashSet::new();
    let mut missing = Vec::new();
    for item in target {
        let k = key(item)?;
        if reference_keys.contains(&k) || !emitted.insert(k) {
            continue;
        }
        missing.push(item.clone());
    }
    Ok(missing)
}

/// Stable descending sort by a string key.
///
/// Callers map "no value" to the empty string, which compares lowest, so
/// unrated items land after every rated one. Ties keep their original
/// relative order.
pub fn sort_desc_by<T, F>(items: &mut [T], sort_key: F)
where
    F: Fn(&T) -> String,
{
    items.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
}
