//! Collision-free slugs for a naming pattern.

use domain::pattern::TokenMap;
use std::path::Path;

use crate::slug::with_suffix;
use crate::tokens::substitute;

/// Where a candidate slug would land inside a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub slug: String,
    /// Suffix counter that produced `slug` (1 = unsuffixed).
    pub n: u32,
    /// File path relative to the collection, `/`-separated.
    pub relative: String,
    /// For folder patterns, the directory named by the `{slug}` segment.
    pub folder: Option<String>,
}

/// Substitute `slug` (plus the other resolved tokens) into `pattern`.
pub fn place(pattern: &str, tokens: &TokenMap, slug: &str, n: u32) -> Placement {
    let mut tokens = tokens.clone();
    tokens.insert("slug".to_string(), slug.to_string());

    let segments: Vec<&str> = pattern.split('/').collect();
    let folder = segments
        .iter()
        .position(|seg| seg.contains("{slug}"))
        .filter(|&i| i + 1 < segments.len())
        .map(|i| substitute(&segments[..=i].join("/"), &tokens));

    Placement {
        slug: slug.to_string(),
        n,
        relative: substitute(pattern, &tokens),
        folder,
    }
}

/// True when the file, or the slug's folder, already exists.
pub fn is_taken(collection_dir: &Path, p: &Placement) -> bool {
    collection_dir.join(&p.relative).exists()
        || p
            .folder
            .as_ref()
            .is_some_and(|f| collection_dir.join(f).exists())
}

/// First free placement for `base`, trying suffixes from `start` upwards.
pub fn first_free(
    base: &str,
    collection_dir: &Path,
    pattern: &str,
    tokens: &TokenMap,
    start: u32,
) -> Placement {
    let mut n = start.max(1);
    loop {
        let candidate = place(pattern, tokens, &with_suffix(base, n), n);
        if !is_taken(collection_dir, &candidate) || n == u32::MAX {
            return candidate;
        }
        n += 1;
    }
}

/// `base`, or `base-2`, `base-3`, ... whichever names a free location first.
pub fn unique_slug(base: &str, collection_dir: &Path, pattern: &str, tokens: &TokenMap) -> String {
    first_free(base, collection_dir, pattern, tokens, 1).slug
}
