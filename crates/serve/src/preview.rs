//! Site URLs for items, from a collection's `preview_url` template.

use domain::pattern::TokenMap;
use domain::{Collection, ContentItem};
use std::path::Path;

use crate::discover::{rel_string, slug_for};
use crate::tokens::{resolve, substitute, TokenContext};

/// Resolve `collection.preview_url` for `item`. `{id}` is the item id; every
/// other placeholder goes through the token resolver.
pub fn preview_url(collection: &Collection, collection_dir: &Path, item: &ContentItem) -> Option<String> {
    let template = collection.preview_url.as_deref()?;

    let rel = item
        .path
        .strip_prefix(collection_dir)
        .map(rel_string)
        .unwrap_or_else(|_| item.id.clone());
    let slug = slug_for(&rel, Some(&collection.file_pattern));

    let custom: TokenMap = [("id".to_string(), item.id.clone())].into();
    let ctx = TokenContext::new(&slug, &item.metadata)
        .with_custom(&custom)
        .with_collection(&collection.name);
    Some(substitute(template, &resolve(template, &ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn blog(preview: Option<&str>) -> Collection {
        Collection {
            name: "blog".into(),
            path: "src/content/blog".into(),
            file_pattern: "{date}-{slug}.md".into(),
            item_count: 1,
            schema: None,
            preview_url: preview.map(str::to_string),
            images: Default::default(),
        }
    }

    fn item(rel: &str, meta: serde_json::Value) -> ContentItem {
        let serde_json::Value::Object(metadata) = meta else {
            panic!("expected object")
        };
        ContentItem {
            id: crate::discover::content_id(rel),
            slug: String::new(),
            path: PathBuf::from("/site/src/content/blog").join(rel),
            metadata,
            body: String::new(),
            raw: String::new(),
        }
    }

    #[test]
    fn resolves_slug_from_the_collection_pattern() {
        let it = item("2024-01-15-hello.md", json!({"pubDate": "2024-01-15"}));
        let dir = Path::new("/site/src/content/blog");
        assert_eq!(
            preview_url(&blog(Some("/{collection}/{year}/{slug}")), dir, &it).as_deref(),
            Some("/blog/2024/hello")
        );
        assert_eq!(
            preview_url(&blog(Some("/posts/{id}/")), dir, &it).as_deref(),
            Some("/posts/2024-01-15-hello/")
        );
        assert_eq!(preview_url(&blog(None), dir, &it), None);
    }
}
