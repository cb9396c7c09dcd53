//! Overlay user-declared collections on discovered ones.

use domain::{Collection, CollectionConfig};
use std::collections::HashSet;

use crate::file::DEFAULT_PATTERN;

/// Configured fields win one by one; configured collections with nothing on
/// disk are appended (in declaration order) with `item_count == 0`.
///
/// `content_dir` is the `/`-separated default parent for configured entries
/// that declare no `path`.
pub fn merge(
    discovered: Vec<Collection>,
    configured: &[CollectionConfig],
    content_dir: &str,
) -> Vec<Collection> {
    let config_for = |name: &str| configured.iter().find(|c| c.name == name);

    let mut seen: HashSet<String> = HashSet::with_capacity(discovered.len());
    let mut out: Vec<Collection> = discovered
        .into_iter()
        .map(|mut col| {
            seen.insert(col.name.clone());
            if let Some(cfg) = config_for(&col.name) {
                apply(&mut col, cfg);
            }
            col
        })
        .collect();

    for cfg in configured {
        if !seen.insert(cfg.name.clone()) {
            continue;
        }
        let mut col = Collection {
            name: cfg.name.clone(),
            path: default_path(content_dir, &cfg.name),
            file_pattern: DEFAULT_PATTERN.to_string(),
            item_count: 0,
            schema: None,
            preview_url: None,
            images: Default::default(),
        };
        apply(&mut col, cfg);
        out.push(col);
    }
    out
}

fn apply(col: &mut Collection, cfg: &CollectionConfig) {
    if let Some(p) = &cfg.path {
        col.path = p.trim_end_matches('/').to_string();
    }
    if let Some(p) = &cfg.file_pattern {
        col.file_pattern = p.clone();
    }
    if let Some(s) = &cfg.schema {
        col.schema = Some(s.clone());
    }
    if let Some(u) = &cfg.preview_url {
        col.preview_url = Some(u.clone());
    }
    if let Some(i) = cfg.images {
        col.images = i;
    }
}

fn default_path(content_dir: &str, name: &str) -> String {
    let dir = content_dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{FieldType, ImageStrategy, Schema};

    fn found(name: &str, pattern: &str, count: usize) -> Collection {
        Collection {
            name: name.into(),
            path: format!("src/content/{name}"),
            file_pattern: pattern.into(),
            item_count: count,
            schema: Some(Schema::from([("title".to_string(), FieldType::String)])),
            preview_url: None,
            images: ImageStrategy::Colocated,
        }
    }

    #[test]
    fn configured_fields_override_individually() {
        let discovered = vec![found("blog", "{date}-{slug}.md", 4), found("docs", "{slug}.md", 2)];
        let cfg = CollectionConfig {
            preview_url: Some("/blog/{slug}".into()),
            images: Some(ImageStrategy::Public),
            ..CollectionConfig::named("blog")
        };

        let out = merge(discovered, &[cfg], "src/content");
        assert_eq!(out.len(), 2);
        let blog = &out[0];
        assert_eq!(blog.file_pattern, "{date}-{slug}.md");
        assert_eq!(blog.item_count, 4);
        assert!(blog.schema.is_some());
        assert_eq!(blog.preview_url.as_deref(), Some("/blog/{slug}"));
        assert_eq!(blog.images, ImageStrategy::Public);
        assert_eq!(out[1], found("docs", "{slug}.md", 2));
    }

    #[test]
    fn unmatched_configured_are_appended_with_zero_items() {
        let discovered = vec![found("blog", "{slug}.md", 1)];
        let configured = [
            CollectionConfig {
                file_pattern: Some("{lang}/{slug}.md".into()),
                ..CollectionConfig::named("guides")
            },
            CollectionConfig {
                path: Some("notes/".into()),
                ..CollectionConfig::named("notes")
            },
            CollectionConfig::named("guides"),
        ];

        let out = merge(discovered, &configured, "src/content/");
        let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["blog", "guides", "notes"]);
        assert_eq!(out[1].item_count, 0);
        assert_eq!(out[1].path, "src/content/guides");
        assert_eq!(out[1].file_pattern, "{lang}/{slug}.md");
        assert_eq!(out[2].path, "notes");
        assert_eq!(out[2].file_pattern, "{slug}.md");
    }
}
