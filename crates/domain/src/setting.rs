use crate::collection::CollectionConfig;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSettings {
    /// Directory holding one sub-directory per collection (relative to the project).
    #[serde(default = "default_content_dir")]
    pub dir: PathBuf,

    /// Static files root used by the `public` image strategy.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("src/content")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            dir: default_content_dir(),
            public_dir: default_public_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Entry lifetime while no watcher is attached.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Entry lifetime once a watcher keeps the cache honest.
    #[serde(default = "default_watched_ttl_secs")]
    pub watched_ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    30
}

fn default_watched_ttl_secs() -> u64 {
    300
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            watched_ttl_secs: default_watched_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    /// Quiet period used to coalesce bursts of filesystem events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_watch_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    40
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Contents of `quire.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub content: ContentSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ImageStrategy;

    #[test]
    fn empty_file_uses_defaults() {
        let s: Settings = toml::from_str("").unwrap();
        assert_eq!(s.content.dir, PathBuf::from("src/content"));
        assert_eq!(s.content.public_dir, PathBuf::from("public"));
        assert_eq!(s.cache.ttl_secs, 30);
        assert_eq!(s.cache.watched_ttl_secs, 300);
        assert!(s.watch.enabled);
        assert!(s.collections.is_empty());
    }

    #[test]
    fn collections_and_overrides_parse() {
        let s: Settings = toml::from_str(
            r#"
            [content]
            dir = "content"

            [watch]
            enabled = false

            [[collections]]
            name = "blog"
            file_pattern = "{year}/{slug}.md"
            preview_url = "/blog/{slug}"
            images = "public"

            [collections.schema]
            title = "string"
            pubDate = "date"
            "#,
        )
        .unwrap();

        assert_eq!(s.content.dir, PathBuf::from("content"));
        assert!(!s.watch.enabled);
        let blog = &s.collections[0];
        assert_eq!(blog.file_pattern.as_deref(), Some("{year}/{slug}.md"));
        assert_eq!(blog.images, Some(ImageStrategy::Public));
        assert_eq!(blog.schema.as_ref().map(|s| s.len()), Some(2));
    }
}
