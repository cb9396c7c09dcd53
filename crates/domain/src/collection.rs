use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frontmatter field type, as inferred from content or declared in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

/// Field name → field type.
pub type Schema = BTreeMap<String, FieldType>;

/// Where a collection keeps the images its items use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStrategy {
    /// Next to the content file (folder-based items).
    #[default]
    Colocated,
    /// Under `<public>/images/<collection>/<id>/`.
    Public,
}

/// A content collection as served to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    /// Relative to the project root, `/`-separated.
    pub path: String,
    pub file_pattern: String,
    pub item_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub images: ImageStrategy,
}

/// A user-declared collection (`[[collections]]` in `quire.toml`).
///
/// Every field except `name` is optional; present fields override what
/// discovery inferred.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, alias = "filePattern")]
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default, alias = "previewUrl")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub images: Option<ImageStrategy>,
}

impl CollectionConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_serializes_camel_case() {
        let c = Collection {
            name: "blog".into(),
            path: "src/content/blog".into(),
            file_pattern: "{slug}.md".into(),
            item_count: 2,
            schema: None,
            preview_url: Some("/blog/{slug}".into()),
            images: ImageStrategy::Public,
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["filePattern"], "{slug}.md");
        assert_eq!(v["itemCount"], 2);
        assert_eq!(v["previewUrl"], "/blog/{slug}");
        assert_eq!(v["images"], "public");
        assert!(v.get("schema").is_none());
    }

    #[test]
    fn config_accepts_snake_and_camel_keys() {
        let a: CollectionConfig =
            serde_json::from_str(r#"{"name":"docs","filePattern":"{slug}/index.md"}"#).unwrap();
        let b: CollectionConfig =
            serde_json::from_str(r#"{"name":"docs","file_pattern":"{slug}/index.md"}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.file_pattern.as_deref(), Some("{slug}/index.md"));
    }
}
