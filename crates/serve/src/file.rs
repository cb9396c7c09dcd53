//! Content files on disk: read, create, update, delete.
//!
//! Creation never overwrites. The target is opened create-new, so two
//! concurrent creates for the same slug end up with distinct suffixes.

use domain::pattern::TokenMap;
use domain::{ContentItem, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::discover::{content_id, rel_string, slug_for};
use crate::fm::{parse_front_matter, serialize_front_matter};
use crate::slug::slugify;
use crate::tokens::{resolve, validate_pattern, TokenContext};
use crate::unique::first_free;
use crate::{Error, Result};

pub const DEFAULT_PATTERN: &str = "{slug}.md";

/// Metadata fields a slug is derived from when none is given.
const TITLE_FIELDS: &[&str] = &["title", "name", "heading"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub body: String,
    pub slug: Option<String>,
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub custom_tokens: TokenMap,
    /// Collection name, for the `{collection}` token.
    pub collection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub id: String,
    pub slug: String,
    pub path: PathBuf,
    pub relative_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequest {
    pub metadata: Option<Metadata>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Updated {
    pub id: String,
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Read and parse one content file.
pub fn read(file_path: &Path, collection_dir: &Path) -> Result<ContentItem> {
    let raw = fs::read_to_string(file_path).map_err(|e| Error::io(file_path, e))?;
    let parsed = parse_front_matter(&raw)?;
    let rel = file_path
        .strip_prefix(collection_dir)
        .map(rel_string)
        .unwrap_or_else(|_| rel_string(Path::new(file_path.file_name().unwrap_or_default())));

    Ok(ContentItem {
        id: content_id(&rel),
        slug: slug_for(&rel, None),
        path: file_path.to_path_buf(),
        metadata: parsed.metadata,
        body: parsed.body,
        raw,
    })
}

fn base_slug(req: &CreateRequest) -> String {
    let from_title = || {
        TITLE_FIELDS
            .iter()
            .filter_map(|f| req.metadata.get(*f))
            .find_map(Json::as_str)
            .map(slugify)
    };
    req.slug
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .or_else(from_title)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Substituted custom tokens may carry separators; keep the result inside the collection.
fn check_relative(rel: &str) -> Result<()> {
    if rel.starts_with('/')
        || rel.contains('\\')
        || rel.split('/').any(|s| s.is_empty() || s == "." || s == "..")
    {
        return Err(Error::validation(format!(
            "resolved path escapes the collection: {rel}"
        )));
    }
    Ok(())
}

fn write_new(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(path)?;
    f.write_all(data)?;
    f.sync_all()
}

/// Create a new item. Fails on an invalid pattern or an I/O error.
#[tracing::instrument(skip_all)]
pub fn create(collection_dir: &Path, req: &CreateRequest) -> Result<Created> {
    let pattern = req.file_pattern.as_deref().unwrap_or(DEFAULT_PATTERN);
    validate_pattern(pattern)?;

    let base = base_slug(req);
    let mut ctx = TokenContext::new(&base, &req.metadata).with_custom(&req.custom_tokens);
    if let Some(name) = req.collection.as_deref() {
        ctx = ctx.with_collection(name);
    }
    let tokens = resolve(pattern, &ctx);
    let text = serialize_front_matter(&req.metadata, &req.body);

    let mut start = 1;
    loop {
        let placement = first_free(&base, collection_dir, pattern, &tokens, start);
        check_relative(&placement.relative)?;
        let path = collection_dir.join(&placement.relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        match write_new(&path, text.as_bytes()) {
            Ok(()) => {
                info!("created {}", path.display());
                return Ok(Created {
                    id: content_id(&placement.relative),
                    slug: placement.slug,
                    path,
                    relative_path: placement.relative,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && placement.n < u32::MAX => {
                debug!("{} appeared concurrently; retrying", path.display());
                start = placement.n + 1;
            }
            Err(e) => return Err(Error::io(&path, e)),
        }
    }
}

/// `.<name>.tmp` beside `path`: hidden from discovery and unique per target.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write to a sibling temp file, fsync, rename over the target.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    {
        let mut f = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
        f.write_all(data).map_err(|e| Error::io(&tmp, e))?;
        f.sync_all().map_err(|e| Error::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
}

/// Merge metadata and replace the body in place. The file is never renamed.
#[tracing::instrument(skip_all)]
pub fn update(file_path: &Path, collection_dir: &Path, req: &UpdateRequest) -> Result<Updated> {
    if !file_path.is_file() {
        return Err(Error::not_found("content file", file_path.display().to_string()));
    }
    let item = read(file_path, collection_dir)?;

    let mut metadata = item.metadata;
    if let Some(patch) = &req.metadata {
        // Existing keys keep their position.
        for (k, v) in patch {
            metadata.insert(k.clone(), v.clone());
        }
    }
    let body = req.body.as_deref().unwrap_or(&item.body);

    write_atomic(file_path, serialize_front_matter(&metadata, body).as_bytes())?;
    info!("updated {}", file_path.display());

    Ok(Updated {
        id: item.id,
        path: item.path,
        metadata,
    })
}

/// Remove an item. A folder item's directory goes too once it is empty;
/// `collection_dir` itself always stays.
#[tracing::instrument(skip_all)]
pub fn delete(file_path: &Path, collection_dir: &Path) -> Result<()> {
    if !file_path.is_file() {
        return Err(Error::not_found("content file", file_path.display().to_string()));
    }
    fs::remove_file(file_path).map_err(|e| Error::io(file_path, e))?;
    info!("deleted {}", file_path.display());

    let is_index = file_path
        .file_stem()
        .is_some_and(|s| s.eq_ignore_ascii_case("index"));
    let folder = file_path.parent().filter(|p| *p != collection_dir);
    if let (true, Some(parent)) = (is_index, folder) {
        if let Err(e) = fs::remove_dir(parent) {
            debug!("kept {}: {e}", parent.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn meta(v: Json) -> Metadata {
        match v {
            Json::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn request(v: Json) -> CreateRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn create_derives_slug_from_title() {
        let dir = TempDir::new().unwrap();
        let made = create(
            dir.path(),
            &request(json!({"metadata": {"title": "My First Post!"}, "body": "Hello"})),
        )
        .unwrap();
        assert_eq!(made.slug, "my-first-post");
        assert_eq!(made.id, "my-first-post");
        assert_eq!(made.relative_path, "my-first-post.md");
        assert_eq!(
            fs::read_to_string(&made.path).unwrap(),
            "---\ntitle: My First Post!\n---\n\nHello"
        );
    }

    #[test]
    fn create_falls_back_to_untitled() {
        let dir = TempDir::new().unwrap();
        let made = create(dir.path(), &request(json!({"metadata": {"title": "!!!"}}))).unwrap();
        assert_eq!(made.slug, "untitled");
        let again = create(dir.path(), &CreateRequest::default()).unwrap();
        assert_eq!(again.slug, "untitled-2");
    }

    #[test]
    fn create_with_nested_pattern_makes_parents() {
        let dir = TempDir::new().unwrap();
        let made = create(
            dir.path(),
            &request(json!({
                "metadata": {"title": "Hi", "pubDate": "2024-06-05"},
                "filePattern": "{year}/{month}/{slug}/index.mdx",
            })),
        )
        .unwrap();
        assert_eq!(made.relative_path, "2024/06/hi/index.mdx");
        assert_eq!(made.id, "2024/06/hi");
        assert!(made.path.is_file());
    }

    #[test]
    fn explicit_slug_and_custom_tokens() {
        let dir = TempDir::new().unwrap();
        let made = create(
            dir.path(),
            &request(json!({
                "metadata": {"title": "Ignored"},
                "slug": "Custom Slug",
                "filePattern": "{category}/{slug}.md",
                "customTokens": {"category": "guides"},
            })),
        )
        .unwrap();
        assert_eq!(made.relative_path, "guides/custom-slug.md");
    }

    #[test]
    fn invalid_pattern_and_escaping_tokens_are_validation_errors() {
        let dir = TempDir::new().unwrap();
        let err = create(dir.path(), &request(json!({"filePattern": "{title}.md"}))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = create(
            dir.path(),
            &request(json!({
                "filePattern": "{category}/{slug}.md",
                "customTokens": {"category": ".."},
            })),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn update_merges_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "---\ntitle: A\ndraft: true\ntags:\n  - x\n---\n\nOld body").unwrap();

        let out = update(
            &path,
            dir.path(),
            &UpdateRequest {
                metadata: Some(meta(json!({"draft": false, "extra": 1}))),
                body: None,
            },
        )
        .unwrap();
        assert_eq!(out.id, "a");

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "---\ntitle: A\ndraft: false\ntags:\n  - x\nextra: 1\n---\n\nOld body"
        );
        assert!(!dir.path().join(".a.md.tmp").exists());
    }

    #[test]
    fn temp_files_are_hidden_and_distinct_per_target() {
        let dir = TempDir::new().unwrap();
        let md = temp_path(&dir.path().join("post.md"));
        let mdx = temp_path(&dir.path().join("post.mdx"));
        assert_ne!(md, mdx);
        assert_eq!(md.file_name().unwrap(), ".post.md.tmp");

        // A user's own `post.tmp` survives an update of `post.md`.
        fs::write(dir.path().join("post.tmp"), "keep").unwrap();
        fs::write(dir.path().join("post.md"), "---\ntitle: P\n---\n").unwrap();
        let req = UpdateRequest {
            metadata: None,
            body: Some("new".into()),
        };
        update(&dir.path().join("post.md"), dir.path(), &req).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("post.tmp")).unwrap(), "keep");
        assert!(!md.exists());
    }

    #[test]
    fn update_and_delete_report_missing_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.md");
        let err = update(&missing, dir.path(), &UpdateRequest::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        let err = delete(&missing, dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[test]
    fn delete_removes_empty_item_folder() {
        let dir = TempDir::new().unwrap();
        let item = dir.path().join("post/index.md");
        fs::create_dir_all(item.parent().unwrap()).unwrap();
        fs::write(&item, "x").unwrap();
        delete(&item, dir.path()).unwrap();
        assert!(!dir.path().join("post").exists());
    }

    #[test]
    fn deleting_a_flat_index_keeps_the_collection_directory() {
        let dir = TempDir::new().unwrap();
        let blog = dir.path().join("blog");
        fs::create_dir_all(&blog).unwrap();
        let made = create(
            &blog,
            &request(json!({"metadata": {"title": "Home"}, "slug": "index"})),
        )
        .unwrap();
        assert_eq!(made.relative_path, "index.md");

        delete(&made.path, &blog).unwrap();
        assert!(!made.path.exists());
        assert!(blog.is_dir());
    }

    #[test]
    fn read_reports_id_slug_and_raw() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2024-01-15-hello.md");
        let raw = "---\ntitle: Hello\n---\n\nBody";
        fs::write(&path, raw).unwrap();

        let item = read(&path, dir.path()).unwrap();
        assert_eq!(item.id, "2024-01-15-hello");
        assert_eq!(item.slug, "hello");
        assert_eq!(item.metadata["title"], "Hello");
        assert_eq!(item.body, "Body");
        assert_eq!(item.raw, raw);
    }
}
