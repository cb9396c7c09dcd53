//! Directory scans: content files, collections, schemas and listings.
//!
//! Paths handed out here are relative and `/`-separated so they compare the
//! same on every platform and feed straight into the pattern catalog.

use domain::pattern::{content_extension, PatternTemplate, CONTENT_EXTS};
use domain::{Collection, ContentSummary, FieldType, Metadata, Schema};
use rayon::prelude::*;
use serde_json::Value as Json;
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::detect::detect_files;
use crate::fm::parse_front_matter;
use crate::tokens::{parse_date, DATE_FIELDS};

/// Upper bound on files read to infer a collection schema.
const SCHEMA_SAMPLE: usize = 25;

/// Directories starting with `.` or `_` are never content.
fn is_pruned_dir(e: &DirEntry) -> bool {
    e.file_type().is_dir()
        && e
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.') || n.starts_with('_'))
}

fn is_pruned_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// `a/b/c.md` regardless of platform separator.
pub fn rel_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Content files below `dir`, relative to it, sorted.
pub fn content_files(dir: &Path) -> io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", dir.display()),
        ));
    }

    // Prune by directory name. Always allow the root (depth == 0).
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_pruned_dir(e));

    let mut out = Vec::new();
    for item in walker {
        let entry = match item {
            Ok(e) => e,
            Err(err) => {
                warn!("walkdir under {}: {err}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel = rel_string(rel);
        if content_extension(&rel).is_some() {
            out.push(rel);
        }
    }
    out.sort();
    Ok(out)
}

/// Item id: relative path without extension and without a trailing `/index`.
pub fn content_id(rel: &str) -> String {
    let stem = match rel.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => rel,
    };
    stem.strip_suffix("/index").unwrap_or(stem).to_string()
}

/// Slug of an existing file: the pattern's own extraction if it fits, else the
/// richest catalog template that fits, else the id's last segment.
pub fn slug_for(rel: &str, pattern: Option<&str>) -> String {
    let preferred = pattern.and_then(PatternTemplate::from_template);
    let from_preferred = preferred.and_then(|t| t.matches(rel));
    let m = from_preferred.or_else(|| {
        PatternTemplate::CATALOG
            .into_iter()
            .filter_map(|t| t.matches(rel).map(|m| (t.priority(), m)))
            .max_by_key(|(p, _)| *p)
            .map(|(_, m)| m)
    });
    match m.and_then(|m| m.tokens.get("slug").cloned()) {
        Some(slug) => slug,
        None => {
            let id = content_id(rel);
            id.rsplit('/').next().unwrap_or(&id).to_string()
        }
    }
}

/// Resolve an item id to its file inside `collection_dir`.
pub fn find_item(collection_dir: &Path, id: &str) -> Option<PathBuf> {
    if id.is_empty()
        || id.starts_with('/')
        || id.split('/').any(|s| s.is_empty() || s == "." || s == "..")
    {
        return None;
    }
    CONTENT_EXTS
        .iter()
        .flat_map(|ext| [format!("{id}.{ext}"), format!("{id}/index.{ext}")])
        .map(|rel| collection_dir.join(rel))
        .find(|p| p.is_file())
}

/// Every non-hidden sub-directory of `<project_root>/<content_dir>`, by name.
#[tracing::instrument(skip_all)]
pub fn discover_collections(project_root: &Path, content_dir: &Path) -> io::Result<Vec<Collection>> {
    let root = project_root.join(content_dir);
    if !root.is_dir() {
        debug!("content dir {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_pruned_name(&name) {
            names.push(name);
        }
    }
    names.sort();

    let rel_root = content_dir
        .strip_prefix(project_root)
        .unwrap_or(content_dir)
        .to_path_buf();

    let collections = names
        .into_iter()
        .map(|name| {
            let dir = root.join(&name);
            let files = content_files(&dir).unwrap_or_else(|e| {
                warn!("listing collection {name}: {e}");
                Vec::new()
            });
            let detection = detect_files(&files);
            let schema = infer_schema(&dir, &files);
            Collection {
                path: rel_string(&rel_root.join(&name)),
                file_pattern: detection.pattern,
                item_count: files.len(),
                schema: (!schema.is_empty()).then_some(schema),
                preview_url: None,
                images: Default::default(),
                name,
            }
        })
        .collect();

    Ok(collections)
}

/// Field types seen across the first files of a collection; first type wins.
pub fn infer_schema(collection_dir: &Path, files: &[String]) -> Schema {
    let mut schema = Schema::new();
    for rel in files.iter().take(SCHEMA_SAMPLE) {
        let Some(meta) = read_metadata(&collection_dir.join(rel)) else {
            continue;
        };
        for (key, value) in &meta {
            if let Some(t) = field_type(value) {
                schema.entry(key.clone()).or_insert(t);
            }
        }
    }
    schema
}

fn field_type(v: &Json) -> Option<FieldType> {
    Some(match v {
        Json::Null => return None,
        Json::Bool(_) => FieldType::Boolean,
        Json::Number(_) => FieldType::Number,
        Json::String(s) if parse_date(s).is_some() => FieldType::Date,
        Json::String(_) => FieldType::String,
        Json::Array(_) => FieldType::Array,
        Json::Object(_) => FieldType::Object,
    })
}

fn read_metadata(path: &Path) -> Option<Metadata> {
    let text = fs::read_to_string(path)
        .map_err(|e| debug!("read {}: {e}", path.display()))
        .ok()?;
    parse_front_matter(&text)
        .map_err(|e| debug!("front matter in {}: {e}", path.display()))
        .ok()
        .map(|p| p.metadata)
}

/// Listing rows for a collection, newest first, then by id.
#[tracing::instrument(skip_all)]
pub fn list_summaries(collection_dir: &Path, pattern: Option<&str>) -> io::Result<Vec<ContentSummary>> {
    let files = content_files(collection_dir)?;

    let mut rows: Vec<ContentSummary> = files
        .par_iter()
        .filter_map(|rel| {
            let path = collection_dir.join(rel);
            let text = match fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    return None;
                }
            };
            let parsed = match parse_front_matter(&text) {
                Ok(p) => p,
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    return None;
                }
            };
            Some(summary_of(rel, pattern, &parsed.metadata))
        })
        .collect();

    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    Ok(rows)
}

fn summary_of(rel: &str, pattern: Option<&str>, meta: &Metadata) -> ContentSummary {
    let title = ["title", "name"]
        .iter()
        .filter_map(|k| meta.get(*k))
        .find_map(Json::as_str)
        .map(str::to_string);
    let date = DATE_FIELDS
        .iter()
        .filter_map(|k| meta.get(*k))
        .filter_map(Json::as_str)
        .find_map(parse_date)
        .map(|d| d.format("%Y-%m-%d").to_string());

    ContentSummary {
        id: content_id(rel),
        slug: slug_for(rel, pattern),
        path: rel.to_string(),
        title,
        date,
        draft: meta.get("draft").and_then(Json::as_bool).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, text).unwrap();
    }

    #[test]
    fn ids_and_slugs() {
        assert_eq!(content_id("2024-01-15-hello.md"), "2024-01-15-hello");
        assert_eq!(content_id("hello/index.mdx"), "hello");
        assert_eq!(content_id("2024/06/post.md"), "2024/06/post");
        assert_eq!(content_id("index.md"), "index");

        assert_eq!(slug_for("2024-01-15-hello.md", Some("{date}-{slug}.md")), "hello");
        assert_eq!(slug_for("2024-01-15-hello.md", None), "hello");
        assert_eq!(slug_for("2024-01-15-hello.md", Some("{slug}.md")), "2024-01-15-hello");
        assert_eq!(slug_for("post/index.md", None), "post");
        assert_eq!(slug_for("a/b/c/d/e.md", None), "e");
    }

    #[test]
    fn find_item_handles_flat_and_folder_items() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "flat.md", "x");
        write(dir.path(), "folder/index.mdx", "x");

        assert_eq!(find_item(dir.path(), "flat"), Some(dir.path().join("flat.md")));
        assert_eq!(
            find_item(dir.path(), "folder"),
            Some(dir.path().join("folder/index.mdx"))
        );
        assert_eq!(find_item(dir.path(), "missing"), None);
        assert_eq!(find_item(dir.path(), "../flat"), None);
    }

    #[test]
    fn discovers_collections_with_patterns_counts_and_schema() {
        let dir = TempDir::new().unwrap();
        let content = Path::new("src/content");
        let root = dir.path().join(content);
        write(&root, "blog/2024-01-15-hello.md", "---\ntitle: Hello\npubDate: 2024-01-15\ndraft: false\ntags: [a]\n---\n\nHi");
        write(&root, "blog/2024-02-01-world.md", "---\ntitle: World\nviews: 3\n---\n\nYo");
        write(&root, "docs/intro/index.md", "---\ntitle: Intro\n---\n");
        write(&root, "_private/x.md", "x");
        write(&root, ".cache/x.md", "x");
        write(&root, "loose.md", "not a collection");

        let cols = discover_collections(dir.path(), content).unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["blog", "docs"]);

        let blog = &cols[0];
        assert_eq!(blog.path, "src/content/blog");
        assert_eq!(blog.file_pattern, "{date}-{slug}.md");
        assert_eq!(blog.item_count, 2);
        let schema = blog.schema.as_ref().unwrap();
        assert_eq!(schema["title"], FieldType::String);
        assert_eq!(schema["pubDate"], FieldType::Date);
        assert_eq!(schema["draft"], FieldType::Boolean);
        assert_eq!(schema["tags"], FieldType::Array);
        assert_eq!(schema["views"], FieldType::Number);

        assert_eq!(cols[1].file_pattern, "{slug}/index.md");
    }

    #[test]
    fn missing_content_dir_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let cols = discover_collections(dir.path(), Path::new("nope")).unwrap();
        assert!(cols.is_empty());
    }

    #[test]
    fn summaries_sort_newest_first_and_skip_broken_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "old.md", "---\ntitle: Old\ndate: 2020-01-01\n---\n");
        write(dir.path(), "new.md", "---\ntitle: New\npubDate: 2024-05-01\ndraft: true\n---\n");
        write(dir.path(), "undated.md", "no front matter");
        write(dir.path(), "broken.md", "---\n- not\n- a map\n---\n");

        let rows = list_summaries(dir.path(), Some("{slug}.md")).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "undated"]);
        assert!(rows[0].draft);
        assert_eq!(rows[0].date.as_deref(), Some("2024-05-01"));
        assert_eq!(rows[1].title.as_deref(), Some("Old"));
        assert_eq!(rows[2].title, None);
    }
}
